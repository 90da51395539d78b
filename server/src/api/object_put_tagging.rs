use shared_types::Tag;
use tracing::{info, instrument};

use super::ObjectService;
use crate::auth::{Action, AuthInfo};
use crate::error::Result;
use crate::tagging::validate_tag_set;
use crate::versioning::{codec, Mutation, MutationTarget, TargetRequirement};

#[derive(Debug, Clone, Default)]
pub struct PutObjectTaggingInput {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone)]
pub struct PutObjectTaggingOutput {
    pub version_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetObjectTaggingOutput {
    pub tags: Vec<Tag>,
    pub version_id: Option<String>,
}

impl ObjectService {
    /// Replace the tag set of an existing version in place. The version id
    /// is unchanged and no new version is created.
    #[instrument(skip(self, auth, input), fields(bucket = %input.bucket, key = %input.key))]
    pub async fn put_object_tagging(
        &self,
        auth: &AuthInfo,
        input: PutObjectTaggingInput,
    ) -> Result<PutObjectTaggingOutput> {
        let qualifier = codec::decode(input.version_id.as_deref())?;
        let target = MutationTarget::new(&input.bucket, &input.key, Action::PutObjectTagging)
            .qualifier(qualifier)
            .requirement(TargetRequirement::ExistingObject);

        let tags = &input.tags;
        let outcome = self
            .pipeline
            .execute(auth, target, |validated| {
                let tag_set = validate_tag_set(tags)?;
                let mut record = validated.existing_object()?.clone();
                if let Some(content) = record.content_mut() {
                    content.tags = tag_set;
                }
                Ok(Mutation::Update(record))
            })
            .await?;

        info!(
            "Replaced tags of {}/{} version {} ({} tags)",
            input.bucket,
            input.key,
            outcome.record.version_id,
            input.tags.len()
        );

        Ok(PutObjectTaggingOutput {
            version_id: outcome.version_id,
        })
    }

    pub async fn get_object_tagging(
        &self,
        auth: &AuthInfo,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<GetObjectTaggingOutput> {
        let qualifier = codec::decode(version_id)?;
        let target = MutationTarget::new(bucket, key, Action::GetObjectTagging)
            .qualifier(qualifier)
            .requirement(TargetRequirement::ExistingObject);
        let validated = self.pipeline.validate(auth, target).await?;
        let record = validated.existing_object()?;

        let tags = record
            .content()
            .map(|content| {
                content
                    .tags
                    .iter()
                    .map(|(key, value)| Tag::new(key.as_str(), value.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(GetObjectTaggingOutput {
            tags,
            version_id: codec::response_header_value(validated.bucket.versioning, record),
        })
    }
}
