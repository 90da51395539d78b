use chrono::{DateTime, Utc};
use shared_types::{AclInfo, ObjectContent, RecordKind, Tag};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{info, instrument};

use super::ObjectService;
use crate::auth::{Action, AuthInfo};
use crate::error::{EngineError, Result};
use crate::tagging::validate_tag_set;
use crate::versioning::{
    codec, CleanupReport, Mutation, MutationTarget, NewVersion, TargetRequirement,
    VersionQualifier,
};

/// Whether a copy keeps the source's metadata (or tags) or takes them
/// from the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Directive {
    #[default]
    Copy,
    Replace,
}

impl FromStr for Directive {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "COPY" => Ok(Self::Copy),
            "REPLACE" => Ok(Self::Replace),
            other => Err(EngineError::InvalidArgument(format!(
                "Unknown directive: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CopyObjectInput {
    pub source_bucket: String,
    pub source_key: String,
    pub source_version_id: Option<String>,
    pub bucket: String,
    pub key: String,
    pub metadata_directive: Directive,
    pub tagging_directive: Directive,
    /// Used with `Directive::Replace` for metadata.
    pub content_type: Option<String>,
    pub user_metadata: BTreeMap<String, String>,
    /// Used with `Directive::Replace` for tagging.
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone)]
pub struct CopyObjectOutput {
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub version_id: Option<String>,
    /// Value for `x-amz-copy-source-version-id`.
    pub copy_source_version_id: Option<String>,
    pub cleanup: CleanupReport,
}

impl ObjectService {
    #[instrument(skip(self, auth, input), fields(
        source = %format!("{}/{}", input.source_bucket, input.source_key),
        bucket = %input.bucket,
        key = %input.key,
    ))]
    pub async fn copy_object(
        &self,
        auth: &AuthInfo,
        input: CopyObjectInput,
    ) -> Result<CopyObjectOutput> {
        let source_qualifier = codec::decode(input.source_version_id.as_deref())?;

        let replacement_tags = match input.tagging_directive {
            Directive::Replace => Some(validate_tag_set(&input.tags)?),
            Directive::Copy => None,
        };

        let source_target =
            MutationTarget::new(&input.source_bucket, &input.source_key, Action::GetObject)
                .qualifier(source_qualifier)
                .requirement(TargetRequirement::ExistingObject);
        let source = self.pipeline.validate(auth, source_target).await?;
        let source_record = source.existing_object()?;
        let source_content = source_record
            .content()
            .ok_or(EngineError::MethodNotAllowed)?;

        let dest_target = MutationTarget::new(&input.bucket, &input.key, Action::PutObject);
        let destination = self.pipeline.validate(auth, dest_target).await?;

        if input.source_bucket == input.bucket
            && input.source_key == input.key
            && source_qualifier == VersionQualifier::Current
            && input.metadata_directive == Directive::Copy
            && input.tagging_directive == Directive::Copy
        {
            return Err(EngineError::InvalidRequest(
                "This copy request is illegal because it is trying to copy an object to itself \
                 without changing the object's metadata"
                    .to_string(),
            ));
        }

        let location = self
            .pipeline
            .content()
            .duplicate(&source_content.location, &input.bucket)
            .await?;

        let (content_type, user_metadata) = match input.metadata_directive {
            Directive::Copy => (
                source_content.content_type.clone(),
                source_content.user_metadata.clone(),
            ),
            Directive::Replace => (input.content_type, input.user_metadata),
        };
        let tags = replacement_tags.unwrap_or_else(|| source_content.tags.clone());

        let new_version = NewVersion {
            kind: RecordKind::Object(ObjectContent {
                location: location.clone(),
                size: source_content.size,
                content_md5: source_content.content_md5.clone(),
                content_type,
                user_metadata,
                tags,
            }),
            acl: AclInfo::private(auth.canonical_id()),
        };

        let outcome = match self
            .pipeline
            .persist(&destination, Mutation::Create(new_version))
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.release_orphan(&location).await;
                return Err(err);
            }
        };

        info!(
            "Copied {}/{} to {}/{} (version {:?})",
            input.source_bucket, input.source_key, input.bucket, input.key, outcome.version_id
        );

        Ok(CopyObjectOutput {
            etag: source_content.content_md5.clone(),
            last_modified: outcome.record.last_modified,
            version_id: outcome.version_id,
            copy_source_version_id: codec::response_header_value(
                source.bucket.versioning,
                source_record,
            ),
            cleanup: outcome.cleanup,
        })
    }
}
