use bytes::Bytes;
use shared_types::{AclInfo, ObjectContent, RecordKind, Tag};
use std::collections::BTreeMap;
use tracing::{info, instrument};

use super::ObjectService;
use crate::auth::{Action, AuthInfo};
use crate::error::Result;
use crate::tagging::validate_tag_set;
use crate::versioning::{CleanupReport, Mutation, MutationTarget, NewVersion};

#[derive(Debug, Clone, Default)]
pub struct PutObjectInput {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub user_metadata: BTreeMap<String, String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone)]
pub struct PutObjectOutput {
    /// Hex MD5 of the body.
    pub etag: String,
    pub version_id: Option<String>,
    pub cleanup: CleanupReport,
}

impl ObjectService {
    #[instrument(
        skip(self, auth, input),
        fields(bucket = %input.bucket, key = %input.key, size = input.body.len())
    )]
    pub async fn put_object(
        &self,
        auth: &AuthInfo,
        input: PutObjectInput,
    ) -> Result<PutObjectOutput> {
        let tags = validate_tag_set(&input.tags)?;

        let target = MutationTarget::new(&input.bucket, &input.key, Action::PutObject);
        let validated = self.pipeline.validate(auth, target).await?;

        let size = u64::try_from(input.body.len()).unwrap_or(u64::MAX);
        let content_md5 = format!("{:x}", md5::compute(&input.body));
        let location = self
            .pipeline
            .content()
            .write(&input.bucket, input.body)
            .await?;

        let new_version = NewVersion {
            kind: RecordKind::Object(ObjectContent {
                location: location.clone(),
                size,
                content_md5: content_md5.clone(),
                content_type: input.content_type,
                user_metadata: input.user_metadata,
                tags,
            }),
            acl: AclInfo::private(auth.canonical_id()),
        };

        let outcome = match self
            .pipeline
            .persist(&validated, Mutation::Create(new_version))
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.release_orphan(&location).await;
                return Err(err);
            }
        };

        info!(
            "Stored {}/{} ({} bytes, version {:?})",
            input.bucket, input.key, size, outcome.version_id
        );

        Ok(PutObjectOutput {
            etag: content_md5,
            version_id: outcome.version_id,
            cleanup: outcome.cleanup,
        })
    }
}
