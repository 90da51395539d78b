use shared_types::{AclInfo, RecordKind};
use tracing::{info, instrument};

use super::ObjectService;
use crate::auth::{Action, AuthInfo};
use crate::error::Result;
use crate::versioning::{
    codec, CleanupReport, Mutation, MutationMode, MutationTarget, NewVersion, VersionQualifier,
};

#[derive(Debug, Clone, Default)]
pub struct DeleteObjectInput {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteObjectOutput {
    pub version_id: Option<String>,
    /// Whether the created or removed version is a delete marker.
    pub delete_marker: bool,
    pub cleanup: CleanupReport,
}

impl ObjectService {
    /// Delete the current version or permanently remove a specific one.
    ///
    /// Without a version id, versioned and suspended buckets record a
    /// delete marker (a null one when suspended) and unversioned buckets
    /// drop the object outright. Deleting something that does not exist
    /// succeeds.
    #[instrument(skip(self, auth, input), fields(bucket = %input.bucket, key = %input.key))]
    pub async fn delete_object(
        &self,
        auth: &AuthInfo,
        input: DeleteObjectInput,
    ) -> Result<DeleteObjectOutput> {
        let qualifier = codec::decode(input.version_id.as_deref())?;
        let target = MutationTarget::new(&input.bucket, &input.key, Action::DeleteObject)
            .qualifier(qualifier);
        let validated = self.pipeline.validate(auth, target).await?;

        if qualifier != VersionQualifier::Current {
            let Some(record) = validated.existing.as_ref() else {
                return Ok(DeleteObjectOutput {
                    version_id: input.version_id,
                    ..DeleteObjectOutput::default()
                });
            };
            self.pipeline
                .remove_version(&validated.bucket.name, record)
                .await?;
            return Ok(DeleteObjectOutput {
                version_id: codec::response_header_value(validated.bucket.versioning, record),
                delete_marker: record.is_delete_marker(),
                cleanup: CleanupReport::default(),
            });
        }

        if validated.mode() == MutationMode::NonVersioned {
            if let Some(record) = validated.existing.as_ref() {
                self.pipeline
                    .remove_version(&validated.bucket.name, record)
                    .await?;
            }
            return Ok(DeleteObjectOutput::default());
        }

        let marker = NewVersion {
            kind: RecordKind::DeleteMarker,
            acl: AclInfo::private(auth.canonical_id()),
        };
        let outcome = self
            .pipeline
            .persist(&validated, Mutation::Create(marker))
            .await?;

        info!(
            "Created delete marker for {}/{} ({})",
            input.bucket, input.key, outcome.record.version_id
        );

        Ok(DeleteObjectOutput {
            version_id: outcome.version_id,
            delete_marker: true,
            cleanup: outcome.cleanup,
        })
    }
}
