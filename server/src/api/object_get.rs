use bytes::Bytes;
use shared_types::{ObjectMetadataRecord, VersionInfo};
use tracing::instrument;

use super::ObjectService;
use crate::auth::{Action, AuthInfo};
use crate::error::{EngineError, Result};
use crate::versioning::{codec, MutationTarget, TargetRequirement};

#[derive(Debug, Clone, Default)]
pub struct GetObjectInput {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetObjectOutput {
    pub record: ObjectMetadataRecord,
    pub body: Bytes,
    pub version_id: Option<String>,
}

impl ObjectService {
    #[instrument(skip(self, auth, input), fields(bucket = %input.bucket, key = %input.key))]
    pub async fn get_object(
        &self,
        auth: &AuthInfo,
        input: GetObjectInput,
    ) -> Result<GetObjectOutput> {
        let qualifier = codec::decode(input.version_id.as_deref())?;
        let target = MutationTarget::new(input.bucket, input.key, Action::GetObject)
            .qualifier(qualifier)
            .requirement(TargetRequirement::ExistingObject);
        let validated = self.pipeline.validate(auth, target).await?;

        let record = validated.existing_object()?.clone();
        let location = record
            .content_location()
            .ok_or(EngineError::MethodNotAllowed)?;
        let body = self.pipeline.content().read(location).await?;

        Ok(GetObjectOutput {
            version_id: codec::response_header_value(validated.bucket.versioning, &record),
            record,
            body,
        })
    }

    /// Every stored version of `key`, newest first.
    pub async fn list_object_versions(
        &self,
        auth: &AuthInfo,
        bucket: &str,
        key: &str,
    ) -> Result<Vec<VersionInfo>> {
        let bucket = self
            .pipeline
            .authorized_bucket(auth, bucket, Action::ListObjectVersions)
            .await?;
        let chain = self.pipeline.metadata().list_versions(&bucket.name, key).await?;

        Ok(chain
            .iter()
            .enumerate()
            .map(|(index, record)| VersionInfo {
                version_id: codec::client_version_id(record),
                is_latest: index == 0,
                is_delete_marker: record.is_delete_marker(),
                last_modified: record.last_modified,
                size: record.content().map(|c| c.size),
                etag: record.content().map(|c| c.content_md5.clone()),
            })
            .collect())
    }
}
