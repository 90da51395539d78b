//! The validate → transform → persist pipeline behind every metadata
//! mutation.
//!
//! Stage 1 resolves the bucket, checks authorization and looks up the
//! addressed version. Stage 2 is the caller's operation-specific transform.
//! Stage 3 decides whether the write mints a new version, stores the
//! record and reclaims any null version the write displaced.

use chrono::Utc;
use shared_types::{AclInfo, BucketRecord, ContentLocation, ObjectMetadataRecord, RecordKind};
use std::sync::Arc;
use storage_backend::{ContentStore, MetadataStore, VersionChain, WriteMode};
use tracing::{debug, info, instrument, warn};

use super::codec::{self, VersionIdGenerator, VersionQualifier, VersionStamp};
use super::null_version::{self, CleanupReport, StaleNullVersion, WriteKind};
use super::resolver::MutationMode;
use crate::auth::{Action, AuthInfo, Authorizer};
use crate::error::{EngineError, Result};

/// What stage 1 demands of the addressed version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRequirement {
    /// The version may be absent (writes that create a new version).
    Optional,
    /// The version must exist; a specific delete marker is acceptable.
    Existing,
    /// The version must exist and carry content.
    ExistingObject,
}

#[derive(Debug, Clone)]
pub struct MutationTarget {
    pub bucket: String,
    pub key: String,
    pub qualifier: VersionQualifier,
    pub action: Action,
    pub requirement: TargetRequirement,
}

impl MutationTarget {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, action: Action) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            qualifier: VersionQualifier::Current,
            action,
            requirement: TargetRequirement::Optional,
        }
    }

    pub fn qualifier(mut self, qualifier: VersionQualifier) -> Self {
        self.qualifier = qualifier;
        self
    }

    pub fn requirement(mut self, requirement: TargetRequirement) -> Self {
        self.requirement = requirement;
        self
    }
}

/// Output of stage 1, consumed by the transform and by persist.
#[derive(Debug, Clone)]
pub struct ValidatedTarget {
    pub bucket: BucketRecord,
    pub key: String,
    pub qualifier: VersionQualifier,
    /// The addressed version. For `Current` this is the newest record,
    /// which may be a delete marker when the requirement is `Optional`.
    pub existing: Option<ObjectMetadataRecord>,
}

impl ValidatedTarget {
    pub fn mode(&self) -> MutationMode {
        MutationMode::resolve(self.bucket.versioning)
    }

    pub fn existing_object(&self) -> Result<&ObjectMetadataRecord> {
        match &self.existing {
            Some(record) if !record.is_delete_marker() => Ok(record),
            Some(_) => Err(EngineError::MethodNotAllowed),
            None => Err(missing_error(self.qualifier)),
        }
    }
}

/// Fields of a version that does not exist yet; identity is assigned by
/// persist.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub kind: RecordKind,
    pub acl: AclInfo,
}

/// What the transform stage asks persist to write.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Edit the validated version under its own id. Key, id and role are
    /// taken from the validated record.
    Update(ObjectMetadataRecord),
    Create(NewVersion),
}

#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub record: ObjectMetadataRecord,
    /// Value for the `x-amz-version-id` response header.
    pub version_id: Option<String>,
    pub cleanup: CleanupReport,
}

pub struct MutationPipeline {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
    authorizer: Arc<dyn Authorizer>,
    versions: VersionIdGenerator,
}

impl MutationPipeline {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        authorizer: Arc<dyn Authorizer>,
        instance_id: u16,
    ) -> Self {
        Self {
            metadata,
            content,
            authorizer,
            versions: VersionIdGenerator::new(instance_id),
        }
    }

    pub fn metadata(&self) -> &dyn MetadataStore {
        self.metadata.as_ref()
    }

    pub fn content(&self) -> &dyn ContentStore {
        self.content.as_ref()
    }

    /// Fetch a bucket and check that `auth` may perform `action` on it.
    pub async fn authorized_bucket(
        &self,
        auth: &AuthInfo,
        bucket: &str,
        action: Action,
    ) -> Result<BucketRecord> {
        let record = self
            .metadata
            .get_bucket(bucket)
            .await?
            .ok_or(EngineError::NoSuchBucket)?;
        self.authorizer.authorize(auth, &record, action)?;
        Ok(record)
    }

    /// Stage 1. Performs no writes.
    #[instrument(
        skip(self, auth, target),
        fields(bucket = %target.bucket, key = %target.key, qualifier = %target.qualifier)
    )]
    pub async fn validate(
        &self,
        auth: &AuthInfo,
        target: MutationTarget,
    ) -> Result<ValidatedTarget> {
        if target.key.is_empty() {
            return Err(EngineError::InvalidArgument(
                "Object key must not be empty".to_string(),
            ));
        }

        let bucket = self
            .authorized_bucket(auth, &target.bucket, target.action)
            .await?;
        let existing = self
            .lookup(&bucket.name, &target.key, target.qualifier)
            .await?;
        let existing = check_requirement(existing, target.qualifier, target.requirement)?;

        debug!(
            "Validated {} (exists: {}, versioning: {})",
            target.action.as_str(),
            existing.is_some(),
            bucket.versioning
        );

        Ok(ValidatedTarget {
            bucket,
            key: target.key,
            qualifier: target.qualifier,
            existing,
        })
    }

    async fn lookup(
        &self,
        bucket: &str,
        key: &str,
        qualifier: VersionQualifier,
    ) -> Result<Option<ObjectMetadataRecord>> {
        match qualifier {
            VersionQualifier::Current => {
                let chain = self.metadata.list_versions(bucket, key).await?;
                Ok(chain.into_records().into_iter().next())
            }
            VersionQualifier::Null => {
                let chain = self.metadata.list_versions(bucket, key).await?;
                Ok(chain.null_version().cloned())
            }
            VersionQualifier::Specific(stamp) => Ok(self
                .metadata
                .get_version(bucket, key, &stamp.internal_id())
                .await?),
        }
    }

    /// Stage 3. Writes the mutation and reclaims displaced null versions.
    ///
    /// Reading the chain or writing the record fails the whole operation.
    /// Once the record is written the outcome is success; cleanup
    /// failures are only reported.
    #[instrument(skip_all, fields(bucket = %validated.bucket.name, key = %validated.key))]
    pub async fn persist(
        &self,
        validated: &ValidatedTarget,
        mutation: Mutation,
    ) -> Result<MutationOutcome> {
        let bucket = validated.bucket.name.as_str();
        let (record, write) = match mutation {
            Mutation::Update(mut record) => {
                let existing = validated.existing.as_ref().ok_or_else(|| {
                    EngineError::InvalidRequest(
                        "An in-place update requires an existing version".to_string(),
                    )
                })?;
                record.key.clone_from(&existing.key);
                record.version_id.clone_from(&existing.version_id);
                record.role = existing.role;
                (record, WriteKind::InPlace)
            }
            Mutation::Create(new_version) => {
                if let Some(stamp) = validated
                    .existing
                    .as_ref()
                    .and_then(|existing| VersionStamp::from_internal(&existing.version_id))
                {
                    self.versions.advance_past(&stamp);
                }
                let mode = validated.mode();
                let record = ObjectMetadataRecord {
                    key: validated.key.clone(),
                    version_id: self.versions.mint().internal_id(),
                    role: mode.role_for_new_version(),
                    kind: new_version.kind,
                    acl: new_version.acl,
                    last_modified: Utc::now(),
                };
                (record, WriteKind::Create(mode))
            }
        };

        let chain = if write.may_supersede_null() {
            self.metadata.list_versions(bucket, &record.key).await?
        } else {
            VersionChain::default()
        };
        let plan = null_version::plan(write, &record, &chain);

        let store_mode = match write {
            WriteKind::Create(_) => WriteMode::CreateOnly,
            WriteKind::InPlace => WriteMode::Overwrite,
        };
        if let Err(err) = self.metadata.put_version(bucket, &record, store_mode).await {
            let err = EngineError::from(err);
            if err.is_already_exists() {
                warn!(version_id = %record.version_id, "Minted version id already stored");
            }
            return Err(err);
        }

        info!(
            version_id = %record.version_id,
            null = record.is_null(),
            delete_marker = record.is_delete_marker(),
            stale = plan.stale.len(),
            "Persisted version record"
        );

        let cleanup = self.reclaim(bucket, plan.stale).await;
        let version_id = codec::response_header_value(validated.bucket.versioning, &record);

        Ok(MutationOutcome {
            record,
            version_id,
            cleanup,
        })
    }

    /// Run all three stages.
    pub async fn execute<F>(
        &self,
        auth: &AuthInfo,
        target: MutationTarget,
        transform: F,
    ) -> Result<MutationOutcome>
    where
        F: FnOnce(&ValidatedTarget) -> Result<Mutation> + Send,
    {
        let validated = self.validate(auth, target).await?;
        let mutation = transform(&validated)?;
        self.persist(&validated, mutation).await
    }

    /// Permanently remove one version and release its content.
    pub async fn remove_version(&self, bucket: &str, record: &ObjectMetadataRecord) -> Result<()> {
        remove_record(
            self.metadata.as_ref(),
            self.content.as_ref(),
            bucket,
            &record.key,
            &record.version_id,
            record.content_location(),
        )
        .await?;

        info!(
            bucket = %bucket,
            key = %record.key,
            version_id = %record.version_id,
            "Removed version"
        );
        Ok(())
    }

    /// Reclaim displaced null versions on a task of their own, so that the
    /// cleanup runs to completion even if the caller goes away after the
    /// primary write.
    async fn reclaim(&self, bucket: &str, stale: Vec<StaleNullVersion>) -> CleanupReport {
        if stale.is_empty() {
            return CleanupReport::default();
        }

        let metadata = Arc::clone(&self.metadata);
        let content = Arc::clone(&self.content);
        let bucket = bucket.to_string();
        let pending = stale.clone();

        let task = tokio::spawn(async move {
            let mut report = CleanupReport::default();
            for version in stale {
                let result = remove_record(
                    metadata.as_ref(),
                    content.as_ref(),
                    &bucket,
                    &version.key,
                    &version.version_id,
                    version.content.as_ref(),
                )
                .await;

                match result {
                    Ok(()) => {
                        debug!(
                            "Reclaimed stale null version {}/{}@{}",
                            bucket, version.key, version.version_id
                        );
                        report.reclaimed.push(version);
                    }
                    Err(err) => {
                        warn!(
                            bucket = %bucket,
                            key = %version.key,
                            version_id = %version.version_id,
                            error = %err,
                            "Failed to reclaim stale null version"
                        );
                        report.failed.push(version);
                    }
                }
            }
            report
        });

        match task.await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "Null version cleanup task did not complete");
                CleanupReport {
                    reclaimed: Vec::new(),
                    failed: pending,
                }
            }
        }
    }
}

/// Deletes the record, then releases its content. A failed release leaves
/// an unreferenced blob, never a record without content.
async fn remove_record(
    metadata: &dyn MetadataStore,
    content: &dyn ContentStore,
    bucket: &str,
    key: &str,
    version_id: &str,
    location: Option<&ContentLocation>,
) -> anyhow::Result<()> {
    metadata.delete_version(bucket, key, version_id).await?;
    if let Some(location) = location {
        content.release(location).await?;
    }
    Ok(())
}

fn missing_error(qualifier: VersionQualifier) -> EngineError {
    match qualifier {
        VersionQualifier::Current => EngineError::NoSuchKey,
        VersionQualifier::Null | VersionQualifier::Specific(_) => EngineError::NoSuchVersion,
    }
}

fn check_requirement(
    existing: Option<ObjectMetadataRecord>,
    qualifier: VersionQualifier,
    requirement: TargetRequirement,
) -> Result<Option<ObjectMetadataRecord>> {
    if requirement == TargetRequirement::Optional {
        return Ok(existing);
    }

    let record = existing.ok_or_else(|| missing_error(qualifier))?;
    if record.is_delete_marker() {
        // A current delete marker means the key is gone; addressing a
        // delete marker by id is only valid for operations that accept one.
        if qualifier == VersionQualifier::Current {
            return Err(EngineError::NoSuchKey);
        }
        if requirement == TargetRequirement::ExistingObject {
            return Err(EngineError::MethodNotAllowed);
        }
    }
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BucketOwnerAuthorizer;
    use shared_types::{ObjectContent, VersioningStatus};
    use std::collections::BTreeMap;
    use storage_backend::{ObjectStoreBackend, StorageConfig};

    fn pipeline() -> MutationPipeline {
        let backend = Arc::new(ObjectStoreBackend::from_config(StorageConfig::memory()).unwrap());
        MutationPipeline::new(
            backend.clone(),
            backend,
            Arc::new(BucketOwnerAuthorizer),
            0,
        )
    }

    async fn bucket_with(pipeline: &MutationPipeline, status: VersioningStatus) {
        let mut bucket = BucketRecord::new("bucket", "owner");
        bucket.versioning = status;
        pipeline.metadata().create_bucket(&bucket).await.unwrap();
    }

    fn owner() -> AuthInfo {
        AuthInfo::new("owner")
    }

    fn object_version(location: &str) -> Mutation {
        Mutation::Create(NewVersion {
            kind: RecordKind::Object(ObjectContent {
                location: ContentLocation::new(location),
                size: 0,
                content_md5: String::new(),
                content_type: None,
                user_metadata: BTreeMap::new(),
                tags: BTreeMap::new(),
            }),
            acl: AclInfo::private("owner"),
        })
    }

    fn put_target() -> MutationTarget {
        MutationTarget::new("bucket", "key", Action::PutObject)
    }

    #[tokio::test]
    async fn test_validate_missing_bucket() {
        let pipeline = pipeline();
        let err = pipeline.validate(&owner(), put_target()).await.unwrap_err();
        assert!(matches!(err, EngineError::NoSuchBucket));
    }

    #[tokio::test]
    async fn test_validate_rejects_other_requesters() {
        let pipeline = pipeline();
        bucket_with(&pipeline, VersioningStatus::Enabled).await;

        let err = pipeline
            .validate(&AuthInfo::new("mallory"), put_target())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AccessDenied));
    }

    #[tokio::test]
    async fn test_validate_rejects_empty_key() {
        let pipeline = pipeline();
        bucket_with(&pipeline, VersioningStatus::Enabled).await;

        let target = MutationTarget::new("bucket", "", Action::PutObject);
        let err = pipeline.validate(&owner(), target).await.unwrap_err();
        assert_eq!(err.code(), "InvalidArgument");
    }

    #[tokio::test]
    async fn test_validate_missing_key_and_version() {
        let pipeline = pipeline();
        bucket_with(&pipeline, VersioningStatus::Enabled).await;

        let target = put_target().requirement(TargetRequirement::ExistingObject);
        let err = pipeline.validate(&owner(), target).await.unwrap_err();
        assert!(matches!(err, EngineError::NoSuchKey));

        let target = put_target()
            .qualifier(VersionQualifier::Null)
            .requirement(TargetRequirement::Existing);
        let err = pipeline.validate(&owner(), target).await.unwrap_err();
        assert!(matches!(err, EngineError::NoSuchVersion));
    }

    #[tokio::test]
    async fn test_failed_validation_writes_nothing() {
        let pipeline = pipeline();
        bucket_with(&pipeline, VersioningStatus::Enabled).await;

        let result = pipeline
            .execute(&AuthInfo::new("mallory"), put_target(), |_| {
                Ok(object_version("bucket/data/a"))
            })
            .await;
        assert!(result.is_err());

        let chain = pipeline.metadata().list_versions("bucket", "key").await.unwrap();
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn test_transform_error_writes_nothing() {
        let pipeline = pipeline();
        bucket_with(&pipeline, VersioningStatus::Enabled).await;

        let err = pipeline
            .execute(&owner(), put_target(), |_| {
                Err(EngineError::InvalidTag("bad".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidTag");

        let chain = pipeline.metadata().list_versions("bucket", "key").await.unwrap();
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn test_create_in_versioned_bucket_mints_versioned_record() {
        let pipeline = pipeline();
        bucket_with(&pipeline, VersioningStatus::Enabled).await;

        let outcome = pipeline
            .execute(&owner(), put_target(), |_| Ok(object_version("bucket/data/a")))
            .await
            .unwrap();

        assert!(!outcome.record.is_null());
        assert_eq!(
            outcome.version_id,
            Some(codec::encode_internal(&outcome.record.version_id))
        );
        assert!(outcome.cleanup.reclaimed.is_empty());
    }

    #[tokio::test]
    async fn test_create_in_unversioned_bucket_has_no_version_header() {
        let pipeline = pipeline();
        bucket_with(&pipeline, VersioningStatus::Disabled).await;

        let outcome = pipeline
            .execute(&owner(), put_target(), |_| Ok(object_version("bucket/data/a")))
            .await
            .unwrap();

        assert!(outcome.record.is_null());
        assert_eq!(outcome.version_id, None);
    }

    #[tokio::test]
    async fn test_update_keeps_identity_of_existing_version() {
        let pipeline = pipeline();
        bucket_with(&pipeline, VersioningStatus::Suspended).await;

        let created = pipeline
            .execute(&owner(), put_target(), |_| Ok(object_version("bucket/data/a")))
            .await
            .unwrap();

        let target = put_target().requirement(TargetRequirement::ExistingObject);
        let updated = pipeline
            .execute(&owner(), target, |validated| {
                let mut record = validated.existing_object()?.clone();
                record.version_id = "tampered".to_string();
                if let Some(content) = record.content_mut() {
                    content.tags.insert("k".to_string(), "v".to_string());
                }
                Ok(Mutation::Update(record))
            })
            .await
            .unwrap();

        assert_eq!(updated.record.version_id, created.record.version_id);
        assert!(updated.record.is_null());
        assert_eq!(updated.version_id.as_deref(), Some("null"));

        let chain = pipeline.metadata().list_versions("bucket", "key").await.unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.latest().unwrap().content().unwrap().tags.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_marker_by_id_rejected_for_object_operations() {
        let pipeline = pipeline();
        bucket_with(&pipeline, VersioningStatus::Enabled).await;

        let marker = pipeline
            .execute(&owner(), put_target(), |_| {
                Ok(Mutation::Create(NewVersion {
                    kind: RecordKind::DeleteMarker,
                    acl: AclInfo::private("owner"),
                }))
            })
            .await
            .unwrap();
        let stamp = codec::VersionStamp::from_internal(&marker.record.version_id).unwrap();

        let target = put_target()
            .qualifier(VersionQualifier::Specific(stamp))
            .requirement(TargetRequirement::ExistingObject);
        let err = pipeline.validate(&owner(), target).await.unwrap_err();
        assert!(matches!(err, EngineError::MethodNotAllowed));

        let target = put_target()
            .qualifier(VersionQualifier::Specific(stamp))
            .requirement(TargetRequirement::Existing);
        assert!(pipeline.validate(&owner(), target).await.is_ok());

        let target = put_target().requirement(TargetRequirement::ExistingObject);
        let err = pipeline.validate(&owner(), target).await.unwrap_err();
        assert!(matches!(err, EngineError::NoSuchKey));
    }
}
