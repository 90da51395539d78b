pub mod backend;
pub mod config;
pub mod error;
pub mod metadata;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use shared_types::{BucketRecord, ContentLocation, ObjectMetadataRecord};

pub use backend::ObjectStoreBackend;
pub use config::StorageConfig;
pub use error::StorageError;
pub use metadata::VersionChain;

/// How a version write treats a record already stored under the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with `StorageError::AlreadyExists` if the version id is taken.
    CreateOnly,
    /// Replace the stored record (in-place metadata edits).
    Overwrite,
}

/// Metadata persistence substrate: per-record linearizable get/put/list.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// # Errors
    /// Returns `StorageError::AlreadyExists` if the bucket is already present.
    async fn create_bucket(&self, bucket: &BucketRecord) -> Result<()>;

    async fn get_bucket(&self, name: &str) -> Result<Option<BucketRecord>>;

    async fn update_bucket(&self, bucket: &BucketRecord) -> Result<()>;

    /// Store one version record, keyed by `(bucket, record.key, record.version_id)`.
    async fn put_version(
        &self,
        bucket: &str,
        record: &ObjectMetadataRecord,
        mode: WriteMode,
    ) -> Result<()>;

    async fn get_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> Result<Option<ObjectMetadataRecord>>;

    /// Remove one version record. Removing a missing record succeeds.
    async fn delete_version(&self, bucket: &str, key: &str, version_id: &str) -> Result<()>;

    /// Rebuild the version chain of `key` from its stored records.
    async fn list_versions(&self, bucket: &str, key: &str) -> Result<VersionChain>;
}

/// Byte-level object content storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn write(&self, bucket: &str, data: Bytes) -> Result<ContentLocation>;

    async fn read(&self, location: &ContentLocation) -> Result<Bytes>;

    /// Copy stored content into `bucket`, returning the new location.
    async fn duplicate(&self, location: &ContentLocation, bucket: &str) -> Result<ContentLocation>;

    /// Release stored content. Releasing missing content succeeds.
    async fn release(&self, location: &ContentLocation) -> Result<()>;
}
