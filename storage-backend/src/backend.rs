use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutPayload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{BucketRecord, ContentLocation, ObjectMetadataRecord};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::metadata::VersionChain;
use crate::{ContentStore, MetadataStore, WriteMode};

/// Metadata and content store on top of any `object_store` implementation.
///
/// Layout inside the store:
///
/// ```text
/// <bucket>/bucket.json
/// <bucket>/objects/<key>/versions/<version_id>.json
/// <bucket>/data/<uuid>
/// ```
///
/// Object keys are a single encoded path segment, so `a/b` and `a` never
/// share a listing prefix.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    pub fn from_config(config: StorageConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config {
            StorageConfig::Local { path } => {
                info!("Initializing local storage at: {:?}", path);
                std::fs::create_dir_all(&path)
                    .with_context(|| format!("Failed to create storage directory {path:?}"))?;
                Arc::new(LocalFileSystem::new_with_prefix(path)?)
            }
            StorageConfig::Memory => {
                info!("Initializing in-memory storage");
                Arc::new(InMemory::new())
            }
            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
                allow_http,
            } => {
                info!("Initializing S3 storage in bucket: {}", bucket);
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_allow_http(allow_http)
                    .with_conditional_put(S3ConditionalPut::ETagMatch);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(access_key_id) = access_key_id {
                    builder = builder.with_access_key_id(access_key_id);
                }
                if let Some(secret_access_key) = secret_access_key {
                    builder = builder.with_secret_access_key(secret_access_key);
                }
                Arc::new(builder.build()?)
            }
        };

        Ok(Self::from_store(store))
    }

    /// Wraps an already built store, such as a preconfigured cloud client.
    pub fn from_store(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn bucket_path(&self, bucket: &str) -> Path {
        Path::from_iter([bucket, "bucket.json"])
    }

    fn versions_prefix(&self, bucket: &str, key: &str) -> Path {
        Path::from_iter([bucket, "objects", key, "versions"])
    }

    fn version_path(&self, bucket: &str, key: &str, version_id: &str) -> Path {
        let file = format!("{version_id}.json");
        self.versions_prefix(bucket, key).child(file.as_str())
    }

    fn new_content_path(&self, bucket: &str) -> Path {
        let id = uuid::Uuid::new_v4().to_string();
        Path::from_iter([bucket, "data", id.as_str()])
    }

    fn content_path(&self, location: &ContentLocation) -> Result<Path> {
        Path::parse(location.as_str())
            .map_err(|_| StorageError::InvalidLocation(location.to_string()).into())
    }

    async fn read_json<T: DeserializeOwned + Send>(&self, path: &Path) -> Result<Option<T>> {
        match self.store.get(path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                let value = serde_json::from_slice(&bytes).map_err(StorageError::from)?;
                Ok(Some(value))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize + Sync>(
        &self,
        path: &Path,
        value: &T,
        mode: WriteMode,
    ) -> Result<()> {
        let json = serde_json::to_vec_pretty(value).map_err(StorageError::from)?;
        let payload = PutPayload::from(json);

        match mode {
            WriteMode::Overwrite => {
                self.store.put(path, payload).await?;
                Ok(())
            }
            WriteMode::CreateOnly => {
                match self
                    .store
                    .put_opts(path, payload.clone(), PutMode::Create.into())
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(object_store::Error::AlreadyExists { .. }) => {
                        Err(StorageError::AlreadyExists(path.to_string()).into())
                    }
                    Err(object_store::Error::NotImplemented) => {
                        // Existence check only; not atomic against a concurrent writer.
                        debug!("Conditional put unsupported, checking {} before writing", path);
                        match self.store.head(path).await {
                            Ok(_) => Err(StorageError::AlreadyExists(path.to_string()).into()),
                            Err(object_store::Error::NotFound { .. }) => {
                                self.store.put(path, payload).await?;
                                Ok(())
                            }
                            Err(e) => Err(e.into()),
                        }
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    async fn delete_path(&self, path: &Path) -> Result<()> {
        match self.store.delete(path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MetadataStore for ObjectStoreBackend {
    #[instrument(skip(self, bucket), fields(bucket = %bucket.name))]
    async fn create_bucket(&self, bucket: &BucketRecord) -> Result<()> {
        let path = self.bucket_path(&bucket.name);
        self.write_json(&path, bucket, WriteMode::CreateOnly)
            .await
            .map_err(|e| match e.downcast_ref::<StorageError>() {
                Some(StorageError::AlreadyExists(_)) => {
                    StorageError::AlreadyExists(format!("bucket {}", bucket.name)).into()
                }
                _ => e,
            })?;

        info!("Created bucket {}", bucket.name);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_bucket(&self, name: &str) -> Result<Option<BucketRecord>> {
        self.read_json(&self.bucket_path(name)).await
    }

    #[instrument(skip(self, bucket), fields(bucket = %bucket.name))]
    async fn update_bucket(&self, bucket: &BucketRecord) -> Result<()> {
        let path = self.bucket_path(&bucket.name);
        self.write_json(&path, bucket, WriteMode::Overwrite).await?;
        debug!("Updated bucket {} (versioning {})", bucket.name, bucket.versioning);
        Ok(())
    }

    #[instrument(skip(self, record), fields(key = %record.key, version_id = %record.version_id))]
    async fn put_version(
        &self,
        bucket: &str,
        record: &ObjectMetadataRecord,
        mode: WriteMode,
    ) -> Result<()> {
        let path = self.version_path(bucket, &record.key, &record.version_id);
        self.write_json(&path, record, mode).await?;
        debug!("Stored version record {}", path);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> Result<Option<ObjectMetadataRecord>> {
        self.read_json(&self.version_path(bucket, key, version_id)).await
    }

    #[instrument(skip(self))]
    async fn delete_version(&self, bucket: &str, key: &str, version_id: &str) -> Result<()> {
        let path = self.version_path(bucket, key, version_id);
        self.delete_path(&path).await?;
        debug!("Deleted version record {}", path);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_versions(&self, bucket: &str, key: &str) -> Result<VersionChain> {
        let prefix = self.versions_prefix(bucket, key);
        let mut stream = self.store.list(Some(&prefix));
        let mut records = Vec::new();

        while let Some(item) = stream.next().await {
            let meta = match item {
                Ok(meta) => meta,
                Err(object_store::Error::NotFound { .. }) => continue,
                Err(e) => return Err(e.into()),
            };

            // A record may be removed between the listing and the read.
            if let Some(record) = self.read_json::<ObjectMetadataRecord>(&meta.location).await? {
                records.push(record);
            }
        }

        debug!("Listed {} versions for {}/{}", records.len(), bucket, key);
        Ok(VersionChain::new(records))
    }
}

#[async_trait]
impl ContentStore for ObjectStoreBackend {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn write(&self, bucket: &str, data: Bytes) -> Result<ContentLocation> {
        let path = self.new_content_path(bucket);
        self.store.put(&path, PutPayload::from(data)).await?;
        Ok(ContentLocation::new(path.to_string()))
    }

    #[instrument(skip(self))]
    async fn read(&self, location: &ContentLocation) -> Result<Bytes> {
        let path = self.content_path(location)?;
        match self.store.get(&path).await {
            Ok(result) => Ok(result.bytes().await?),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StorageError::NotFound(location.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn duplicate(&self, location: &ContentLocation, bucket: &str) -> Result<ContentLocation> {
        let from = self.content_path(location)?;
        let to = self.new_content_path(bucket);
        self.store
            .copy(&from, &to)
            .await
            .with_context(|| format!("Failed to copy content {location}"))?;
        Ok(ContentLocation::new(to.to_string()))
    }

    #[instrument(skip(self))]
    async fn release(&self, location: &ContentLocation) -> Result<()> {
        let path = self.content_path(location)?;
        self.delete_path(&path).await?;
        debug!("Released content {}", location);
        Ok(())
    }
}
