use crate::backend::ObjectStoreBackend;
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::{ContentStore, MetadataStore, WriteMode};
use bytes::Bytes;
use chrono::Utc;
use shared_types::{
    AclInfo, BucketRecord, ContentLocation, ObjectContent, ObjectMetadataRecord, RecordKind,
    VersionRole, VersioningStatus,
};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn create_test_backend() -> (ObjectStoreBackend, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig::Local {
        path: temp_dir.path().to_path_buf(),
    };
    let backend = ObjectStoreBackend::from_config(config).unwrap();
    (backend, temp_dir)
}

fn object_record(key: &str, version_id: &str, location: &str) -> ObjectMetadataRecord {
    ObjectMetadataRecord {
        key: key.to_string(),
        version_id: version_id.to_string(),
        role: VersionRole::Versioned,
        kind: RecordKind::Object(ObjectContent {
            location: ContentLocation::new(location),
            size: 3,
            content_md5: "acbd18db4cc2f85cedef654fccc4a4d8".to_string(),
            content_type: Some("text/plain".to_string()),
            user_metadata: BTreeMap::new(),
            tags: BTreeMap::new(),
        }),
        acl: AclInfo::private("owner"),
        last_modified: Utc::now(),
    }
}

#[tokio::test]
async fn test_create_and_get_bucket() {
    let (backend, _dir) = create_test_backend();

    let bucket = BucketRecord::new("photos", "owner");
    backend.create_bucket(&bucket).await.unwrap();

    let stored = backend.get_bucket("photos").await.unwrap().unwrap();
    assert_eq!(stored.owner_id, "owner");
    assert_eq!(stored.versioning, VersioningStatus::Disabled);

    assert!(backend.get_bucket("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_bucket_twice_fails() {
    let (backend, _dir) = create_test_backend();

    let bucket = BucketRecord::new("photos", "owner");
    backend.create_bucket(&bucket).await.unwrap();

    let err = backend.create_bucket(&bucket).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::AlreadyExists(_))
    ));
}

#[tokio::test]
async fn test_update_bucket_versioning() {
    let (backend, _dir) = create_test_backend();

    let mut bucket = BucketRecord::new("photos", "owner");
    backend.create_bucket(&bucket).await.unwrap();

    bucket.versioning = VersioningStatus::Enabled;
    backend.update_bucket(&bucket).await.unwrap();

    let stored = backend.get_bucket("photos").await.unwrap().unwrap();
    assert_eq!(stored.versioning, VersioningStatus::Enabled);
}

#[tokio::test]
async fn test_put_and_get_version() {
    let (backend, _dir) = create_test_backend();

    let record = object_record("docs/readme.md", "0001", "photos/data/a");
    backend
        .put_version("photos", &record, WriteMode::CreateOnly)
        .await
        .unwrap();

    let stored = backend
        .get_version("photos", "docs/readme.md", "0001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, record);

    let missing = backend
        .get_version("photos", "docs/readme.md", "0002")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_create_only_rejects_existing_version() {
    let (backend, _dir) = create_test_backend();

    let record = object_record("key", "0001", "photos/data/a");
    backend
        .put_version("photos", &record, WriteMode::CreateOnly)
        .await
        .unwrap();

    let err = backend
        .put_version("photos", &record, WriteMode::CreateOnly)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::AlreadyExists(_))
    ));

    // Overwrite is how in-place edits land.
    backend
        .put_version("photos", &record, WriteMode::Overwrite)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_versions_newest_first() {
    let (backend, _dir) = create_test_backend();

    for id in ["0300", "0100", "0200"] {
        let record = object_record("key", id, "photos/data/a");
        backend
            .put_version("photos", &record, WriteMode::CreateOnly)
            .await
            .unwrap();
    }

    let chain = backend.list_versions("photos", "key").await.unwrap();
    let ids: Vec<_> = chain.iter().map(|r| r.version_id.clone()).collect();
    assert_eq!(ids, vec!["0100", "0200", "0300"]);
}

#[tokio::test]
async fn test_list_versions_does_not_mix_keys() {
    let (backend, _dir) = create_test_backend();

    for key in ["a", "a/b", "ab"] {
        let record = object_record(key, "0001", "photos/data/a");
        backend
            .put_version("photos", &record, WriteMode::CreateOnly)
            .await
            .unwrap();
    }

    for key in ["a", "a/b", "ab"] {
        let chain = backend.list_versions("photos", key).await.unwrap();
        assert_eq!(chain.len(), 1, "key {key}");
        assert_eq!(chain.latest().unwrap().key, key);
    }

    let empty = backend.list_versions("photos", "nothing").await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_delete_version_is_idempotent() {
    let (backend, _dir) = create_test_backend();

    let record = object_record("key", "0001", "photos/data/a");
    backend
        .put_version("photos", &record, WriteMode::CreateOnly)
        .await
        .unwrap();

    backend.delete_version("photos", "key", "0001").await.unwrap();
    backend.delete_version("photos", "key", "0001").await.unwrap();

    assert!(backend
        .get_version("photos", "key", "0001")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_content_write_read_release() {
    let (backend, _dir) = create_test_backend();

    let location = backend
        .write("photos", Bytes::from_static(b"hello"))
        .await
        .unwrap();
    assert!(location.as_str().starts_with("photos/data/"));

    let data = backend.read(&location).await.unwrap();
    assert_eq!(data, Bytes::from_static(b"hello"));

    backend.release(&location).await.unwrap();
    let err = backend.read(&location).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::NotFound(_))
    ));

    // Releasing twice is fine.
    backend.release(&location).await.unwrap();
}

#[tokio::test]
async fn test_content_duplicate_is_independent() {
    let backend = ObjectStoreBackend::from_config(StorageConfig::memory()).unwrap();

    let original = backend
        .write("source", Bytes::from_static(b"payload"))
        .await
        .unwrap();
    let copy = backend.duplicate(&original, "dest").await.unwrap();
    assert_ne!(original, copy);
    assert!(copy.as_str().starts_with("dest/data/"));

    backend.release(&original).await.unwrap();
    assert_eq!(
        backend.read(&copy).await.unwrap(),
        Bytes::from_static(b"payload")
    );
}

#[test]
fn test_storage_config_from_env_defaults_to_local() {
    // Only meaningful when the variable is not set by the environment.
    if std::env::var("STORAGE_BACKEND").is_err() {
        let config = StorageConfig::from_env().unwrap();
        assert!(matches!(config, StorageConfig::Local { .. }));
    }
}

/// In-memory store that rejects conditional puts, like S3 without
/// conditional put support.
#[derive(Debug, Default)]
struct NoConditionalPut {
    inner: object_store::memory::InMemory,
}

impl std::fmt::Display for NoConditionalPut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NoConditionalPut({})", self.inner)
    }
}

#[async_trait::async_trait]
impl object_store::ObjectStore for NoConditionalPut {
    async fn put_opts(
        &self,
        location: &object_store::path::Path,
        payload: object_store::PutPayload,
        opts: object_store::PutOptions,
    ) -> object_store::Result<object_store::PutResult> {
        if matches!(opts.mode, object_store::PutMode::Create) {
            return Err(object_store::Error::NotImplemented);
        }
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &object_store::path::Path,
        opts: object_store::PutMultipartOpts,
    ) -> object_store::Result<Box<dyn object_store::MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &object_store::path::Path,
        options: object_store::GetOptions,
    ) -> object_store::Result<object_store::GetResult> {
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &object_store::path::Path) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(
        &self,
        prefix: Option<&object_store::path::Path>,
    ) -> futures::stream::BoxStream<'_, object_store::Result<object_store::ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(
        &self,
        prefix: Option<&object_store::path::Path>,
    ) -> object_store::Result<object_store::ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(
        &self,
        from: &object_store::path::Path,
        to: &object_store::path::Path,
    ) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(
        &self,
        from: &object_store::path::Path,
        to: &object_store::path::Path,
    ) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

#[tokio::test]
async fn test_create_only_without_conditional_put_support() {
    let backend =
        ObjectStoreBackend::from_store(std::sync::Arc::new(NoConditionalPut::default()));

    let mut bucket = BucketRecord::new("photos", "alice");
    backend.create_bucket(&bucket).await.unwrap();
    bucket.versioning = VersioningStatus::Enabled;
    backend.update_bucket(&bucket).await.unwrap();

    let err = backend
        .create_bucket(&BucketRecord::new("photos", "mallory"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::AlreadyExists(_))
    ));

    let stored = backend.get_bucket("photos").await.unwrap().unwrap();
    assert_eq!(stored.owner_id, "alice");
    assert_eq!(stored.versioning, VersioningStatus::Enabled);

    let record = object_record("key", "0001", "photos/data/a");
    backend
        .put_version("photos", &record, WriteMode::CreateOnly)
        .await
        .unwrap();
    let err = backend
        .put_version("photos", &record, WriteMode::CreateOnly)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::AlreadyExists(_))
    ));
}
