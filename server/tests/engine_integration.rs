#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use anyhow::Result;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use server::api::{GetObjectInput, ObjectService, PutObjectInput};
use server::auth::AuthInfo;
use server::http::{router, REQUESTER_HEADER, VERSION_ID_HEADER};
use server::versioning::NULL_VERSION_ID;
use shared_types::VersioningStatus;
use std::sync::Arc;
use storage_backend::{MetadataStore, ObjectStoreBackend, StorageConfig};
use tempfile::TempDir;
use tower::util::ServiceExt;

const BUCKET: &str = "archive";
const KEY: &str = "reports/q1.csv";

fn local_backend(dir: &TempDir) -> Result<Arc<ObjectStoreBackend>> {
    let config = StorageConfig::Local {
        path: dir.path().to_path_buf(),
    };
    Ok(Arc::new(ObjectStoreBackend::from_config(config)?))
}

fn owner() -> AuthInfo {
    AuthInfo::new("owner")
}

fn put_input(body: &'static str) -> PutObjectInput {
    PutObjectInput {
        bucket: BUCKET.to_string(),
        key: KEY.to_string(),
        body: Bytes::from_static(body.as_bytes()),
        ..PutObjectInput::default()
    }
}

fn get_input(version_id: Option<&str>) -> GetObjectInput {
    GetObjectInput {
        bucket: BUCKET.to_string(),
        key: KEY.to_string(),
        version_id: version_id.map(str::to_string),
    }
}

/// Number of content blobs stored for the bucket on disk.
fn stored_blobs(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path().join(BUCKET).join("data"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_disabled_enabled_suspended_lifecycle() -> Result<()> {
    let dir = TempDir::new()?;
    let backend = local_backend(&dir)?;
    let service = ObjectService::from_backend(backend.clone(), 1);

    service.create_bucket(&owner(), BUCKET).await?;

    // A: the null version of a never-versioned bucket.
    let a = service.put_object(&owner(), put_input("A")).await?;
    assert_eq!(a.version_id, None);

    // B: A survives as the null version.
    service
        .put_bucket_versioning(&owner(), BUCKET, VersioningStatus::Enabled)
        .await?;
    let b = service.put_object(&owner(), put_input("B")).await?;
    let b_id = b.version_id.clone().expect("versioned put returns an id");
    let a_now = service
        .get_object(&owner(), get_input(Some(NULL_VERSION_ID)))
        .await?;
    assert_eq!(a_now.body, Bytes::from_static(b"A"));
    assert_eq!(stored_blobs(&dir), 2);

    // C: replaces A as the null version; B is untouched.
    service
        .put_bucket_versioning(&owner(), BUCKET, VersioningStatus::Suspended)
        .await?;
    let c = service.put_object(&owner(), put_input("C")).await?;
    assert_eq!(c.version_id.as_deref(), Some(NULL_VERSION_ID));
    assert_eq!(c.cleanup.reclaimed.len(), 1);
    assert!(c.cleanup.is_clean());

    let chain = backend.list_versions(BUCKET, KEY).await?;
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.null_versions().count(), 1);
    assert_eq!(stored_blobs(&dir), 2);

    let listed: Vec<_> = service
        .list_object_versions(&owner(), BUCKET, KEY)
        .await?
        .into_iter()
        .map(|v| v.version_id)
        .collect();
    assert_eq!(listed, vec![NULL_VERSION_ID.to_string(), b_id.clone()]);

    let b_now = service
        .get_object(&owner(), get_input(Some(b_id.as_str())))
        .await?;
    assert_eq!(b_now.body, Bytes::from_static(b"B"));
    let current = service.get_object(&owner(), get_input(None)).await?;
    assert_eq!(current.body, Bytes::from_static(b"C"));

    Ok(())
}

#[tokio::test]
async fn test_versions_survive_restart() -> Result<()> {
    let dir = TempDir::new()?;

    let ids = {
        let service = ObjectService::from_backend(local_backend(&dir)?, 1);
        service.create_bucket(&owner(), BUCKET).await?;
        service
            .put_bucket_versioning(&owner(), BUCKET, VersioningStatus::Enabled)
            .await?;

        let mut ids = Vec::new();
        for body in ["one", "two"] {
            ids.push(service.put_object(&owner(), put_input(body)).await?.version_id);
        }
        ids
    };

    // A fresh process on the same storage keeps minting newer versions.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let service = ObjectService::from_backend(local_backend(&dir)?, 2);
    let three = service.put_object(&owner(), put_input("three")).await?;

    let listed: Vec<_> = service
        .list_object_versions(&owner(), BUCKET, KEY)
        .await?
        .into_iter()
        .map(|v| Some(v.version_id))
        .collect();
    assert_eq!(
        listed,
        vec![three.version_id, ids[1].clone(), ids[0].clone()]
    );

    let first = service
        .get_object(&owner(), get_input(ids[0].as_deref()))
        .await?;
    assert_eq!(first.body, Bytes::from_static(b"one"));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_versioned_puts_are_all_kept() -> Result<()> {
    let dir = TempDir::new()?;
    let service = Arc::new(ObjectService::from_backend(local_backend(&dir)?, 1));
    service.create_bucket(&owner(), BUCKET).await?;
    service
        .put_bucket_versioning(&owner(), BUCKET, VersioningStatus::Enabled)
        .await?;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.put_object(&owner(), put_input("body")).await })
        })
        .collect();

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        let output = handle.await??;
        assert!(ids.insert(output.version_id.expect("versioned put returns an id")));
    }

    let listed = service.list_object_versions(&owner(), BUCKET, KEY).await?;
    assert_eq!(listed.len(), 8);
    assert_eq!(listed.iter().filter(|v| v.is_latest).count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_http_suspended_overwrite() -> Result<()> {
    let dir = TempDir::new()?;
    let service = Arc::new(ObjectService::from_backend(local_backend(&dir)?, 1));
    let app = router(service);

    let send = |method: &str, uri: &str, body: &'static str| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(REQUESTER_HEADER, "owner")
            .body(Body::from(body))
    };

    let response = app.clone().oneshot(send("PUT", "/archive", "")?).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(send(
            "PUT",
            "/archive?versioning",
            r#"{"status":"Suspended"}"#,
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    for body in ["first", "second"] {
        let response = app
            .clone()
            .oneshot(send("PUT", "/archive/reports/q1.csv", body)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(VERSION_ID_HEADER).map(|v| v.as_bytes()),
            Some(NULL_VERSION_ID.as_bytes())
        );
    }

    assert_eq!(stored_blobs(&dir), 1);

    let response = app
        .oneshot(send("GET", "/archive/reports/q1.csv?versionId=null", "")?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024).await?;
    assert_eq!(&body[..], b"second");

    Ok(())
}
