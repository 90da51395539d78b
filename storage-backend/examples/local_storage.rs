use anyhow::Result;
use bytes::Bytes;
use chrono::Utc;
use shared_types::{
    AclInfo, BucketRecord, ObjectContent, ObjectMetadataRecord, RecordKind, VersionRole,
};
use std::collections::BTreeMap;
use storage_backend::{ContentStore, MetadataStore, ObjectStoreBackend, StorageConfig, WriteMode};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let storage_path = std::env::var("STORAGE_PATH").unwrap_or_else(|_| "./data".to_string());
    println!("Using storage path: {storage_path}");

    let backend = ObjectStoreBackend::from_config(StorageConfig::local(storage_path))?;

    let bucket = BucketRecord::new("example-bucket", "example-owner");
    if backend.get_bucket(&bucket.name).await?.is_none() {
        backend.create_bucket(&bucket).await?;
    }

    // Smaller ids list first, so "0001" is the newest version.
    for (version_id, body) in [("0002", "first draft"), ("0001", "second draft")] {
        let location = backend.write(&bucket.name, Bytes::from(body)).await?;
        let record = ObjectMetadataRecord {
            key: "notes/today.txt".to_string(),
            version_id: version_id.to_string(),
            role: VersionRole::Versioned,
            kind: RecordKind::Object(ObjectContent {
                location,
                size: body.len() as u64,
                content_md5: String::new(),
                content_type: Some("text/plain".to_string()),
                user_metadata: BTreeMap::new(),
                tags: BTreeMap::new(),
            }),
            acl: AclInfo::private(&bucket.owner_id),
            last_modified: Utc::now(),
        };
        backend
            .put_version(&bucket.name, &record, WriteMode::Overwrite)
            .await?;
        println!("Stored version {version_id}");
    }

    println!("\nVersion chain (newest first):");
    let chain = backend.list_versions(&bucket.name, "notes/today.txt").await?;
    for record in chain.iter() {
        if let Some(location) = record.content_location() {
            let body = backend.read(location).await?;
            println!(
                "  - {} => {}",
                record.version_id,
                String::from_utf8_lossy(&body)
            );
        }
    }

    Ok(())
}
