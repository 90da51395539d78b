use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Versioning configuration of a bucket.
///
/// `Disabled` is both the initial state and the "never configured" state:
/// once a bucket has been versioned it can only move between `Enabled` and
/// `Suspended`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersioningStatus {
    #[default]
    Disabled,
    Enabled,
    Suspended,
}

impl VersioningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Enabled => "Enabled",
            Self::Suspended => "Suspended",
        }
    }

    /// Whether versioning was ever engaged on the bucket.
    pub fn is_configured(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl fmt::Display for VersioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket-level metadata read by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRecord {
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub versioning: VersioningStatus,
}

impl BucketRecord {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_id: owner_id.into(),
            created_at: Utc::now(),
            versioning: VersioningStatus::Disabled,
        }
    }
}

/// Opaque reference into the content store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentLocation(String);

impl ContentLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access control information carried through unchanged by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclInfo {
    pub owner_id: String,
    pub canned: String,
}

impl AclInfo {
    pub fn private(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            canned: "private".to_string(),
        }
    }
}

/// A single key/value tag as supplied by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Validated tags attached to an object version, keyed by tag key.
pub type TagSet = BTreeMap<String, String>;

/// Fields of a version that has backing content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectContent {
    pub location: ContentLocation,
    pub size: u64,
    pub content_md5: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: TagSet,
}

/// What a stored version is: an object with content, or a delete marker
/// that has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecordKind {
    Object(ObjectContent),
    DeleteMarker,
}

/// Whether a record currently plays the null-version role for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionRole {
    Versioned,
    Null,
}

/// One stored version of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadataRecord {
    pub key: String,
    /// Internal version identifier; sorts newest-first.
    pub version_id: String,
    pub role: VersionRole,
    pub kind: RecordKind,
    pub acl: AclInfo,
    pub last_modified: DateTime<Utc>,
}

impl ObjectMetadataRecord {
    pub fn is_null(&self) -> bool {
        self.role == VersionRole::Null
    }

    pub fn is_delete_marker(&self) -> bool {
        matches!(self.kind, RecordKind::DeleteMarker)
    }

    pub fn content(&self) -> Option<&ObjectContent> {
        match &self.kind {
            RecordKind::Object(content) => Some(content),
            RecordKind::DeleteMarker => None,
        }
    }

    pub fn content_mut(&mut self) -> Option<&mut ObjectContent> {
        match &mut self.kind {
            RecordKind::Object(content) => Some(content),
            RecordKind::DeleteMarker => None,
        }
    }

    pub fn content_location(&self) -> Option<&ContentLocation> {
        self.content().map(|c| &c.location)
    }
}

/// Summary of one entry in a key's version chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// Client-facing version id (`"null"` for the null version).
    pub version_id: String,
    pub is_latest: bool,
    pub is_delete_marker: bool,
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}
