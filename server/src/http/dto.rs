use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{Tag, VersionInfo, VersioningStatus};

/// Body of `PUT /:bucket?versioning` and `GET /:bucket?versioning`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersioningConfiguration {
    pub status: VersioningStatus,
}

/// Body of `PUT /:bucket/*key?tagging` and `GET /:bucket/*key?tagging`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tagging {
    pub tag_set: Vec<Tag>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyObjectResult {
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVersionsResponse {
    pub key: String,
    pub versions: Vec<VersionInfo>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Sub-resource selectors on bucket routes. Present-but-empty values
/// (`?versioning`) deserialize as `Some("")`.
#[derive(Debug, Default, Deserialize)]
pub struct BucketQuery {
    pub versioning: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectQuery {
    pub tagging: Option<String>,
    pub versions: Option<String>,
    #[serde(rename = "versionId")]
    pub version_id: Option<String>,
}
