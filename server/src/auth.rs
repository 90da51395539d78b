use shared_types::BucketRecord;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Identity of the requester, established before any operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    canonical_id: String,
}

impl AuthInfo {
    pub fn new(canonical_id: impl Into<String>) -> Self {
        Self {
            canonical_id: canonical_id.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    pub fn canonical_id(&self) -> &str {
        &self.canonical_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetObject,
    PutObject,
    DeleteObject,
    GetObjectTagging,
    PutObjectTagging,
    ListObjectVersions,
    GetBucketVersioning,
    PutBucketVersioning,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetObject => "s3:GetObject",
            Self::PutObject => "s3:PutObject",
            Self::DeleteObject => "s3:DeleteObject",
            Self::GetObjectTagging => "s3:GetObjectTagging",
            Self::PutObjectTagging => "s3:PutObjectTagging",
            Self::ListObjectVersions => "s3:ListBucketVersions",
            Self::GetBucketVersioning => "s3:GetBucketVersioning",
            Self::PutBucketVersioning => "s3:PutBucketVersioning",
        }
    }
}

/// Decides whether a requester may perform an action on a bucket.
pub trait Authorizer: Send + Sync {
    /// # Errors
    /// Returns `EngineError::AccessDenied` when the action is not permitted.
    fn authorize(&self, auth: &AuthInfo, bucket: &BucketRecord, action: Action) -> Result<()>;
}

/// Grants every action to the bucket owner and nothing to anyone else.
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketOwnerAuthorizer;

impl Authorizer for BucketOwnerAuthorizer {
    fn authorize(&self, auth: &AuthInfo, bucket: &BucketRecord, action: Action) -> Result<()> {
        if auth.canonical_id() == bucket.owner_id {
            return Ok(());
        }
        debug!(
            "Denied {} on bucket {} to {}",
            action.as_str(),
            bucket.name,
            auth.canonical_id()
        );
        Err(EngineError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_is_allowed() {
        let bucket = BucketRecord::new("photos", "alice");
        let auth = AuthInfo::new("alice");
        assert!(BucketOwnerAuthorizer
            .authorize(&auth, &bucket, Action::PutObject)
            .is_ok());
    }

    #[test]
    fn test_other_requesters_are_denied() {
        let bucket = BucketRecord::new("photos", "alice");
        let err = BucketOwnerAuthorizer
            .authorize(&AuthInfo::anonymous(), &bucket, Action::GetObject)
            .unwrap_err();
        assert!(matches!(err, EngineError::AccessDenied));
    }
}
