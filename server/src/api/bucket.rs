use shared_types::{BucketRecord, VersioningStatus};
use tracing::{info, instrument};

use super::ObjectService;
use crate::auth::{Action, AuthInfo};
use crate::error::{EngineError, Result};

impl ObjectService {
    #[instrument(skip(self, auth))]
    pub async fn create_bucket(&self, auth: &AuthInfo, name: &str) -> Result<BucketRecord> {
        validate_bucket_name(name)?;

        let record = BucketRecord::new(name, auth.canonical_id());
        if let Err(err) = self.pipeline.metadata().create_bucket(&record).await {
            let err = EngineError::from(err);
            return Err(if err.is_already_exists() {
                EngineError::BucketAlreadyExists
            } else {
                err
            });
        }

        info!("Created bucket {} for {}", name, auth.canonical_id());
        Ok(record)
    }

    /// Enable or suspend versioning. A bucket cannot return to the
    /// never-versioned state.
    #[instrument(skip(self, auth))]
    pub async fn put_bucket_versioning(
        &self,
        auth: &AuthInfo,
        bucket: &str,
        status: VersioningStatus,
    ) -> Result<()> {
        if !status.is_configured() {
            return Err(EngineError::InvalidArgument(
                "Versioning status must be Enabled or Suspended".to_string(),
            ));
        }

        let mut record = self
            .pipeline
            .authorized_bucket(auth, bucket, Action::PutBucketVersioning)
            .await?;
        if record.versioning == status {
            return Ok(());
        }

        record.versioning = status;
        self.pipeline.metadata().update_bucket(&record).await?;
        info!("Set versioning of bucket {} to {}", bucket, status);
        Ok(())
    }

    pub async fn get_bucket_versioning(
        &self,
        auth: &AuthInfo,
        bucket: &str,
    ) -> Result<VersioningStatus> {
        let record = self
            .pipeline
            .authorized_bucket(auth, bucket, Action::GetBucketVersioning)
            .await?;
        Ok(record.versioning)
    }
}

/// DNS-compatible names: 3 to 63 lowercase letters, digits, dots and
/// hyphens, starting and ending with a letter or digit.
fn validate_bucket_name(name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 63 {
        return Err(EngineError::InvalidBucketName(
            "Bucket name must be between 3 and 63 characters long".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(EngineError::InvalidBucketName(
            "Bucket name can only contain lowercase letters, numbers, dots and hyphens"
                .to_string(),
        ));
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
        return Err(EngineError::InvalidBucketName(
            "Bucket name must begin and end with a letter or number".to_string(),
        ));
    }
    if name.contains("..") {
        return Err(EngineError::InvalidBucketName(
            "Bucket name must not contain adjacent dots".to_string(),
        ));
    }
    Ok(())
}
