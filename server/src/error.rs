use axum::http::StatusCode;
use storage_backend::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by every mutating and reading object operation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("The specified bucket does not exist")]
    NoSuchBucket,

    #[error("The specified key does not exist")]
    NoSuchKey,

    #[error("The specified version does not exist")]
    NoSuchVersion,

    #[error("The requested bucket name is not available")]
    BucketAlreadyExists,

    #[error("The specified bucket is not valid: {0}")]
    InvalidBucketName(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("The specified method is not allowed against this resource")]
    MethodNotAllowed,

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::NoSuchBucket | EngineError::NoSuchKey | EngineError::NoSuchVersion => {
                StatusCode::NOT_FOUND
            }
            EngineError::BucketAlreadyExists => StatusCode::CONFLICT,
            EngineError::InvalidBucketName(_)
            | EngineError::InvalidArgument(_)
            | EngineError::InvalidTag(_)
            | EngineError::BadRequest(_)
            | EngineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            EngineError::AccessDenied => StatusCode::FORBIDDEN,
            EngineError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, identical across operations.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NoSuchBucket => "NoSuchBucket",
            EngineError::NoSuchKey => "NoSuchKey",
            EngineError::NoSuchVersion => "NoSuchVersion",
            EngineError::BucketAlreadyExists => "BucketAlreadyExists",
            EngineError::InvalidBucketName(_) => "InvalidBucketName",
            EngineError::InvalidArgument(_) => "InvalidArgument",
            EngineError::InvalidTag(_) => "InvalidTag",
            EngineError::BadRequest(_) => "BadRequest",
            EngineError::InvalidRequest(_) => "InvalidRequest",
            EngineError::AccessDenied => "AccessDenied",
            EngineError::MethodNotAllowed => "MethodNotAllowed",
            EngineError::Storage(_) => "InternalError",
        }
    }

    /// Whether the storage layer reported an id collision on a create-only write.
    pub(crate) fn is_already_exists(&self) -> bool {
        match self {
            EngineError::Storage(err) => matches!(
                err.downcast_ref::<StorageError>(),
                Some(StorageError::AlreadyExists(_))
            ),
            _ => false,
        }
    }
}
