use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::dto::ErrorResponse;
use crate::error::EngineError;

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// The request body could not be decoded.
    MalformedBody(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Engine(EngineError::Storage(err)) => {
                error!("Storage failure: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    "We encountered an internal error. Please try again.".to_string(),
                )
            }
            ApiError::Engine(err) => (err.status_code(), err.code(), err.to_string()),
            ApiError::MalformedBody(msg) => (StatusCode::BAD_REQUEST, "MalformedBody", msg),
        };

        let body = Json(ErrorResponse {
            code: code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
