pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod tagging;
pub mod versioning;

pub use error::{EngineError, Result};
