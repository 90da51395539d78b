use crate::api::ObjectService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ObjectService>,
}
