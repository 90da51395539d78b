use anyhow::Result;
use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::{handlers, state::AppState};
use crate::api::ObjectService;

pub fn router(service: Arc<ObjectService>) -> Router {
    let app_state = Arc::new(AppState { service });

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Bucket creation and versioning configuration
        .route(
            "/:bucket",
            get(handlers::get_bucket).put(handlers::put_bucket),
        )
        // Objects, copies, tagging and version listings
        .route(
            "/:bucket/*key",
            get(handlers::get_object)
                .put(handlers::put_object)
                .delete(handlers::delete_object),
        )
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(service: Arc<ObjectService>, bind_address: SocketAddr) -> Result<()> {
    let app = router(service);

    info!("Server listening on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
