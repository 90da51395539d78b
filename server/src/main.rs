use anyhow::Result;
use server::api::ObjectService;
use server::config::ServerConfig;
use std::sync::Arc;
use storage_backend::ObjectStoreBackend;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    info!("Starting versioned object server");

    let config = ServerConfig::from_env()?;
    info!("Minting version ids as instance {}", config.instance_id);

    let backend = Arc::new(ObjectStoreBackend::from_config(config.storage)?);
    let service = Arc::new(ObjectService::from_backend(backend, config.instance_id));

    server::http::start_server(service, config.bind_address).await?;

    Ok(())
}
