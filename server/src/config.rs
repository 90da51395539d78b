use anyhow::{Context, Result};
use std::net::SocketAddr;
use storage_backend::StorageConfig;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Process configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    pub storage: StorageConfig,
    /// Distinguishes version ids minted by concurrently running instances.
    pub instance_id: u16,
}

impl ServerConfig {
    /// Reads `BIND_ADDRESS`, `VERSION_INSTANCE_ID` and the storage
    /// variables understood by [`StorageConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        let bind_address = std::env::var("BIND_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDRESS is not a valid socket address")?;

        let instance_id = match std::env::var("VERSION_INSTANCE_ID") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("VERSION_INSTANCE_ID must be 0-65535, got {value}"))?,
            Err(_) => 0,
        };

        Ok(Self {
            bind_address,
            storage: StorageConfig::from_env()?,
            instance_id,
        })
    }
}
