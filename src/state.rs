use crate::api::Api;
use crate::config::{ServerConfig, StorageConfig};
use crate::registry::ConnectionRegistry;
use crate::store::{JsonFileStore, PgStore, Store};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<Api>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(api: Api, config: ServerConfig) -> Self {
        Self {
            api: Arc::new(api),
            config: Arc::new(config),
        }
    }

    /// Open the configured store, wire up the service and seed the initial
    /// admin if one is configured.
    pub async fn from_config(config: ServerConfig) -> Result<Self> {
        let store = open_store(&config.storage).await?;
        let api = Api::new(
            store,
            Arc::new(ConnectionRegistry::new()),
            config.bcrypt_cost,
        );

        if let Some(admin) = &config.initial_admin {
            api.ensure_admin(&admin.email, &admin.password, &admin.name)
                .await
                .context("Failed to seed initial admin")?;
        }

        Ok(Self::new(api, config))
    }
}

pub async fn open_store(storage: &StorageConfig) -> Result<Arc<dyn Store>> {
    match storage {
        StorageConfig::File { path } => {
            tracing::info!("Using file store at {}", path.display());
            let store = JsonFileStore::open(path.clone()).await?;
            Ok(Arc::new(store))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
        } => {
            tracing::info!("Connecting to Postgres store...");
            let store = PgStore::connect(url, *max_connections).await?;
            Ok(Arc::new(store))
        }
    }
}
