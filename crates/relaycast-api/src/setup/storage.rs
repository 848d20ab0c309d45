//! Staging storage setup

use anyhow::{Context, Result};
use relaycast_core::Config;
use relaycast_storage::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize staging storage")?;

    tracing::info!(
        backend = %config.storage_backend(),
        prefix = %config.staging_prefix(),
        "Staging storage ready"
    );

    Ok(storage)
}
