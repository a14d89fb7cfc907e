use crate::config::{BotConfig, StateBackend};
use anyhow::{Context, Result};
use feedcaster_core::{JsonStateStore, RedbStateStore, StateStore};
use std::path::Path;

/// Open the account's state store with the configured backend.
pub fn open_store(config: &BotConfig, data_dir: Option<&Path>) -> Result<Box<dyn StateStore>> {
    let path = config.state_path(data_dir);
    tracing::debug!("Opening {:?} state at {}", config.state.backend, path.display());

    let store: Box<dyn StateStore> = match config.state.backend {
        StateBackend::Json => Box::new(
            JsonStateStore::open(&path)
                .with_context(|| format!("Failed to open state file {}", path.display()))?,
        ),
        StateBackend::Redb => Box::new(
            RedbStateStore::open(&path)
                .with_context(|| format!("Failed to open state database {}", path.display()))?,
        ),
    };
    Ok(store)
}
