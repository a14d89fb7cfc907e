use super::{ContentIndex, IndexOrigin, SelectionPolicy};
use crate::config::IndexConfig;
use crate::error::{FeedcasterError, Result};
use crate::storage::{load_state, save_state, StateStore};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::path::PathBuf;

/// State key holding the serialized [`ContentIndex`].
pub const INDEX_STATE_KEY: &str = "content_index";

/// Owns the content index for one run: loads or rebuilds it, hands out
/// selections and persists every change through the state store.
pub struct ContentLibrary<'s> {
    store: &'s mut dyn StateStore,
    index: ContentIndex,
    origin: IndexOrigin,
    config: IndexConfig,
}

impl<'s> ContentLibrary<'s> {
    /// Load the persisted index and rebuild it when stale. A freshly scanned
    /// index is written back immediately.
    pub fn open(store: &'s mut dyn StateStore, config: IndexConfig, now: DateTime<Utc>) -> Result<Self> {
        let root = config.root().ok_or_else(|| {
            FeedcasterError::Config("index.folder is required for the folder source".into())
        })?;

        let persisted: Option<ContentIndex> = load_state(&*store, INDEX_STATE_KEY)?;
        let outcome = ContentIndex::rebuild(&root, config.max_age(), persisted, now);

        if outcome.origin == IndexOrigin::Scanned {
            save_state(&mut *store, INDEX_STATE_KEY, &outcome.index)?;
            store.flush()?;
        }

        Ok(Self {
            store,
            index: outcome.index,
            origin: outcome.origin,
            config,
        })
    }

    pub fn index(&self) -> &ContentIndex {
        &self.index
    }

    pub fn origin(&self) -> IndexOrigin {
        self.origin
    }

    pub fn policy(&self) -> SelectionPolicy {
        if self.config.post_only_once {
            SelectionPolicy::NeverExposed
        } else {
            SelectionPolicy::LeastExposed
        }
    }

    /// Absolute path of an indexed identifier.
    pub fn path_of(&self, id: &str) -> Option<PathBuf> {
        self.config.root().map(|root| root.join(id))
    }

    /// Select the next identifier, count the exposure and persist the index.
    /// Returns `Ok(None)` when nothing is available in scope.
    pub fn next<R: Rng + ?Sized>(&mut self, scope: Option<&str>, rng: &mut R) -> Result<Option<String>> {
        let policy = self.policy();
        let scope = scope.or(self.config.scope.as_deref());

        let Some(id) = self.index.select(policy, scope, rng).map(str::to_string) else {
            log::info!(
                "No content available (policy {}, scope {})",
                policy,
                scope.unwrap_or("<all>")
            );
            return Ok(None);
        };

        self.record(&id)?;
        Ok(Some(id))
    }

    /// Count one exposure of `id` and persist the index.
    pub fn record(&mut self, id: &str) -> Result<u64> {
        let count = self.index.record_selection(id).ok_or_else(|| {
            FeedcasterError::Integrity(format!("'{}' is not in the content index", id))
        })?;
        save_state(&mut *self.store, INDEX_STATE_KEY, &self.index)?;
        self.store.flush()?;
        log::info!("Selected {} (exposure count now {})", id, count);
        Ok(count)
    }
}
