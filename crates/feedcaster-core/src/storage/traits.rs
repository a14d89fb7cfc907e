use crate::error::{FeedcasterError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Key-value document store for run state (content index, feed cursor).
///
/// `set` only stages a value. Nothing reaches disk until `flush` is called.
pub trait StateStore {
    /// Read a value, including values staged but not yet flushed.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Stage a value for the next flush.
    fn set(&mut self, key: &str, value: Value) -> Result<()>;

    /// Persist every staged value.
    fn flush(&mut self) -> Result<()>;
}

/// Read and decode a typed value. A value that exists but does not decode is
/// an integrity failure, never silently replaced.
pub fn load_state<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
            FeedcasterError::Integrity(format!("persisted '{}' is malformed: {}", key, e))
        }),
        None => Ok(None),
    }
}

/// Encode and stage a typed value.
pub fn save_state<T: Serialize>(store: &mut dyn StateStore, key: &str, value: &T) -> Result<()> {
    store.set(key, serde_json::to_value(value)?)
}
