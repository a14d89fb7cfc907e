use crate::error::Result;
use crate::storage::traits::StateStore;
use serde_json::Value;
use std::collections::BTreeMap;

/// Throwaway store. `flush` is a no-op, so nothing outlives the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `keys` out of another store, e.g. to rehearse a run without
    /// touching persisted state.
    pub fn snapshot(source: &dyn StateStore, keys: &[&str]) -> Result<Self> {
        let mut values = BTreeMap::new();
        for key in keys {
            if let Some(value) = source.get(key)? {
                values.insert(key.to_string(), value);
            }
        }
        Ok(Self { values })
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
