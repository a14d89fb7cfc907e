use crate::error::{FeedcasterError, Result};
use crate::storage::traits::StateStore;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// One pretty-printed JSON document per account.
pub struct JsonStateStore {
    path: PathBuf,
    doc: Map<String, Value>,
    dirty: bool,
}

impl JsonStateStore {
    /// Open the document at `path`. A missing file is an empty document; an
    /// unreadable or non-object document is an integrity failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let doc = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&raw) {
                    Ok(Value::Object(map)) => map,
                    Ok(_) => {
                        return Err(FeedcasterError::Integrity(format!(
                            "state file {} is not a JSON object",
                            path.display()
                        )))
                    }
                    Err(e) => {
                        return Err(FeedcasterError::Integrity(format!(
                            "state file {} is malformed: {}",
                            path.display(),
                            e
                        )))
                    }
                }
            }
        } else {
            Map::new()
        };

        Ok(Self {
            path,
            doc,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.doc.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.doc.insert(key.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Replace the document atomically.
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(&Value::Object(self.doc.clone()))?;
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;

        self.dirty = false;
        log::debug!("Wrote state to {}", self.path.display());
        Ok(())
    }
}
