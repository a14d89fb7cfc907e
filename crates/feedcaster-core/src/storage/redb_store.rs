use crate::error::{FeedcasterError, Result};
use crate::storage::traits::StateStore;
use redb::{Database, TableDefinition};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Values are JSON documents stored as raw bytes.
const STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("state");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Current schema version.
/// v1 = JSON documents in the `state` table
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Redb-backed state store. Staged values are committed in a single write
/// transaction on `flush`.
pub struct RedbStateStore {
    db: Database,
    path: PathBuf,
    pending: BTreeMap<String, Value>,
}

impl RedbStateStore {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let is_new = !path.exists();
        let db = Database::create(&path)?;

        if is_new {
            let write_txn = db.begin_write()?;
            {
                let _ = write_txn.open_table(STATE)?;
                let mut meta = write_txn.open_table(META)?;
                meta.insert(SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string().as_bytes())?;
            }
            write_txn.commit()?;
        } else {
            Self::check_schema_version(&db)?;
            let write_txn = db.begin_write()?;
            {
                let _ = write_txn.open_table(STATE)?;
                let _ = write_txn.open_table(META)?;
            }
            write_txn.commit()?;
        }

        Ok(Self {
            db,
            path,
            pending: BTreeMap::new(),
        })
    }

    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = {
            let table = read_txn.open_table(META).ok();
            table.and_then(|t| {
                t.get(SCHEMA_VERSION_KEY).ok().flatten().and_then(|v| {
                    std::str::from_utf8(v.value())
                        .ok()
                        .and_then(|s| s.parse::<u32>().ok())
                })
            })
        };

        match version {
            Some(v) if v == CURRENT_SCHEMA_VERSION => Ok(()),
            Some(v) => Err(FeedcasterError::Integrity(format!(
                "state database schema v{} does not match this binary (v{})",
                v, CURRENT_SCHEMA_VERSION
            ))),
            None => Err(FeedcasterError::Integrity(
                "state database has no schema version".to_string(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for RedbStateStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Some(value) = self.pending.get(key) {
            return Ok(Some(value.clone()));
        }

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STATE)?;
        match table.get(key)? {
            Some(raw) => serde_json::from_slice(raw.value()).map(Some).map_err(|e| {
                FeedcasterError::Integrity(format!("stored '{}' is not valid JSON: {}", key, e))
            }),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.pending.insert(key.to_string(), value);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(STATE)?;
            for (key, value) in &self.pending {
                let bytes = serde_json::to_vec(value)?;
                table.insert(key.as_str(), bytes.as_slice())?;
            }
        }
        write_txn.commit()?;

        log::debug!(
            "Committed {} state keys to {}",
            self.pending.len(),
            self.path.display()
        );
        self.pending.clear();
        Ok(())
    }
}
