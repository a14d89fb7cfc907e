pub mod json_store;
pub mod memory_store;
pub mod redb_store;
pub mod traits;

pub use json_store::JsonStateStore;
pub use memory_store::MemoryStateStore;
pub use redb_store::{RedbStateStore, CURRENT_SCHEMA_VERSION};
pub use traits::{load_state, save_state, StateStore};
