//! Namespaced JSON document store.
//!
//! Skills live under the `skills` namespace, decision trees under `trees`.
//! Keys are unique within a namespace; `put` overwrites.

mod error;
mod json_dir;
mod memory;
mod sqlite;

use std::sync::Arc;

use poiscout_core::config::{PathsConfig, StoreBackend};

pub use error::StoreError;
pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type Result<T> = std::result::Result<T, StoreError>;

pub const SKILLS_NS: &str = "skills";
pub const TREES_NS: &str = "trees";

/// Key/value persistence for JSON documents.
///
/// Implementations are synchronous and internally synchronized, so one store
/// can be shared behind an `Arc` by the skill library and the tree store.
pub trait DocumentStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<serde_json::Value>>;
    fn put(&self, namespace: &str, key: &str, value: &serde_json::Value) -> Result<()>;
    /// All `(key, value)` pairs in the namespace, ordered by key.
    fn list(&self, namespace: &str) -> Result<Vec<(String, serde_json::Value)>>;
}

/// Open the backend selected in config, creating the data root when needed.
pub fn open_store(paths: &PathsConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match paths.store_backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::JsonDir => Arc::new(JsonDirStore::open(&paths.json_dir())?),
        StoreBackend::Sqlite => {
            std::fs::create_dir_all(&paths.data_root).map_err(|e| StoreError::io(&paths.data_root, e))?;
            Arc::new(SqliteStore::open(&paths.sqlite_path())?)
        }
    };
    tracing::debug!(backend = ?paths.store_backend, root = %paths.data_root.display(), "document store opened");
    Ok(store)
}
