//! Key-value persistence.
//!
//! The core only needs "read the whole collection at startup, write the
//! whole collection on change"; no partial updates, no transactions.
//! State lives under `<root>/.slavko/<key>.json`:
//!
//! ```text
//! .slavko/
//! ├── history.json        # Chat history
//! ├── env_vars.json       # Environment variable list
//! ├── deploy_config.json  # Deploy configuration text
//! └── stats.json          # Deployment stat collection
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{StoreError, StoreResult};

/// Stable keys for the persisted collections.
pub mod keys {
    /// Chat history (whole collection).
    pub const HISTORY: &str = "history";
    /// Environment variable list.
    pub const ENV_VARS: &str = "env_vars";
    /// Deploy configuration text.
    pub const DEPLOY_CONFIG: &str = "deploy_config";
    /// Deployment stat collection.
    pub const STATS: &str = "stats";
}

/// Whole-value load/save keyed by stable string identifiers.
pub trait KvStore: Send + Sync {
    /// Read the whole value for a key. `None` if never saved.
    fn load(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the whole value for a key.
    fn save(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Drop a key entirely. Missing keys are a no-op.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Typed helpers over the raw string interface.
pub trait KvStoreExt: KvStore {
    fn load_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.load(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.save(key, &serde_json::to_string_pretty(value)?)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

/// Filesystem-backed store rooted at a workspace directory.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store for a workspace. The `.slavko` directory is created
    /// lazily on first save.
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            root: workspace_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(".slavko")
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.state_dir().join(format!("{key}.json")))
    }
}

impl KvStore for FileStore {
    fn load(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn save(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(self.state_dir())?;
        fs::write(&path, value)?;
        tracing::debug!(key, bytes = value.len(), "saved");
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn load(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.lock().expect("store lock").get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> StoreResult<()> {
        self.values
            .lock()
            .expect("store lock")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.values.lock().expect("store lock").remove(key);
        Ok(())
    }
}
