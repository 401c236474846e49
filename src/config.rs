//! Datastore configuration via `polystore.toml`
//!
//! Names the backend a session binds to. On first use a default
//! `polystore.toml` can be written next to the application; to change
//! backends, edit the file and restart.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use polystore_core::{Datastore, Error, KeyGenerator, Result, UuidKeyGenerator};
use polystore_hash::{HashDatastore, MemoryHashClient};
use polystore_index::{IndexDatastore, MemoryIndexClient};

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "polystore.toml";

/// Backend adapters a config can name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hash-store adapter
    Hash,
    /// Secondary-index adapter
    Index,
}

/// Datastore configuration loaded from `polystore.toml`.
///
/// # Example
///
/// ```toml
/// # Backend: "hash" (default) or "index"
/// backend = "index"
///
/// # Bucket prefix for the index backend
/// app = "myapp_"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Backend name: `"hash"` or `"index"`.
    #[serde(default = "default_backend_str")]
    pub backend: String,
    /// Bucket prefix, used by the index backend.
    #[serde(default)]
    pub app: String,
}

fn default_backend_str() -> String {
    "hash".to_string()
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend_str(),
            app: String::new(),
        }
    }
}

impl DatastoreConfig {
    /// The backend this config names.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the name is not `"hash"` or `"index"`.
    pub fn backend(&self) -> Result<Backend> {
        match self.backend.as_str() {
            "hash" => Ok(Backend::Hash),
            "index" => Ok(Backend::Index),
            other => Err(Error::config(format!(
                "unknown backend '{}' in {} (expected \"hash\" or \"index\")",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Commented file written on first use.
    pub fn default_toml() -> &'static str {
        r#"# Polystore datastore configuration
#
# Backend: "hash" (default) or "index"
#   "hash"  = typed records over string hashes, queries evaluated in process
#   "index" = documents in per-kind buckets with secondary indexes
backend = "hash"

# Bucket prefix for the index backend (default: none)
app = ""
"#
    }

    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// `Config` when the file cannot be read or parsed, or names an unknown
    /// backend.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| file_error("read", path, e))?;
        let config: DatastoreConfig =
            toml::from_str(&content).map_err(|e| file_error("parse", path, e))?;
        config.backend()?;
        Ok(config)
    }

    /// Create the file with [`default_toml`](Self::default_toml) unless it
    /// already exists. An existing file is left untouched.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        std::fs::write(path, Self::default_toml()).map_err(|e| file_error("write", path, e))
    }

    /// Overwrite `path` with this config as TOML.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| file_error("write", path, e))
    }

    /// Build the configured adapter over its in-process server, with
    /// random record keys.
    pub fn open(&self) -> Result<Arc<dyn Datastore>> {
        self.open_with_keys(Arc::new(UuidKeyGenerator))
    }

    /// Build the configured adapter, taking new keys from `keys`.
    pub fn open_with_keys(&self, keys: Arc<dyn KeyGenerator>) -> Result<Arc<dyn Datastore>> {
        let datastore: Arc<dyn Datastore> = match self.backend()? {
            Backend::Hash => Arc::new(HashDatastore::new(MemoryHashClient::new(), keys)),
            Backend::Index => Arc::new(IndexDatastore::new(
                MemoryIndexClient::new(),
                keys,
                self.app.clone(),
            )),
        };
        info!(backend = datastore.name(), app = %self.app, "Opened datastore");
        Ok(datastore)
    }
}

fn file_error(action: &str, path: &Path, err: impl std::fmt::Display) -> Error {
    Error::config(format!(
        "cannot {} config file '{}': {}",
        action,
        path.display(),
        err
    ))
}
