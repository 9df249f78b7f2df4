//! Persistent storage for the registry.

use super::Registry;
use crate::error::ApiError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// JSON snapshot store for the registry.
pub struct FileStore {
    storage_path: PathBuf,
}

impl FileStore {
    /// Create a new file store.
    pub fn new(storage_path: PathBuf) -> Self {
        Self { storage_path }
    }

    /// Save the registry to its snapshot file.
    pub async fn save(&self, registry: &Registry) -> Result<(), ApiError> {
        let data = serde_json::to_vec_pretty(registry)?;

        // Ensure parent directory exists
        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file + rename
        let temp_path = self.storage_path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &self.storage_path).await?;

        debug!(
            "Saved registry snapshot ({} bytes) to {:?}",
            data.len(),
            self.storage_path
        );
        Ok(())
    }

    /// Load the registry from its snapshot file.
    ///
    /// Returns an empty registry if the file doesn't exist.
    pub async fn load(&self) -> Result<Registry, ApiError> {
        if !self.storage_path.exists() {
            info!(
                "Registry file not found at {:?}, starting with empty registry",
                self.storage_path
            );
            return Ok(Registry::new());
        }

        let data = fs::read(&self.storage_path).await?;
        let registry: Registry = serde_json::from_slice(&data)?;

        info!(
            tokens = registry.token_count(),
            accounts = registry.account_count(),
            "Loaded registry from {:?}",
            self.storage_path
        );
        Ok(registry)
    }
}

/// In-memory store for testing or when persistence is disabled.
pub struct MemoryStore;

impl MemoryStore {
    /// "Save" does nothing for memory store.
    pub async fn save(&self, _registry: &Registry) -> Result<(), ApiError> {
        debug!("Memory store: save is a no-op");
        Ok(())
    }

    /// "Load" returns an empty registry.
    pub async fn load(&self) -> Result<Registry, ApiError> {
        debug!("Memory store: returning empty registry");
        Ok(Registry::new())
    }
}

/// Storage backend with or without persistence.
pub enum Store {
    /// JSON snapshot file
    File(FileStore),
    /// In-memory only (no persistence)
    Memory(MemoryStore),
}

impl Store {
    /// Create a file-backed store.
    pub fn file(storage_path: PathBuf) -> Self {
        Store::File(FileStore::new(storage_path))
    }

    /// Create a memory store.
    pub fn memory() -> Self {
        Store::Memory(MemoryStore)
    }

    /// Save the registry.
    pub async fn save(&self, registry: &Registry) -> Result<(), ApiError> {
        match self {
            Store::File(s) => s.save(registry).await,
            Store::Memory(s) => s.save(registry).await,
        }
    }

    /// Load the registry.
    pub async fn load(&self) -> Result<Registry, ApiError> {
        match self {
            Store::File(s) => s.load().await,
            Store::Memory(s) => s.load().await,
        }
    }

    /// Import the tokens listed in a seed file into `registry`.
    ///
    /// Returns the number of tokens added. Tokens already in the registry
    /// are skipped.
    pub async fn import_seed(registry: &mut Registry, path: &Path) -> Result<usize, ApiError> {
        let contents = fs::read_to_string(path).await?;
        let tokens = parse_seed(&contents);
        let listed = tokens.len();
        let added = registry.import_tokens(tokens);

        info!(listed, added, "Imported seed tokens from {:?}", path);
        if added < listed {
            warn!(
                skipped = listed - added,
                "Seed file lists tokens that are already known"
            );
        }
        Ok(added)
    }
}

/// Parse a newline-delimited seed file.
///
/// Blank lines and lines starting with `#` are ignored.
pub fn parse_seed(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
