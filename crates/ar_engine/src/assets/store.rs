//! Asset storage capability
//!
//! The cache reads raw bytes through [`AssetStore`]. Stores are shared by the
//! loader workers, so they must be `Send + Sync`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{AssetError, ModelAsset};

/// Extension of model files
pub const MODEL_EXTENSION: &str = "glb";

/// Identifier of an art model, e.g. `sunny_tree`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Wrap an id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name this id is stored under
    pub fn file_name(&self) -> String {
        format!("{}.{MODEL_EXTENSION}", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Source of raw model bytes
pub trait AssetStore: Send + Sync {
    /// Read the bytes of `id`
    fn load(&self, id: &AssetId) -> Result<Vec<u8>, AssetError>;

    /// Ids available in the store
    fn list(&self) -> Vec<AssetId>;
}

/// Facts about a model file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlbFileInfo {
    /// Resolved path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Whether the container validates
    pub valid: bool,
}

/// Store reading `<id>.glb` from a list of directories, first match wins
#[derive(Debug, Clone)]
pub struct FileAssetStore {
    search_paths: Vec<PathBuf>,
}

impl FileAssetStore {
    /// Store over `search_paths`, searched in order
    pub fn new<I, P>(search_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Directories searched
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Path of the first file matching `id`
    pub fn resolve(&self, id: &AssetId) -> Option<PathBuf> {
        let file_name = id.file_name();
        self.search_paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
    }

    /// Size and validity of the file behind `id`
    pub fn file_info(&self, id: &AssetId) -> Result<GlbFileInfo, AssetError> {
        let path = self.resolve(id).ok_or_else(|| AssetError::NotFound(id.clone()))?;
        let bytes = fs::read(&path).map_err(|source| AssetError::Io { id: id.clone(), source })?;
        Ok(GlbFileInfo {
            size: bytes.len() as u64,
            valid: ModelAsset::from_glb(id.clone(), bytes).is_ok(),
            path,
        })
    }

    fn list_dir(dir: &Path) -> io::Result<Vec<AssetId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_model = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(MODEL_EXTENSION));
            if !is_model || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(AssetId::new(stem));
            }
        }
        Ok(ids)
    }
}

impl AssetStore for FileAssetStore {
    fn load(&self, id: &AssetId) -> Result<Vec<u8>, AssetError> {
        let path = self.resolve(id).ok_or_else(|| AssetError::NotFound(id.clone()))?;
        log::debug!("Reading {} from {}", id, path.display());
        fs::read(&path).map_err(|source| AssetError::Io { id: id.clone(), source })
    }

    fn list(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self
            .search_paths
            .iter()
            .filter_map(|dir| match Self::list_dir(dir) {
                Ok(ids) => Some(ids),
                Err(err) => {
                    log::debug!("Skipping asset directory {}: {}", dir.display(), err);
                    None
                }
            })
            .flatten()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// In-memory store with load counting and injectable faults
#[derive(Default)]
pub struct MemoryAssetStore {
    assets: Mutex<HashMap<AssetId, Vec<u8>>>,
    failures: Mutex<HashMap<AssetId, u32>>,
    loads: Mutex<HashMap<AssetId, u64>>,
    total_loads: AtomicU64,
    latency: Duration,
}

impl MemoryAssetStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long on every load
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Add or replace an asset
    pub fn insert(&self, id: impl Into<AssetId>, bytes: Vec<u8>) {
        self.assets.lock().insert(id.into(), bytes);
    }

    /// Make the next `count` loads of `id` fail with an I/O error
    pub fn fail_next(&self, id: impl Into<AssetId>, count: u32) {
        self.failures.lock().insert(id.into(), count);
    }

    /// Load calls made for `id`
    pub fn load_count(&self, id: &AssetId) -> u64 {
        self.loads.lock().get(id).copied().unwrap_or(0)
    }

    /// Load calls made for any id
    pub fn total_loads(&self) -> u64 {
        self.total_loads.load(Ordering::Relaxed)
    }
}

impl AssetStore for MemoryAssetStore {
    fn load(&self, id: &AssetId) -> Result<Vec<u8>, AssetError> {
        *self.loads.lock().entry(id.clone()).or_insert(0) += 1;
        self.total_loads.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        if let Some(remaining) = self.failures.lock().get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AssetError::Io {
                    id: id.clone(),
                    source: io::Error::new(io::ErrorKind::Interrupted, "injected failure"),
                });
            }
        }

        self.assets
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(id.clone()))
    }

    fn list(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self.assets.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::glb::encode_glb;

    #[test]
    fn test_file_name() {
        assert_eq!(AssetId::new("rain_art").file_name(), "rain_art.glb");
    }

    #[test]
    fn test_file_store_search_order_and_listing() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("sunny_tree.glb"), encode_glb("{}")).unwrap();
        fs::write(first.path().join("rain_art.glb"), b"not a model").unwrap();
        fs::write(second.path().join("rain_art.glb"), encode_glb("{}")).unwrap();
        fs::write(second.path().join("notes.txt"), b"ignore me").unwrap();

        let store = FileAssetStore::new([first.path(), second.path()]);
        assert_eq!(store.list(), vec![AssetId::new("rain_art"), AssetId::new("sunny_tree")]);

        let rain = store.file_info(&AssetId::new("rain_art")).unwrap();
        assert_eq!(rain.path, first.path().join("rain_art.glb"));
        assert!(!rain.valid);
        assert!(store.file_info(&AssetId::new("sunny_tree")).unwrap().valid);

        assert!(matches!(store.load(&AssetId::new("storm_art")), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let store = FileAssetStore::new(["/definitely/not/a/real/dir"]);
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_memory_store_injected_failures() {
        let store = MemoryAssetStore::new();
        store.insert("sunny_tree", encode_glb("{}"));
        store.fail_next("sunny_tree", 1);

        let id = AssetId::new("sunny_tree");
        assert!(matches!(store.load(&id), Err(AssetError::Io { .. })));
        assert!(store.load(&id).is_ok());
        assert_eq!(store.load_count(&id), 2);
    }
}
