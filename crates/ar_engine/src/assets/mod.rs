//! Asset management
//!
//! Art models are binary glTF files keyed by [`AssetId`]. The
//! [`AssetCache`] loads them on a [`LoaderPool`] and hands out
//! reference-counted [`AssetHandle`]s.

pub mod cache;
pub mod glb;
pub mod pool;
pub mod store;

pub use cache::{AssetCache, AssetHandle, CacheStats};
pub use glb::{ModelAsset, PlaceholderReason};
pub use pool::LoaderPool;
pub use store::{AssetId, AssetStore, FileAssetStore, GlbFileInfo, MemoryAssetStore};

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// No store location holds the asset
    #[error("Asset not found: {0}")]
    NotFound(AssetId),

    /// Reading the asset failed
    #[error("I/O error loading {id}: {source}")]
    Io {
        /// Asset being read
        id: AssetId,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Bytes are not a valid GLB container
    #[error("Invalid GLB for {id}: {reason}")]
    InvalidGlb {
        /// Asset being validated
        id: AssetId,
        /// What failed
        reason: String,
    },

    /// The loader queue is full
    #[error("Asset loader pool saturated")]
    PoolSaturated,

    /// The loader pool has been shut down
    #[error("Asset loader pool shut down")]
    ShutDown,
}

impl AssetError {
    /// Whether another attempt might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
