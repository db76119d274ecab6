//! Shared fixtures for unit and scenario tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::assets::glb::encode_glb;
use crate::assets::{AssetCache, AssetHandle, AssetId, AssetStore, MemoryAssetStore};
use crate::camera::{CameraIntrinsics, CapturedImage, Frame, PixelFormat};
use crate::core::config::AssetConfig;
use crate::events::EventQueue;
use crate::foundation::math::{Mat4, Transform};
use crate::render::RenderFrame;
use crate::scene::{RenderHints, SceneGraph};
use crate::tracking::{Confidence, Pose, RawEstimate, TrackingBackend};
use crate::weather::{VisualParameters, WeatherSnapshot};

/// Tiny grayscale frame stamped at `ms`
pub fn frame_at(ms: u64) -> Frame {
    let image = CapturedImage {
        data: Arc::from(vec![0u8; 16]),
        width: 4,
        height: 4,
        format: PixelFormat::Gray8,
        timestamp: Duration::from_millis(ms),
    };
    Frame::new(image, CameraIntrinsics::from_fov(4, 4, 1.0), ms)
}

/// Backend replaying a fixed list of estimates, then reporting no pose
pub struct ScriptedBackend {
    script: VecDeque<RawEstimate>,
    calls: usize,
    slow_call: Option<(usize, Duration)>,
    resets: Arc<parking_lot::Mutex<u32>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<RawEstimate>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
            slow_call: None,
            resets: Arc::new(parking_lot::Mutex::new(0)),
        }
    }

    /// Sleep for `delay` on the `index`-th call (0-based)
    pub fn with_delay_on(mut self, index: usize, delay: Duration) -> Self {
        self.slow_call = Some((index, delay));
        self
    }

    /// Counter of `reset` calls, readable after the backend is boxed
    pub fn reset_counter(&self) -> Arc<parking_lot::Mutex<u32>> {
        Arc::clone(&self.resets)
    }
}

impl TrackingBackend for ScriptedBackend {
    fn estimate(&mut self, _frame: &Frame) -> RawEstimate {
        if let Some((index, delay)) = self.slow_call {
            if index == self.calls {
                std::thread::sleep(delay);
            }
        }
        self.calls += 1;
        self.script.pop_front().unwrap_or_else(RawEstimate::no_pose)
    }

    fn reset(&mut self) {
        *self.resets.lock() += 1;
    }
}

/// Memory store holding a valid model for each id
pub fn model_store(ids: &[&str]) -> Arc<MemoryAssetStore> {
    let store = MemoryAssetStore::new();
    for id in ids {
        store.insert(*id, encode_glb(&format!(r#"{{"asset":{{"version":"2.0"}},"name":"{id}"}}"#)));
    }
    Arc::new(store)
}

/// Cache over [`model_store`] with default settings
pub fn ready_cache(ids: &[&str]) -> AssetCache {
    let store: Arc<dyn AssetStore> = model_store(ids);
    AssetCache::new(&AssetConfig::default(), store, EventQueue::new(64)).unwrap()
}

/// Handle whose load was refused by a full loader pool
///
/// The cache is returned so the handle stays attached to it.
pub fn saturated_handle() -> (AssetCache, AssetHandle) {
    let store = MemoryAssetStore::new().with_latency(Duration::from_millis(200));
    for id in ["a", "b", "c"] {
        store.insert(id, encode_glb("{}"));
    }
    let store: Arc<dyn AssetStore> = Arc::new(store);
    let cache = AssetCache::new(&AssetConfig::default().with_pool(1, 1), store, EventQueue::new(64)).unwrap();
    let _a = cache.acquire(&AssetId::new("a"));
    let _b = cache.acquire(&AssetId::new("b"));
    let c = cache.acquire(&AssetId::new("c"));
    (cache, c)
}

/// Render frame with an empty scene
pub fn empty_frame(sequence: u64) -> RenderFrame {
    RenderFrame {
        sequence,
        pose: Pose::from_transform(&Transform::identity(), Confidence::High, Duration::from_millis(sequence)),
        scene: Arc::new(SceneGraph {
            anchor: None,
            nodes: Vec::new(),
            animation_time: 0.0,
            parameters: VisualParameters::from_snapshot(&WeatherSnapshot::default()),
            hints: RenderHints::empty(),
            generation: sequence,
        }),
        projection: Mat4::identity(),
        timestamp: Duration::from_millis(sequence),
    }
}
