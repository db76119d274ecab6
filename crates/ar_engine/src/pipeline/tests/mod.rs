//! End-to-end scenarios across the pacing domains

mod relocalization;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::assets::{AssetCache, AssetStore, MemoryAssetStore};
use crate::camera::{CameraDevice, CameraIntrinsics, CaptureError, CapturedImage, PixelFormat};
use crate::core::config::{AssetConfig, CameraConfig, PipelineConfig, SceneConfig, TrackingConfig};
use crate::events::EventQueue;
use crate::foundation::math::{Transform, Vec3};
use crate::pipeline::{Collaborators, FrameScheduler};
use crate::render::{FrameExchange, RenderError, RenderFrame, Renderer};
use crate::test_support::{model_store, ScriptedBackend};
use crate::tracking::{PoseTracker, RawEstimate, TrackingBackend};
use crate::weather::WeatherStateBinder;

/// Camera producing tiny frames at a fixed pace with increasing timestamps
struct PacedCamera {
    pace: Duration,
    next_ms: u64,
}

impl CameraDevice for PacedCamera {
    fn capture(&mut self) -> Result<CapturedImage, CaptureError> {
        if !self.pace.is_zero() {
            thread::sleep(self.pace);
        }
        self.next_ms += 1;
        Ok(CapturedImage {
            data: Arc::from(vec![0u8; 16]),
            width: 4,
            height: 4,
            format: PixelFormat::Gray8,
            timestamp: Duration::from_millis(self.next_ms),
        })
    }

    fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::from_fov(4, 4, 1.0)
    }
}

/// Backend that always tracks, optionally slowly
struct SteadyBackend {
    delay: Duration,
}

impl TrackingBackend for SteadyBackend {
    fn estimate(&mut self, frame: &crate::camera::Frame) -> RawEstimate {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let drift = (frame.sequence() % 100) as f32 * 0.001;
        RawEstimate::normal(Transform::from_position(Vec3::new(drift, 0.0, 0.0)))
    }
}

/// Renderer counting submissions, losing its surface every `lose_every` submits
struct CountingRenderer {
    submitted: Arc<AtomicU64>,
    lose_every: Option<u64>,
    failed_recreates: u32,
    calls: u64,
}

impl Renderer for CountingRenderer {
    fn submit(&mut self, _frame: &RenderFrame) -> Result<(), RenderError> {
        self.calls += 1;
        if self.lose_every.is_some_and(|every| self.calls % every == 0) {
            self.failed_recreates = 2;
            return Err(RenderError::SurfaceLost);
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn recreate_surface(&mut self) -> Result<(), RenderError> {
        if self.failed_recreates > 0 {
            self.failed_recreates -= 1;
            return Err(RenderError::SurfaceLost);
        }
        Ok(())
    }
}

fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.scheduler.render_hz = 200;
    config.scheduler.idle_poll_ms = 5;
    config.camera = CameraConfig::default().with_backoff(1, 4);
    config.tracking = TrackingConfig {
        init_frames_required: 1,
        ..TrackingConfig::default()
    };
    config
}

struct Harness {
    collaborators: Collaborators,
    submitted: Arc<AtomicU64>,
    store: Arc<MemoryAssetStore>,
}

fn harness(camera_pace: Duration, backend_delay: Duration, lose_every: Option<u64>) -> Harness {
    let store = model_store(&["sunny_tree", "rain_art", "snow_art"]);
    let submitted = Arc::new(AtomicU64::new(0));
    let collaborators = Collaborators {
        camera: Box::new(PacedCamera { pace: camera_pace, next_ms: 0 }),
        tracking: Box::new(SteadyBackend { delay: backend_delay }),
        renderer: Box::new(CountingRenderer {
            submitted: Arc::clone(&submitted),
            lose_every,
            failed_recreates: 0,
            calls: 0,
        }),
        store: Arc::clone(&store) as Arc<dyn AssetStore>,
        weather: WeatherStateBinder::default(),
        events: EventQueue::new(EventQueue::DEFAULT_CAPACITY),
    };
    Harness {
        collaborators,
        submitted,
        store,
    }
}

/// Scheduler driven directly by the test, no threads besides the loader pool
struct Direct {
    scheduler: FrameScheduler,
    weather: WeatherStateBinder,
    exchange: Arc<FrameExchange>,
    cache: Arc<AssetCache>,
    store: Arc<MemoryAssetStore>,
    events: Arc<EventQueue>,
    backend_resets: Arc<Mutex<u32>>,
}

fn direct(script: Vec<RawEstimate>, tracking: TrackingConfig) -> Direct {
    let store = model_store(&["sunny_tree", "rain_art", "snow_art"]);
    direct_with_assets(script, tracking, store, &AssetConfig::default())
}

fn direct_with_assets(
    script: Vec<RawEstimate>,
    tracking: TrackingConfig,
    store: Arc<MemoryAssetStore>,
    assets: &AssetConfig,
) -> Direct {
    let events = EventQueue::new(EventQueue::DEFAULT_CAPACITY);
    let cache = Arc::new(AssetCache::new(assets, Arc::clone(&store) as Arc<dyn AssetStore>, Arc::clone(&events)).unwrap());
    let backend = ScriptedBackend::new(script);
    let backend_resets = backend.reset_counter();
    let tracker = PoseTracker::new(Box::new(backend), tracking).with_events(Arc::clone(&events));
    let weather = WeatherStateBinder::default();
    let exchange = Arc::new(FrameExchange::new());
    let scheduler = FrameScheduler::new(
        tracker,
        &SceneConfig::default(),
        &CameraConfig::default(),
        Arc::clone(&cache),
        weather.clone(),
        Arc::clone(&exchange),
    );
    Direct {
        scheduler,
        weather,
        exchange,
        cache,
        store,
        events,
        backend_resets,
    }
}
