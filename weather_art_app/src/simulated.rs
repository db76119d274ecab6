//! Simulated platform collaborators
//!
//! Stand-ins for the camera, tracking SDK, renderer and weather feed so the
//! pipeline can run headless.

use rand::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ar_engine::assets::glb::encode_glb;
use ar_engine::prelude::*;

/// Camera at a fixed frame rate with occasional transient failures
pub struct SimulatedCamera {
    period: Duration,
    started: Instant,
    intrinsics: CameraIntrinsics,
    rng: StdRng,
}

impl SimulatedCamera {
    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs(1) / fps.max(1),
            started: Instant::now(),
            intrinsics: CameraIntrinsics::from_fov(640, 480, 60f32.to_radians()),
            rng: StdRng::from_entropy(),
        }
    }
}

impl CameraDevice for SimulatedCamera {
    fn capture(&mut self) -> Result<CapturedImage, CaptureError> {
        thread::sleep(self.period);
        if self.rng.gen_bool(0.01) {
            return Err(CaptureError::Transient("exposure adjustment".to_string()));
        }

        let (width, height) = (self.intrinsics.width, self.intrinsics.height);
        Ok(CapturedImage {
            data: Arc::from(vec![0u8; (width * height) as usize]),
            width,
            height,
            format: PixelFormat::Gray8,
            timestamp: self.started.elapsed(),
        })
    }

    fn intrinsics(&self) -> CameraIntrinsics {
        self.intrinsics
    }
}

/// Tracker that walks the device around slowly and loses tracking in bursts
pub struct WanderingBackend {
    position: Vec3,
    rng: StdRng,
    dropout: u32,
}

impl WanderingBackend {
    pub fn new() -> Self {
        Self {
            position: Vec3::zeros(),
            rng: StdRng::from_entropy(),
            dropout: 0,
        }
    }
}

impl TrackingBackend for WanderingBackend {
    fn estimate(&mut self, _frame: &Frame) -> RawEstimate {
        if self.dropout > 0 {
            self.dropout -= 1;
            return RawEstimate::no_pose();
        }
        if self.rng.gen_bool(0.005) {
            self.dropout = self.rng.gen_range(3..20);
            log::debug!("Simulating a tracking dropout of {} frames", self.dropout);
            return RawEstimate::no_pose();
        }

        let step = Vec3::new(
            self.rng.gen_range(-0.004..0.004),
            self.rng.gen_range(-0.001..0.001),
            self.rng.gen_range(-0.004..0.004),
        );
        self.position += step;
        let transform = Transform::from_position(self.position);
        if step.norm() > 0.005 {
            RawEstimate::limited(transform)
        } else {
            RawEstimate::normal(transform)
        }
    }

    fn reset(&mut self) {
        log::info!("Simulated tracker reset");
        self.position = Vec3::zeros();
        self.dropout = 0;
    }
}

/// Renderer that logs what it would draw
pub struct LoggingRenderer {
    submitted: u64,
    surface_loss_chance: f64,
    rng: StdRng,
}

impl LoggingRenderer {
    pub fn new(surface_loss_chance: f64) -> Self {
        Self {
            submitted: 0,
            surface_loss_chance,
            rng: StdRng::from_entropy(),
        }
    }
}

impl Renderer for LoggingRenderer {
    fn submit(&mut self, frame: &RenderFrame) -> Result<(), RenderError> {
        if self.rng.gen_bool(self.surface_loss_chance) {
            return Err(RenderError::SurfaceLost);
        }

        self.submitted += 1;
        if self.submitted % 120 == 0 {
            let model = frame.scene.model().map_or("none".to_string(), |handle| handle.id().to_string());
            let distance = frame
                .scene
                .nodes
                .first()
                .and_then(|node| frame.scene.model_view(node))
                .map_or(0.0, |model_view| model_view.fixed_view::<3, 1>(0, 3).norm());
            let device = frame.view_matrix().try_inverse().unwrap_or_else(Mat4::identity);
            log::debug!(
                "Presented frame #{} (model {} at {:.2} m, device at {:?}, hints {:?}, {} nodes)",
                frame.sequence,
                model,
                distance,
                device.fixed_view::<3, 1>(0, 3).transpose(),
                frame.scene.hints,
                frame.scene.nodes.len()
            );
        }
        Ok(())
    }

    fn recreate_surface(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// In-memory catalog with a model for every condition except fog
pub fn demo_store() -> MemoryAssetStore {
    let store = MemoryAssetStore::new().with_latency(Duration::from_millis(40));
    for id in ["sunny_tree", "rain_art", "snow_art", "storm_art"] {
        let json = format!(r#"{{"asset":{{"version":"2.0","generator":"weather_art_app"}},"name":"{id}"}}"#);
        store.insert(id, encode_glb(&json));
    }
    store
}

/// Background feed cycling through weather conditions
pub struct WeatherFeed {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WeatherFeed {
    pub fn start(binder: WeatherStateBinder, interval: Duration) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("weather-feed".to_string())
            .spawn(move || {
                let conditions = [
                    WeatherCondition::Clear,
                    WeatherCondition::Rain,
                    WeatherCondition::Snow,
                    WeatherCondition::Storm,
                    WeatherCondition::Fog,
                ];
                let mut rng = StdRng::from_entropy();
                let mut next = 0;
                while flag.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    next = (next + 1) % conditions.len();
                    let snapshot = WeatherSnapshot {
                        temperature_c: rng.gen_range(-5.0..30.0),
                        observed_at_secs: SystemTime::now()
                            .duration_since(UNIX_EPOCH)
                            .map_or(0, |since| since.as_secs()),
                        ..WeatherSnapshot::new(conditions[next])
                    }
                    .with_wind(rng.gen_range(0.0..20.0));
                    binder.set_snapshot(snapshot);
                }
            })?;
        Ok(Self {
            running,
            thread: Some(thread),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Weather feed thread panicked");
            }
        }
    }
}

impl Drop for WeatherFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
