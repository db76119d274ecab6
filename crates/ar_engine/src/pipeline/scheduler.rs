//! Track+Compose cycle
//!
//! One call to [`FrameScheduler::process_frame`] runs the tracker on a
//! frame, reacts to tracking transitions, picks up weather changes and
//! publishes the composed [`RenderFrame`]. Nothing here blocks on assets:
//! a model that is still loading shows up in the scene as a pending handle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::assets::{AssetCache, AssetHandle, PlaceholderReason};
use crate::camera::Frame;
use crate::core::config::{CameraConfig, SceneConfig};
use crate::foundation::math::Mat4;
use crate::render::{FrameExchange, RenderFrame};
use crate::scene::SceneComposer;
use crate::tracking::{Pose, PoseTracker, TrackerStats, TrackingState};
use crate::weather::{VisualParameters, WeatherStateBinder};

/// Minimum wait before art refused by a full loader pool is requested again
const SATURATED_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Track+Compose counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Frames handed to `process_frame`
    pub frames: u64,
    /// Scenes composed and published
    pub composed: u64,
    /// Frames that left the scene frozen
    pub frozen: u64,
    /// Anchors discarded after unrecoverable tracking
    pub anchor_resets: u64,
    /// Weather changes picked up
    pub weather_changes: u64,
    /// Re-requests of art the loader pool had refused
    pub saturated_retries: u64,
}

struct CurrentArt {
    generation: u64,
    parameters: VisualParameters,
    handle: AssetHandle,
    acquired_at: Instant,
}

impl CurrentArt {
    fn acquire(cache: &AssetCache, generation: u64, parameters: VisualParameters) -> Self {
        Self {
            generation,
            handle: cache.acquire(&parameters.asset_id),
            parameters,
            acquired_at: Instant::now(),
        }
    }

    fn is_saturated(&self) -> bool {
        self.handle.placeholder_reason() == Some(PlaceholderReason::PoolSaturated)
    }
}

/// Last frame that produced a pose, kept for weather-only refreshes
#[derive(Clone, Copy)]
struct LastView {
    pose: Pose,
    sequence: u64,
    timestamp: Duration,
    projection: Mat4,
}

/// Owns the tracker and composer for the Track+Compose domain
pub struct FrameScheduler {
    tracker: PoseTracker,
    composer: SceneComposer,
    cache: Arc<AssetCache>,
    weather: WeatherStateBinder,
    exchange: Arc<FrameExchange>,
    near_plane: f32,
    far_plane: f32,
    current: Option<CurrentArt>,
    last_view: Option<LastView>,
    stats: SchedulerStats,
}

impl FrameScheduler {
    /// Assemble a scheduler from its parts
    pub fn new(
        tracker: PoseTracker,
        scene: &SceneConfig,
        camera: &CameraConfig,
        cache: Arc<AssetCache>,
        weather: WeatherStateBinder,
        exchange: Arc<FrameExchange>,
    ) -> Self {
        Self {
            tracker,
            composer: SceneComposer::new(scene),
            cache,
            weather,
            exchange,
            near_plane: camera.near_plane,
            far_plane: camera.far_plane,
            current: None,
            last_view: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Run one Track+Compose cycle
    pub fn process_frame(&mut self, frame: Frame) -> Option<Arc<RenderFrame>> {
        self.stats.frames += 1;
        let update = self.tracker.update(&frame);
        if update.ignored {
            return None;
        }

        if update.reset {
            log::info!("Tracking reset; discarding placed art");
            self.composer.discard_anchor();
            self.exchange.clear();
            self.last_view = None;
            self.stats.anchor_resets += 1;
        }
        if update.relocalized {
            self.composer.mark_relocalized();
        }

        let Some(pose) = update.pose else {
            if matches!(update.state, TrackingState::Lost | TrackingState::Relocalizing) {
                // The exchange keeps the last published frame, so render re-presents it.
                if update.entered_lost() {
                    log::debug!("Freezing scene at frame #{}", frame.sequence());
                }
                self.composer.freeze();
                self.stats.frozen += 1;
            }
            return None;
        };

        let view = LastView {
            pose,
            sequence: frame.sequence(),
            timestamp: frame.timestamp(),
            projection: frame.intrinsics().projection_matrix(self.near_plane, self.far_plane),
        };
        self.last_view = Some(view);
        Some(self.compose(view))
    }

    /// Re-compose for a weather change that arrived without a new frame
    ///
    /// Only when the last frame produced a pose and tracking still has one.
    pub fn refresh(&mut self) -> Option<Arc<RenderFrame>> {
        if !self.tracker.state().has_pose() {
            return None;
        }
        let view = self.last_view?;
        let generation = self.weather.generation();
        if self.current.as_ref().is_some_and(|art| art.generation == generation) {
            return None;
        }
        log::debug!("Weather refresh without a new frame");
        Some(self.compose(view))
    }

    fn compose(&mut self, view: LastView) -> Arc<RenderFrame> {
        let art = Self::sync_weather(&mut self.current, &self.weather, &self.cache, &mut self.stats);
        let scene = self.composer.compose(&view.pose, &art.parameters, &art.handle);

        let render_frame = Arc::new(RenderFrame {
            sequence: view.sequence,
            pose: view.pose,
            scene,
            projection: view.projection,
            timestamp: view.timestamp,
        });
        self.exchange.publish(Arc::clone(&render_frame));
        self.stats.composed += 1;
        render_frame
    }

    /// Art for the current weather, re-acquiring only when the model changes
    fn sync_weather<'a>(
        current: &'a mut Option<CurrentArt>,
        weather: &WeatherStateBinder,
        cache: &AssetCache,
        stats: &mut SchedulerStats,
    ) -> &'a CurrentArt {
        let (parameters, generation) = weather.parameters_with_generation();

        let art = match current.take() {
            Some(art) if art.generation == generation => {
                if art.is_saturated() && art.acquired_at.elapsed() >= SATURATED_RETRY_INTERVAL {
                    let CurrentArt { parameters, handle, .. } = art;
                    // The cache only reloads an entry nobody references
                    drop(handle);
                    log::debug!("Requesting {} again after loader saturation", parameters.asset_id);
                    stats.saturated_retries += 1;
                    CurrentArt::acquire(cache, generation, parameters)
                } else {
                    art
                }
            }
            Some(previous) => {
                stats.weather_changes += 1;
                if previous.parameters.asset_id == parameters.asset_id {
                    CurrentArt {
                        generation,
                        parameters,
                        ..previous
                    }
                } else {
                    log::info!("Switching art {} -> {}", previous.parameters.asset_id, parameters.asset_id);
                    drop(previous);
                    CurrentArt::acquire(cache, generation, parameters)
                }
            }
            None => CurrentArt::acquire(cache, generation, parameters),
        };
        current.insert(art)
    }

    /// Drop every asset reference held by this domain
    pub fn release_all(&mut self) {
        self.composer.clear();
        self.exchange.clear();
        self.current = None;
        self.last_view = None;
    }

    /// Composer, for placement control
    pub fn composer_mut(&mut self) -> &mut SceneComposer {
        &mut self.composer
    }

    /// Composer state
    pub fn composer(&self) -> &SceneComposer {
        &self.composer
    }

    /// Current tracking state
    pub fn tracking_state(&self) -> TrackingState {
        self.tracker.state()
    }

    /// Tracker counters
    pub fn tracker_stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    /// Scheduler counters
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
