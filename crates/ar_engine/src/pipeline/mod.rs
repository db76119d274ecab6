//! Pipeline assembly
//!
//! [`Pipeline::start`] wires the collaborators into three pacing domains:
//!
//! ```text
//! Capture (sensor rate) ──Mailbox──▶ Track+Compose ──FrameExchange──▶ Render (display rate)
//!                                         │
//!                                         └── AssetCache ──▶ LoaderPool
//! ```
//!
//! Every handoff holds at most one item, so a slow stage drops stale work
//! instead of queueing it.

mod scheduler;

#[cfg(test)]
mod tests;

pub use scheduler::{FrameScheduler, SchedulerStats};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

use crate::assets::{AssetCache, AssetStore, CacheStats};
use crate::camera::{CameraDevice, CameraFrameSource, CaptureStats};
use crate::config::ConfigError;
use crate::core::config::PipelineConfig;
use crate::events::EventQueue;
use crate::foundation::handoff::TakeError;
use crate::foundation::time::CadenceTimer;
use crate::render::{FrameExchange, Presenter, RenderStats, Renderer};
use crate::tracking::{PoseTracker, TrackerStats, TrackingBackend};
use crate::weather::WeatherStateBinder;

/// Pipeline start-up errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration did not validate
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A domain thread could not be started
    #[error("Failed to spawn {domain} thread: {source}")]
    Spawn {
        /// Which domain
        domain: &'static str,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not running; terminal after `stop`
    Stopped,
    /// All domains active
    Running,
    /// Track+Compose skips frames; render keeps re-presenting
    Paused,
}

/// Platform capabilities the pipeline drives
pub struct Collaborators {
    /// Camera sensor
    pub camera: Box<dyn CameraDevice>,
    /// Tracking SDK
    pub tracking: Box<dyn TrackingBackend>,
    /// Platform renderer
    pub renderer: Box<dyn Renderer>,
    /// Model storage
    pub store: Arc<dyn AssetStore>,
    /// Weather state, shared with the weather provider
    pub weather: WeatherStateBinder,
    /// Event sink
    pub events: Arc<EventQueue>,
}

/// Summary returned by [`Pipeline::stop`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Capture domain
    pub capture: CaptureStats,
    /// Tracker
    pub tracking: TrackerStats,
    /// Track+Compose domain
    pub scheduler: SchedulerStats,
    /// Render domain
    pub render: RenderStats,
    /// Asset cache after shutdown
    pub assets: CacheStats,
    /// Asset handles still alive after shutdown; zero on a clean stop
    pub outstanding_asset_refs: usize,
}

#[derive(Default)]
struct ComposeOutcome {
    capture: CaptureStats,
    tracking: TrackerStats,
    scheduler: SchedulerStats,
}

struct Control {
    running: AtomicBool,
    state: Mutex<EngineState>,
}

impl Control {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn is_paused(&self) -> bool {
        *self.state.lock() == EngineState::Paused
    }
}

/// Running pipeline
pub struct Pipeline {
    control: Arc<Control>,
    cache: Arc<AssetCache>,
    exchange: Arc<FrameExchange>,
    events: Arc<EventQueue>,
    compose_thread: Option<JoinHandle<ComposeOutcome>>,
    render_thread: Option<JoinHandle<RenderStats>>,
}

impl Pipeline {
    /// Validate `config` and start all domains
    pub fn start(config: PipelineConfig, collaborators: Collaborators) -> Result<Self, PipelineError> {
        config.validate()?;
        log::info!("Starting pipeline");

        let Collaborators {
            camera,
            tracking,
            renderer,
            store,
            weather,
            events,
        } = collaborators;
        let spawn_error = |domain: &'static str| move |source: std::io::Error| PipelineError::Spawn { domain, source };

        let cache = Arc::new(
            AssetCache::new(&config.assets, store, Arc::clone(&events)).map_err(spawn_error("asset loader"))?,
        );
        let exchange = Arc::new(FrameExchange::new());
        let control = Arc::new(Control {
            running: AtomicBool::new(true),
            state: Mutex::new(EngineState::Running),
        });

        let source = CameraFrameSource::start(camera, &config.camera, Arc::clone(&events))
            .map_err(spawn_error("camera"))?;
        let tracker = PoseTracker::new(tracking, config.tracking.clone()).with_events(Arc::clone(&events));
        let scheduler = FrameScheduler::new(
            tracker,
            &config.scene,
            &config.camera,
            Arc::clone(&cache),
            weather,
            Arc::clone(&exchange),
        );

        let mut pipeline = Self {
            control: Arc::clone(&control),
            cache,
            exchange: Arc::clone(&exchange),
            events: Arc::clone(&events),
            compose_thread: None,
            render_thread: None,
        };

        let idle_poll = config.scheduler.idle_poll();
        let compose_control = Arc::clone(&control);
        pipeline.compose_thread = Some(
            thread::Builder::new()
                .name("track-compose".to_string())
                .spawn(move || run_track_compose(source, scheduler, &compose_control, idle_poll))
                .map_err(spawn_error("track-compose"))?,
        );

        let render_hz = config.scheduler.render_hz;
        let render_control = Arc::clone(&control);
        let presenter = Presenter::new(renderer, events);
        pipeline.render_thread = Some(
            thread::Builder::new()
                .name("render".to_string())
                .spawn(move || run_render(presenter, &exchange, &render_control, render_hz, idle_poll))
                .map_err(spawn_error("render"))?,
        );

        log::info!("Pipeline running (render at {} Hz)", render_hz);
        Ok(pipeline)
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        *self.control.state.lock()
    }

    /// Stop composing new scenes; the last one stays on screen
    pub fn pause(&self) {
        let mut state = self.control.state.lock();
        if *state == EngineState::Running {
            log::info!("Pipeline paused");
            *state = EngineState::Paused;
        }
    }

    /// Resume composing
    pub fn resume(&self) {
        let mut state = self.control.state.lock();
        if *state == EngineState::Paused {
            log::info!("Pipeline resumed");
            *state = EngineState::Running;
        }
    }

    /// Shared event queue
    pub fn events(&self) -> &Arc<EventQueue> {
        &self.events
    }

    /// Asset cache counters
    pub fn asset_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Frames published to the render domain so far
    pub fn frames_published(&self) -> u64 {
        self.exchange.published()
    }

    /// Stop every domain and release all asset references
    pub fn stop(mut self) -> PipelineReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> PipelineReport {
        let mut report = PipelineReport::default();
        if self.compose_thread.is_none() && self.render_thread.is_none() {
            return report;
        }

        log::info!("Stopping pipeline");
        self.control.running.store(false, Ordering::Release);
        *self.control.state.lock() = EngineState::Stopped;

        if let Some(thread) = self.compose_thread.take() {
            match thread.join() {
                Ok(outcome) => {
                    report.capture = outcome.capture;
                    report.tracking = outcome.tracking;
                    report.scheduler = outcome.scheduler;
                }
                Err(_) => log::error!("Track+Compose thread panicked"),
            }
        }
        if let Some(thread) = self.render_thread.take() {
            match thread.join() {
                Ok(stats) => report.render = stats,
                Err(_) => log::error!("Render thread panicked"),
            }
        }

        self.exchange.clear();
        self.cache.shutdown();
        report.assets = self.cache.stats();
        report.outstanding_asset_refs = report.assets.outstanding_refs;
        if report.outstanding_asset_refs > 0 {
            log::warn!("{} asset references outlived the pipeline", report.outstanding_asset_refs);
        }
        log::info!(
            "Pipeline stopped: {} frames captured, {} composed, {} presented",
            report.capture.mailbox.posted,
            report.scheduler.composed,
            report.render.presented
        );
        report
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_track_compose(
    mut source: CameraFrameSource,
    mut scheduler: FrameScheduler,
    control: &Control,
    idle_poll: Duration,
) -> ComposeOutcome {
    let mut camera_gone = false;

    while control.is_running() {
        if camera_gone {
            thread::sleep(idle_poll);
            if !control.is_paused() {
                scheduler.refresh();
            }
            continue;
        }

        match source.next_timeout(idle_poll) {
            Ok(frame) => {
                if control.is_paused() {
                    log::trace!("Paused; skipping frame #{}", frame.sequence());
                    continue;
                }
                scheduler.process_frame(frame);
            }
            Err(TakeError::Timeout) => {
                if !control.is_paused() {
                    scheduler.refresh();
                }
            }
            Err(TakeError::Closed) => {
                if control.is_running() {
                    log::warn!("Camera stream ended; holding the last scene");
                }
                camera_gone = true;
            }
        }
    }

    let capture = source.stop();
    scheduler.release_all();
    ComposeOutcome {
        capture,
        tracking: scheduler.tracker_stats(),
        scheduler: scheduler.stats(),
    }
}

fn run_render(
    mut presenter: Presenter,
    exchange: &FrameExchange,
    control: &Control,
    render_hz: u32,
    idle_poll: Duration,
) -> RenderStats {
    let mut timer = CadenceTimer::new(render_hz);
    while control.is_running() {
        if timer.wait_for_tick(idle_poll) {
            presenter.tick(exchange);
        }
    }
    if timer.missed_ticks() > 0 {
        log::debug!("Render missed {} of {} ticks", timer.missed_ticks(), timer.ticks());
    }
    presenter.stats()
}
