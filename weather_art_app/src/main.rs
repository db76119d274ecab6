//! Weather art demo
//!
//! Runs the AR pipeline headless against simulated collaborators: a 30 fps
//! camera, a wandering tracker with dropouts, a logging renderer and a weather
//! feed that changes condition every few seconds.
//!
//! Usage: `weather_art [config.toml|config.ron] [seconds]`

mod simulated;

use std::sync::Arc;
use std::time::{Duration, Instant};

use ar_engine::foundation::logging;
use ar_engine::prelude::*;

use simulated::{demo_store, LoggingRenderer, SimulatedCamera, WanderingBackend, WeatherFeed};

const DEFAULT_RUN_SECS: u64 = 20;
const WEATHER_INTERVAL: Duration = Duration::from_secs(3);
const DISPATCH_INTERVAL: Duration = Duration::from_millis(100);

const ALL_EVENTS: [EventType; 7] = [
    EventType::TrackingStateChanged,
    EventType::CaptureStalled,
    EventType::CaptureDisconnected,
    EventType::AssetLoadFailed,
    EventType::AssetPoolSaturated,
    EventType::RenderSurfaceLost,
    EventType::RenderSurfaceRestored,
];

/// Logs every event it sees
struct EventLogger;

impl EventHandler for EventLogger {
    fn on_event(&mut self, event: &Event) -> bool {
        match event.event_type {
            EventType::TrackingStateChanged => {
                log::info!(
                    "[{:>7.2}s] tracking -> {:?}{}",
                    event.timestamp,
                    event.get_state(),
                    event.get_message().map(|m| format!(" ({m})")).unwrap_or_default()
                );
            }
            EventType::AssetLoadFailed | EventType::AssetPoolSaturated => {
                log::warn!(
                    "[{:>7.2}s] {:?}: {}",
                    event.timestamp,
                    event.event_type,
                    event.get_asset_id().unwrap_or("?")
                );
            }
            other => log::info!("[{:>7.2}s] {:?}", event.timestamp, other),
        }
        false
    }
}

fn load_config(path: Option<String>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(PipelineConfig::load_from_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn asset_store(config: &PipelineConfig) -> Arc<dyn AssetStore> {
    if config.assets.search_paths.is_empty() {
        return Arc::new(demo_store());
    }
    let store = FileAssetStore::new(&config.assets.search_paths);
    log::info!("Serving models from {:?}", store.search_paths());
    Arc::new(store)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let config = load_config(args.next())?;
    let run_for = Duration::from_secs(match args.next() {
        Some(secs) => secs.parse()?,
        None => DEFAULT_RUN_SECS,
    });
    logging::init(&config.logging);

    log::info!("Starting weather art demo for {:?}", run_for);

    let store = asset_store(&config);
    log::info!("Model catalog: {:?}", store.list());

    let events = EventQueue::new(EventQueue::DEFAULT_CAPACITY);
    let mut event_system = EventSystem::new(Arc::clone(&events));
    for event_type in ALL_EVENTS {
        event_system.register_handler(event_type, Box::new(EventLogger));
    }

    let weather = WeatherStateBinder::new(WeatherSnapshot::new(WeatherCondition::Clear));
    let mut feed = WeatherFeed::start(weather.clone(), WEATHER_INTERVAL)?;

    let pipeline = Pipeline::start(
        config,
        Collaborators {
            camera: Box::new(SimulatedCamera::new(30)),
            tracking: Box::new(WanderingBackend::new()),
            renderer: Box::new(LoggingRenderer::new(0.001)),
            store,
            weather: weather.clone(),
            events,
        },
    )?;

    let started = Instant::now();
    while started.elapsed() < run_for {
        std::thread::sleep(DISPATCH_INTERVAL);
        event_system.dispatch();
    }

    feed.stop();
    let report = pipeline.stop();
    event_system.dispatch();

    println!("Weather art demo finished after {:.1}s", started.elapsed().as_secs_f32());
    println!("  final weather:      {:?}", weather.snapshot().condition);
    println!(
        "  capture:            {} posted, {} delivered, {} dropped, {} transient errors",
        report.capture.mailbox.posted,
        report.capture.mailbox.delivered,
        report.capture.mailbox.dropped,
        report.capture.transient_errors
    );
    println!(
        "  tracking:           {} processed, {} abandoned, {} relocalizations, {} resets",
        report.tracking.processed, report.tracking.abandoned, report.tracking.relocalizations, report.tracking.resets
    );
    println!(
        "  scenes:             {} composed, {} frozen, {} weather changes, {} saturated retries",
        report.scheduler.composed,
        report.scheduler.frozen,
        report.scheduler.weather_changes,
        report.scheduler.saturated_retries
    );
    println!(
        "  render:             {} presented, {} re-presented, {} surface losses",
        report.render.presented, report.render.re_presented, report.render.surface_losses
    );
    println!(
        "  assets:             {} loads, {} hits, {} evictions, {} outstanding refs",
        report.assets.loads, report.assets.hits, report.assets.evictions, report.outstanding_asset_refs
    );
    Ok(())
}
