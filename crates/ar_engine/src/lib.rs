//! # AR Engine
//!
//! Synchronizes camera capture, pose tracking, weather-driven scene
//! composition and display-paced rendering for placed AR art.
//!
//! ## Pacing domains
//!
//! - **Capture**: sensor-paced thread posting into a single-slot mailbox
//! - **Track+Compose**: runs the pose tracker and rebuilds the scene per frame
//! - **Render**: presents the newest composed frame at display cadence
//! - **Asset loading**: bounded worker pool behind a reference-counted cache
//!
//! A slow stage never queues work for a fast one: stale frames are dropped,
//! and the renderer re-presents the last scene when nothing newer exists.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ar_engine::prelude::*;
//! # fn collaborators() -> Collaborators { unimplemented!() }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     ar_engine::foundation::logging::init(&config.logging);
//!
//!     let pipeline = Pipeline::start(config, collaborators())?;
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     let report = pipeline.stop();
//!     println!("composed {} scenes", report.scheduler.composed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod foundation;
pub mod config;

pub mod events;
pub mod camera;
pub mod tracking;
pub mod weather;
pub mod assets;
pub mod scene;
pub mod render;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_support;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{AssetCache, AssetHandle, AssetId, AssetStore, FileAssetStore, MemoryAssetStore},
        camera::{CameraDevice, CameraIntrinsics, CaptureError, CapturedImage, Frame, PixelFormat},
        core::config::{Config, PipelineConfig},
        events::{Event, EventArg, EventHandler, EventQueue, EventSystem, EventType},
        foundation::math::{Mat4, Transform, Vec3},
        pipeline::{Collaborators, EngineState, Pipeline, PipelineError, PipelineReport},
        render::{RenderError, RenderFrame, Renderer},
        tracking::{Pose, RawEstimate, TrackingBackend, TrackingState},
        weather::{WeatherCondition, WeatherSnapshot, WeatherStateBinder},
    };
}
