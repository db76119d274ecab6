//! # Core Engine Module
//!
//! Shared configuration for every pipeline domain.

pub mod config;

pub use config::{
    AssetConfig,
    CameraConfig,
    Config,
    ConfigError,
    LoggingConfig,
    PipelineConfig,
    SceneConfig,
    SchedulerConfig,
    TrackingConfig,
};
