//! # Pipeline Configuration
//!
//! All tunables of the capture → track → compose → render pipeline, grouped
//! by the domain that consumes them. Every section has serde defaults so a
//! configuration file only needs to mention what it changes.
//!
//! ## Sections
//!
//! - **Logging**: default level, per-module overrides, timestamps
//! - **Camera**: default intrinsics and capture retry/backoff policy
//! - **Tracking**: initialization, frame budget and relocalization budgets
//! - **Assets**: search paths, cache capacity and loader pool sizing
//! - **Scene**: art placement and animation stepping
//! - **Scheduler**: display cadence and idle polling

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::config::{Config, ConfigError};

/// # Logging Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: String,
    /// Per-module level overrides, e.g. `("ar_engine::assets", "debug")`
    pub module_levels: Vec<(String, String)>,
    /// Whether to prefix lines with millisecond timestamps
    pub timestamps: bool,
}

impl LoggingConfig {
    /// Set the default level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Add a per-module override
    pub fn with_module_level(mut self, module: impl Into<String>, level: impl Into<String>) -> Self {
        self.module_levels.push((module.into(), level.into()));
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            module_levels: Vec::new(),
            timestamps: true,
        }
    }
}

/// # Camera Configuration
///
/// Capture resolution defaults and the retry policy for transient sensor
/// failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Default frame width in pixels
    pub width: u32,
    /// Default frame height in pixels
    pub height: u32,
    /// Near clipping plane used for projection matrices
    pub near_plane: f32,
    /// Far clipping plane used for projection matrices
    pub far_plane: f32,
    /// First retry delay after a transient capture error
    pub backoff_base_ms: u64,
    /// Upper bound for the retry delay
    pub backoff_max_ms: u64,
    /// Consecutive failures before the source reports a stall
    pub stall_threshold: u32,
}

impl CameraConfig {
    /// First retry delay
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Retry delay cap
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Set capture backoff bounds
    pub fn with_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.backoff_base_ms = base_ms;
        self.backoff_max_ms = max_ms;
        self
    }

    /// Validate the section
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("Camera resolution must be non-zero".to_string());
        }
        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            return Err("Camera planes must satisfy 0 < near < far".to_string());
        }
        if self.backoff_base_ms == 0 || self.backoff_max_ms < self.backoff_base_ms {
            return Err("Capture backoff must satisfy 0 < base <= max".to_string());
        }
        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            near_plane: 0.1,
            far_plane: 1000.0,
            backoff_base_ms: 10,
            backoff_max_ms: 640,
            stall_threshold: 8,
        }
    }
}

/// # Tracking Configuration
///
/// The relocalization budgets are product placeholders; see DESIGN.md.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Consecutive good estimates needed to leave INITIALIZING
    pub init_frames_required: u32,
    /// Processing budget for one frame; slower results are abandoned
    pub frame_budget_ms: u64,
    /// Rejected frames allowed in a single RELOCALIZING episode
    pub max_relocalization_attempts: u32,
    /// LOST → RELOCALIZING cycles allowed inside the window
    pub relocalization_budget: u32,
    /// Rolling window for the cycle budget
    pub relocalization_window_ms: u64,
    /// Largest accepted jump (metres) between the last good pose and a relocalized one
    pub max_relocalization_jump: f32,
}

impl TrackingConfig {
    /// Per-frame processing budget
    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }

    /// Rolling window for the relocalization cycle budget
    pub fn relocalization_window(&self) -> Duration {
        Duration::from_millis(self.relocalization_window_ms)
    }

    /// Set relocalization budgets
    pub fn with_relocalization_budget(mut self, cycles: u32, window_ms: u64) -> Self {
        self.relocalization_budget = cycles;
        self.relocalization_window_ms = window_ms;
        self
    }

    /// Set the per-frame processing budget
    pub fn with_frame_budget_ms(mut self, budget_ms: u64) -> Self {
        self.frame_budget_ms = budget_ms;
        self
    }

    /// Validate the section
    pub fn validate(&self) -> Result<(), String> {
        if self.init_frames_required == 0 {
            return Err("Tracking needs at least one initialization frame".to_string());
        }
        if self.frame_budget_ms == 0 {
            return Err("Frame budget must be non-zero".to_string());
        }
        if self.max_relocalization_attempts == 0 {
            return Err("Relocalization needs at least one attempt".to_string());
        }
        if self.max_relocalization_jump <= 0.0 {
            return Err("Relocalization jump tolerance must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            init_frames_required: 3,
            frame_budget_ms: 33,
            max_relocalization_attempts: 30,
            relocalization_budget: 10,
            relocalization_window_ms: 60_000,
            max_relocalization_jump: 0.5,
        }
    }
}

/// # Asset Configuration
///
/// Asset lookup, cache capacity and loader pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directories searched for `<asset id>.glb`
    pub search_paths: Vec<String>,
    /// Maximum number of cached models before LRU eviction
    pub capacity: usize,
    /// Loader worker threads
    pub workers: usize,
    /// Pending load jobs before the pool reports saturation
    pub queue_capacity: usize,
    /// Extra attempts after a failed I/O load
    pub load_retries: u32,
    /// Delay between load attempts
    pub retry_delay_ms: u64,
}

impl AssetConfig {
    /// Set search paths
    pub fn with_search_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set cache capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set loader pool sizing
    pub fn with_pool(mut self, workers: usize, queue_capacity: usize) -> Self {
        self.workers = workers;
        self.queue_capacity = queue_capacity;
        self
    }

    /// Delay between load attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Validate the section
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("Asset cache capacity must be at least 1".to_string());
        }
        if self.workers == 0 || self.queue_capacity == 0 {
            return Err("Asset loader pool needs workers and queue capacity".to_string());
        }
        Ok(())
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            search_paths: vec!["models".to_string(), "assets/models".to_string()],
            capacity: 8,
            workers: 2,
            queue_capacity: 16,
            load_retries: 2,
            retry_delay_ms: 20,
        }
    }
}

/// # Scene Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Where new art is placed, relative to the device at anchor creation
    pub placement_offset: [f32; 3],
    /// Largest animation step for one composition, in seconds
    pub max_animation_step_secs: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            placement_offset: [0.0, -0.3, -1.5],
            max_animation_step_secs: 0.1,
        }
    }
}

/// # Scheduler Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Display cadence of the render domain
    pub render_hz: u32,
    /// How long Track+Compose waits for a frame before checking for weather changes
    pub idle_poll_ms: u64,
}

impl SchedulerConfig {
    /// Idle poll interval
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    /// Set the display cadence
    pub fn with_render_hz(mut self, hz: u32) -> Self {
        self.render_hz = hz;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            render_hz: 60,
            idle_poll_ms: 50,
        }
    }
}

/// # Complete Pipeline Configuration
///
/// Top-level configuration applications load and hand to the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Logging setup
    pub logging: LoggingConfig,
    /// Capture domain
    pub camera: CameraConfig,
    /// Pose tracker
    pub tracking: TrackingConfig,
    /// Asset cache and loader pool
    pub assets: AssetConfig,
    /// Scene composition
    pub scene: SceneConfig,
    /// Pacing
    pub scheduler: SchedulerConfig,
}

impl PipelineConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate().map_err(ConfigError::Invalid)?;
        self.tracking.validate().map_err(ConfigError::Invalid)?;
        self.assets.validate().map_err(ConfigError::Invalid)?;
        if self.scheduler.render_hz == 0 {
            return Err(ConfigError::Invalid("Render cadence must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Config for PipelineConfig {}
