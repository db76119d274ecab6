//! Pose tracking
//!
//! The vendor tracking SDK sits behind [`TrackingBackend`], which turns a
//! frame into a raw 6-DOF estimate plus a quality signal. [`PoseTracker`]
//! wraps it in the tracking state machine:
//!
//! ```text
//! INITIALIZING → TRACKING ⇄ LIMITED → LOST → RELOCALIZING → TRACKING
//!       ↑                                         │
//!       └──────── budget exhausted (reset) ───────┘
//! ```

mod pose;
mod tracker;

pub use pose::{Confidence, Pose, TrackingState};
pub use tracker::{PoseTracker, TrackerStats, TrackingUpdate};

use crate::camera::Frame;
use crate::foundation::math::Transform;

/// Quality signal reported by the backend alongside an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawQuality {
    /// Enough visual structure for a confident estimate
    Normal,
    /// Estimate available but degraded (fast motion, low texture)
    Limited,
    /// No estimate for this frame
    NoPose,
}

/// Raw 6-DOF estimate from the backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEstimate {
    /// Device-to-world transform (meaningless when `quality` is `NoPose`)
    pub transform: Transform,
    /// Quality signal
    pub quality: RawQuality,
}

impl RawEstimate {
    /// Confident estimate
    pub fn normal(transform: Transform) -> Self {
        Self { transform, quality: RawQuality::Normal }
    }

    /// Degraded estimate
    pub fn limited(transform: Transform) -> Self {
        Self { transform, quality: RawQuality::Limited }
    }

    /// No estimate
    pub fn no_pose() -> Self {
        Self { transform: Transform::identity(), quality: RawQuality::NoPose }
    }
}

/// Tracking capability (vendor AR SDK)
pub trait TrackingBackend: Send {
    /// Estimate the device pose for one frame
    fn estimate(&mut self, frame: &Frame) -> RawEstimate;

    /// Drop the backend's map and start over
    fn reset(&mut self) {}
}
