//! Pose and tracking-quality types

use std::time::Duration;

use crate::foundation::math::{Quat, Transform, Vec3};

/// Confidence attached to an emitted pose
///
/// Ordered so that `confidence >= Confidence::Low` means "usable".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Confidence {
    /// Tracking broken, no pose
    Lost,
    /// Degraded conditions, pose usable at reduced fidelity
    Low,
    /// Confident pose
    High,
}

/// Pose tracker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingState {
    /// No prior pose; accumulating visual structure
    Initializing,
    /// Confident pose every frame
    Tracking,
    /// Degraded conditions; low-confidence poses
    Limited,
    /// Tracking broken; anchors frozen
    Lost,
    /// Trying to recover the previous frame of reference
    Relocalizing,
}

impl TrackingState {
    /// Confidence of poses emitted in this state
    pub fn confidence(self) -> Confidence {
        match self {
            Self::Tracking => Confidence::High,
            Self::Limited => Confidence::Low,
            Self::Initializing | Self::Lost | Self::Relocalizing => Confidence::Lost,
        }
    }

    /// Whether poses from this state may drive composition
    pub fn has_pose(self) -> bool {
        self.confidence() >= Confidence::Low
    }
}

/// Device pose in tracked world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Device position in metres
    pub position: Vec3,
    /// Device orientation
    pub orientation: Quat,
    /// Tracking confidence for this pose
    pub confidence: Confidence,
    /// Timestamp of the frame the pose was derived from
    pub timestamp: Duration,
}

impl Pose {
    /// Build a pose from a rigid transform
    pub fn from_transform(transform: &Transform, confidence: Confidence, timestamp: Duration) -> Self {
        Self {
            position: transform.position,
            orientation: transform.rotation,
            confidence,
            timestamp,
        }
    }

    /// Device-to-world transform
    pub fn transform(&self) -> Transform {
        Transform::from_position_rotation(self.position, self.orientation)
    }
}
