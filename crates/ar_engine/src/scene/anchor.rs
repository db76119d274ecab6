//! World anchors

use std::time::Duration;

use crate::foundation::math::Transform;
use crate::tracking::Pose;

slotmap::new_key_type! {
    /// Stable identity of an anchor; never reused after removal
    pub struct AnchorId;
}

/// Fixed point in tracked world space that art is attached to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorNode {
    /// Identity
    pub id: AnchorId,
    /// Placement in world space; fixed for the anchor's lifetime
    pub world: Transform,
    /// World placement seen from the latest pose
    pub camera_relative: Transform,
    /// Pose timestamp the anchor was placed at
    pub created_at: Duration,
    /// Pose timestamp of the last update
    pub updated_at: Duration,
    /// Set while tracking is lost
    pub frozen: bool,
}

impl AnchorNode {
    /// Anchor at `world`, seen from `pose`
    pub fn new(id: AnchorId, world: Transform, pose: &Pose) -> Self {
        Self {
            id,
            world,
            camera_relative: pose.transform().inverse().combine(&world),
            created_at: pose.timestamp,
            updated_at: pose.timestamp,
            frozen: false,
        }
    }

    /// Re-derive the camera-relative transform from a new pose
    pub fn observe(&mut self, pose: &Pose) {
        self.camera_relative = pose.transform().inverse().combine(&self.world);
        self.updated_at = pose.timestamp;
        self.frozen = false;
    }
}
