//! Scene composition
//!
//! The composer owns the anchors. The first usable pose places an anchor at
//! `pose ∘ placement_offset`; later poses only re-derive the anchor's
//! camera-relative transform, so the art stays put in the world while the
//! device moves.

use slotmap::SlotMap;
use std::sync::Arc;
use std::time::Duration;

use super::{AnchorId, AnchorNode, NodeKind, RenderHints, SceneGraph, SceneNode};
use crate::assets::{AssetHandle, PlaceholderReason};
use crate::core::config::SceneConfig;
use crate::foundation::math::{Transform, Vec3};
use crate::tracking::{Confidence, Pose};
use crate::weather::VisualParameters;

/// Builds [`SceneGraph`]s from poses and weather
pub struct SceneComposer {
    placement_offset: Transform,
    max_animation_step: f32,
    anchors: SlotMap<AnchorId, AnchorNode>,
    active: Option<AnchorId>,
    pending_offset: Option<Transform>,
    placement_enabled: bool,
    relocalized: bool,
    animation_time: f32,
    last_pose_time: Option<Duration>,
    last_scene: Option<Arc<SceneGraph>>,
    generation: u64,
}

impl SceneComposer {
    /// Create a composer with no anchors
    pub fn new(config: &SceneConfig) -> Self {
        let [x, y, z] = config.placement_offset;
        Self {
            placement_offset: Transform::from_position(Vec3::new(x, y, z)),
            max_animation_step: config.max_animation_step_secs.max(0.0),
            anchors: SlotMap::with_key(),
            active: None,
            pending_offset: None,
            placement_enabled: true,
            relocalized: false,
            animation_time: 0.0,
            last_pose_time: None,
            last_scene: None,
            generation: 0,
        }
    }

    /// Compose the scene for one pose
    pub fn compose(&mut self, pose: &Pose, parameters: &VisualParameters, asset: &AssetHandle) -> Arc<SceneGraph> {
        self.advance_animation(pose, parameters.animation_speed);

        let anchor = if self.placement_enabled {
            Some(self.update_anchor(pose))
        } else {
            None
        };

        let mut hints = RenderHints::empty();
        if pose.confidence < Confidence::High {
            hints |= RenderHints::REDUCED_FIDELITY;
        }
        if std::mem::take(&mut self.relocalized) {
            hints |= RenderHints::RELOCALIZED;
        }
        match asset.placeholder_reason() {
            Some(PlaceholderReason::PoolSaturated) => hints |= RenderHints::UNDECORATED,
            Some(_) => hints |= RenderHints::PLACEHOLDER_ART,
            None => {}
        }

        let mut nodes = Vec::new();
        if anchor.is_some() {
            if !hints.contains(RenderHints::UNDECORATED) {
                nodes.push(SceneNode {
                    name: asset.id().to_string(),
                    local: Transform::identity(),
                    kind: NodeKind::Model { asset: asset.clone() },
                });
            }
            if parameters.particle_density > 0.0 && !hints.contains(RenderHints::REDUCED_FIDELITY) {
                nodes.push(SceneNode {
                    name: "particles".to_string(),
                    local: Transform::identity(),
                    kind: NodeKind::Particles {
                        density: parameters.particle_density,
                        color: parameters.tint.rgb(),
                    },
                });
            }
        }

        self.generation += 1;
        let scene = Arc::new(SceneGraph {
            anchor,
            nodes,
            animation_time: self.animation_time,
            parameters: parameters.clone(),
            hints,
            generation: self.generation,
        });
        log::trace!("Composed scene #{} with hints {:?}", scene.generation, scene.hints);
        self.last_scene = Some(Arc::clone(&scene));
        scene
    }

    fn advance_animation(&mut self, pose: &Pose, speed: f32) {
        if let Some(last) = self.last_pose_time {
            if pose.timestamp > last {
                let dt = (pose.timestamp - last).as_secs_f32().min(self.max_animation_step);
                self.animation_time += dt * speed.max(0.0);
            }
        }
        if self.last_pose_time.map_or(true, |last| pose.timestamp > last) {
            self.last_pose_time = Some(pose.timestamp);
        }
    }

    fn update_anchor(&mut self, pose: &Pose) -> AnchorNode {
        if let Some(offset) = self.pending_offset.take() {
            if let Some(old) = self.active.take() {
                self.anchors.remove(old);
            }
            return self.place(pose, offset);
        }

        match self.active.and_then(|id| self.anchors.get_mut(id)) {
            Some(anchor) => {
                anchor.observe(pose);
                *anchor
            }
            None => self.place(pose, self.placement_offset),
        }
    }

    fn place(&mut self, pose: &Pose, offset: Transform) -> AnchorNode {
        let world = pose.transform().combine(&offset);
        let id = self.anchors.insert_with_key(|id| AnchorNode::new(id, world, pose));
        self.active = Some(id);
        log::info!("Placed anchor at {:?}", world.position);
        self.anchors[id]
    }

    /// Tracking lost: freeze the anchor and keep the last scene as is
    pub fn freeze(&mut self) -> Option<Arc<SceneGraph>> {
        if let Some(anchor) = self.active.and_then(|id| self.anchors.get_mut(id)) {
            if !anchor.frozen {
                log::debug!("Freezing anchor {:?}", anchor.id);
            }
            anchor.frozen = true;
        }
        self.last_scene.clone()
    }

    /// The next scene is the first after a relocalization
    pub fn mark_relocalized(&mut self) {
        self.relocalized = true;
    }

    /// Drop the active anchor; the next pose places a new one
    pub fn discard_anchor(&mut self) {
        if let Some(id) = self.active.take() {
            self.anchors.remove(id);
            log::info!("Discarded anchor {:?}", id);
        }
        self.last_scene = None;
    }

    /// Re-anchor at `offset` from the next pose
    pub fn place_at(&mut self, offset: Transform) {
        self.pending_offset = Some(offset);
        self.placement_enabled = true;
    }

    /// Remove all placed art until [`Self::place_at`] is called
    pub fn clear(&mut self) {
        self.anchors.clear();
        self.active = None;
        self.pending_offset = None;
        self.placement_enabled = false;
        self.last_scene = None;
    }

    /// Anchors currently held
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Anchor art is currently attached to
    pub fn active_anchor(&self) -> Option<&AnchorNode> {
        self.active.and_then(|id| self.anchors.get(id))
    }

    /// Most recently composed scene
    pub fn last_scene(&self) -> Option<Arc<SceneGraph>> {
        self.last_scene.clone()
    }
}
