//! Immutable scene snapshot handed to the renderer

use bitflags::bitflags;

use super::AnchorNode;
use crate::assets::AssetHandle;
use crate::foundation::math::{Mat4, Transform, Vec3};
use crate::weather::VisualParameters;

bitflags! {
    /// How the renderer should degrade this frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderHints: u8 {
        /// Low tracking confidence: simplify shading, no particles
        const REDUCED_FIDELITY = 1 << 0;
        /// The model is a load-failure stand-in
        const PLACEHOLDER_ART = 1 << 1;
        /// No model at all; loader pool was saturated
        const UNDECORATED = 1 << 2;
        /// First frame after relocalization
        const RELOCALIZED = 1 << 3;
    }
}

/// Node payload
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Art model
    Model {
        /// Model reference, kept alive while the scene exists
        asset: AssetHandle,
    },
    /// Weather particles
    Particles {
        /// Density in [0, 1]
        density: f32,
        /// Tint color
        color: Vec3,
    },
}

/// Node attached to the anchor
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Node name
    pub name: String,
    /// Transform relative to the anchor
    pub local: Transform,
    /// Payload
    pub kind: NodeKind,
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone)]
pub struct SceneGraph {
    /// Anchor the nodes hang off; `None` when nothing is placed
    pub anchor: Option<AnchorNode>,
    /// Nodes relative to the anchor
    pub nodes: Vec<SceneNode>,
    /// Animation clock in seconds
    pub animation_time: f32,
    /// Weather parameters the scene was built from
    pub parameters: VisualParameters,
    /// Degradation hints
    pub hints: RenderHints,
    /// Increments with every composed scene
    pub generation: u64,
}

impl SceneGraph {
    /// Model handle, if the scene has one
    pub fn model(&self) -> Option<&AssetHandle> {
        self.nodes.iter().find_map(|node| match &node.kind {
            NodeKind::Model { asset } => Some(asset),
            NodeKind::Particles { .. } => None,
        })
    }

    /// Particle density, if particles are shown
    pub fn particle_density(&self) -> Option<f32> {
        self.nodes.iter().find_map(|node| match node.kind {
            NodeKind::Particles { density, .. } => Some(density),
            NodeKind::Model { .. } => None,
        })
    }

    /// Camera-space matrix for `node`
    pub fn model_view(&self, node: &SceneNode) -> Option<Mat4> {
        self.anchor
            .map(|anchor| anchor.camera_relative.combine(&node.local).to_matrix())
    }

    /// Whether nothing is placed
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
