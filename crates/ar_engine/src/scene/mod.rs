//! Scene composition
//!
//! [`SceneComposer`] turns a pose plus the current weather parameters into
//! an immutable [`SceneGraph`] anchored in the tracked world.

mod anchor;
mod composer;
mod scene_graph;

pub use anchor::{AnchorId, AnchorNode};
pub use composer::SceneComposer;
pub use scene_graph::{NodeKind, RenderHints, SceneGraph, SceneNode};
