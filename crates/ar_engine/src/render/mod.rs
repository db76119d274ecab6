//! Render domain
//!
//! The core never draws. It publishes immutable [`RenderFrame`]s into a
//! [`FrameExchange`] and a [`Presenter`], driven at display cadence, hands
//! the newest one to the platform [`Renderer`].

mod presenter;

pub use presenter::{PresentOutcome, Presenter, RenderStats};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::foundation::math::Mat4;
use crate::scene::SceneGraph;
use crate::tracking::Pose;

/// Rendering errors reported by the platform renderer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The presentation surface went away (backgrounding, resize)
    #[error("Render surface lost")]
    SurfaceLost,

    /// Any other submission failure; the frame is skipped
    #[error("Frame submission failed: {0}")]
    SubmitFailed(String),
}

/// Everything the renderer needs for one presentation
#[derive(Debug, Clone)]
pub struct RenderFrame {
    /// Sequence of the camera frame this was composed from
    pub sequence: u64,
    /// Device pose the scene was composed for
    pub pose: Pose,
    /// Composed scene
    pub scene: Arc<SceneGraph>,
    /// Camera projection for the frame
    pub projection: Mat4,
    /// Capture timestamp
    pub timestamp: Duration,
}

impl RenderFrame {
    /// World-to-camera matrix
    pub fn view_matrix(&self) -> Mat4 {
        self.pose.transform().inverse().to_matrix()
    }
}

/// Platform renderer capability
pub trait Renderer: Send {
    /// Draw and present one frame
    fn submit(&mut self, frame: &RenderFrame) -> Result<(), RenderError>;

    /// Rebuild the presentation surface after [`RenderError::SurfaceLost`]
    fn recreate_surface(&mut self) -> Result<(), RenderError>;
}

/// Latest-value exchange between Track+Compose and Render
///
/// Publishing swaps in the new frame; the renderer always reads the newest
/// one and never blocks the publisher for longer than a pointer swap.
#[derive(Default)]
pub struct FrameExchange {
    latest: Mutex<Option<Arc<RenderFrame>>>,
    published: AtomicU64,
}

impl FrameExchange {
    /// Empty exchange
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame
    pub fn publish(&self, frame: Arc<RenderFrame>) {
        *self.latest.lock() = Some(frame);
        self.published.fetch_add(1, Ordering::Release);
    }

    /// Newest frame, if any; not consumed
    pub fn latest(&self) -> Option<Arc<RenderFrame>> {
        self.latest.lock().clone()
    }

    /// Drop the current frame
    pub fn clear(&self) -> Option<Arc<RenderFrame>> {
        self.latest.lock().take()
    }

    /// Frames published so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }
}
