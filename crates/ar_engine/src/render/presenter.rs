//! Display-paced presentation
//!
//! One [`Presenter::tick`] per display refresh. If nothing newer was
//! published the previous frame is presented again. A lost surface leaves
//! the exchange untouched; recreation is retried on later ticks.

use std::sync::{Arc, Weak};

use super::{FrameExchange, RenderError, RenderFrame, Renderer};
use crate::events::{EventArg, EventQueue, EventType};

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// A frame not shown before was presented
    Presented,
    /// The previous frame was shown again
    RePresented,
    /// Nothing has been published yet
    Idle,
    /// The surface is gone; nothing was drawn
    SurfaceLost,
    /// The renderer rejected the frame
    Failed,
}

/// Presentation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// New frames presented
    pub presented: u64,
    /// Repeat presentations of an older frame
    pub re_presented: u64,
    /// Surface losses
    pub surface_losses: u64,
    /// Failed submissions other than surface loss
    pub submit_failures: u64,
}

/// Drives a [`Renderer`] from a [`FrameExchange`]
pub struct Presenter {
    renderer: Box<dyn Renderer>,
    events: Arc<EventQueue>,
    last_presented: Weak<RenderFrame>,
    surface_lost: bool,
    stats: RenderStats,
}

impl Presenter {
    /// Wrap a platform renderer
    pub fn new(renderer: Box<dyn Renderer>, events: Arc<EventQueue>) -> Self {
        Self {
            renderer,
            events,
            last_presented: Weak::new(),
            surface_lost: false,
            stats: RenderStats::default(),
        }
    }

    /// Present the newest frame once
    pub fn tick(&mut self, exchange: &FrameExchange) -> PresentOutcome {
        if self.surface_lost && !self.restore_surface() {
            return PresentOutcome::SurfaceLost;
        }

        let Some(frame) = exchange.latest() else {
            return PresentOutcome::Idle;
        };

        match self.renderer.submit(&frame) {
            Ok(()) => {
                // A weather refresh republishes under the same camera sequence
                if std::ptr::eq(self.last_presented.as_ptr(), Arc::as_ptr(&frame)) {
                    self.stats.re_presented += 1;
                    PresentOutcome::RePresented
                } else {
                    self.last_presented = Arc::downgrade(&frame);
                    self.stats.presented += 1;
                    PresentOutcome::Presented
                }
            }
            Err(RenderError::SurfaceLost) => {
                log::warn!("Render surface lost while presenting frame #{}", frame.sequence);
                self.surface_lost = true;
                self.stats.surface_losses += 1;
                self.events.emit(EventType::RenderSurfaceLost, [("count", EventArg::Count(self.stats.surface_losses))]);
                PresentOutcome::SurfaceLost
            }
            Err(RenderError::SubmitFailed(reason)) => {
                log::warn!("Dropping frame #{}: {}", frame.sequence, reason);
                self.stats.submit_failures += 1;
                PresentOutcome::Failed
            }
        }
    }

    fn restore_surface(&mut self) -> bool {
        match self.renderer.recreate_surface() {
            Ok(()) => {
                log::info!("Render surface recreated");
                self.surface_lost = false;
                self.events.signal(EventType::RenderSurfaceRestored);
                true
            }
            Err(err) => {
                log::debug!("Surface recreation failed: {}", err);
                false
            }
        }
    }

    /// Whether the surface is currently lost
    pub fn is_surface_lost(&self) -> bool {
        self.surface_lost
    }

    /// Counters
    pub fn stats(&self) -> RenderStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::empty_frame;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Renderer replaying scripted results and recording what it drew
    struct ScriptedRenderer {
        submits: VecDeque<Result<(), RenderError>>,
        recreates: VecDeque<Result<(), RenderError>>,
        drawn: Arc<Mutex<Vec<u64>>>,
    }

    impl Renderer for ScriptedRenderer {
        fn submit(&mut self, frame: &RenderFrame) -> Result<(), RenderError> {
            let result = self.submits.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                self.drawn.lock().push(frame.sequence);
            }
            result
        }

        fn recreate_surface(&mut self) -> Result<(), RenderError> {
            self.recreates.pop_front().unwrap_or(Ok(()))
        }
    }

    fn presenter(
        submits: Vec<Result<(), RenderError>>,
        recreates: Vec<Result<(), RenderError>>,
    ) -> (Presenter, Arc<Mutex<Vec<u64>>>, Arc<EventQueue>) {
        let drawn = Arc::new(Mutex::new(Vec::new()));
        let events = EventQueue::new(16);
        let renderer = ScriptedRenderer {
            submits: submits.into(),
            recreates: recreates.into(),
            drawn: Arc::clone(&drawn),
        };
        (Presenter::new(Box::new(renderer), Arc::clone(&events)), drawn, events)
    }

    #[test]
    fn test_re_presents_when_nothing_newer() {
        let (mut presenter, drawn, _) = presenter(vec![], vec![]);
        let exchange = FrameExchange::new();
        assert_eq!(presenter.tick(&exchange), PresentOutcome::Idle);

        exchange.publish(Arc::new(empty_frame(1)));
        assert_eq!(presenter.tick(&exchange), PresentOutcome::Presented);
        assert_eq!(presenter.tick(&exchange), PresentOutcome::RePresented);
        exchange.publish(Arc::new(empty_frame(2)));
        exchange.publish(Arc::new(empty_frame(3)));
        assert_eq!(presenter.tick(&exchange), PresentOutcome::Presented);

        assert_eq!(*drawn.lock(), vec![1, 1, 3]);
        assert_eq!(presenter.stats().re_presented, 1);
    }

    #[test]
    fn test_recomposed_frame_with_same_sequence_is_new() {
        let (mut presenter, drawn, _) = presenter(vec![], vec![]);
        let exchange = FrameExchange::new();
        exchange.publish(Arc::new(empty_frame(4)));
        assert_eq!(presenter.tick(&exchange), PresentOutcome::Presented);

        exchange.publish(Arc::new(empty_frame(4)));
        assert_eq!(presenter.tick(&exchange), PresentOutcome::Presented);
        assert_eq!(presenter.tick(&exchange), PresentOutcome::RePresented);

        assert_eq!(*drawn.lock(), vec![4, 4, 4]);
        assert_eq!(presenter.stats().presented, 2);
        assert_eq!(presenter.stats().re_presented, 1);
    }

    #[test]
    fn test_surface_loss_keeps_frame_and_recovers() {
        let lost = Err(RenderError::SurfaceLost);
        let (mut presenter, drawn, events) = presenter(vec![lost], vec![Err(RenderError::SurfaceLost), Ok(())]);
        let exchange = FrameExchange::new();
        exchange.publish(Arc::new(empty_frame(7)));

        assert_eq!(presenter.tick(&exchange), PresentOutcome::SurfaceLost);
        assert_eq!(presenter.tick(&exchange), PresentOutcome::SurfaceLost);
        assert!(presenter.is_surface_lost());
        assert_eq!(presenter.tick(&exchange), PresentOutcome::Presented);

        assert_eq!(*drawn.lock(), vec![7]);
        let kinds: Vec<_> = events.drain().into_iter().map(|event| event.event_type).collect();
        assert_eq!(kinds, vec![EventType::RenderSurfaceLost, EventType::RenderSurfaceRestored]);
    }

    #[test]
    fn test_submit_failure_skips_frame() {
        let (mut presenter, _, _) = presenter(vec![Err(RenderError::SubmitFailed("oom".into()))], vec![]);
        let exchange = FrameExchange::new();
        exchange.publish(Arc::new(empty_frame(1)));
        assert_eq!(presenter.tick(&exchange), PresentOutcome::Failed);
        assert_eq!(presenter.tick(&exchange), PresentOutcome::Presented);
        assert_eq!(presenter.stats().submit_failures, 1);
    }
}
