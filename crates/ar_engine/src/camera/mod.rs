//! Camera capture domain
//!
//! [`CameraFrameSource`] runs a dedicated, sensor-paced capture thread that
//! pulls images from a [`CameraDevice`] and posts [`Frame`]s into a
//! single-slot mailbox. A slow consumer only ever sees the newest frame; older
//! undelivered frames are dropped.
//!
//! Transient capture failures are retried with exponential backoff bounded by
//! [`CameraConfig::backoff_max`]. They never end the pipeline.

mod frame;

pub use frame::{CameraIntrinsics, CapturedImage, Frame, PixelFormat};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

use crate::core::config::CameraConfig;
use crate::events::{EventArg, EventQueue, EventType};
use crate::foundation::handoff::{Mailbox, MailboxStats, TakeError};

/// Capture errors reported by a camera device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Temporary failure; capture will be retried
    #[error("Transient capture error: {0}")]
    Transient(String),

    /// The device is gone; the capture thread stops
    #[error("Camera disconnected: {0}")]
    Disconnected(String),
}

/// Camera capability consumed by the capture thread
pub trait CameraDevice: Send {
    /// Block until the sensor delivers the next image
    fn capture(&mut self) -> Result<CapturedImage, CaptureError>;

    /// Intrinsics for images from this device
    fn intrinsics(&self) -> CameraIntrinsics;
}

/// Exponential retry delay with an upper bound
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    /// Create a backoff starting at `base` and capped at `max`
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max, failures: 0 }
    }

    /// Record a failure and return the delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.failures.min(16);
        self.failures = self.failures.saturating_add(1);
        self.base.saturating_mul(1 << exponent).min(self.max)
    }

    /// Consecutive failures since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Forget previous failures after a success
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

/// Capture statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Handoff traffic (posted / delivered / dropped frames)
    pub mailbox: MailboxStats,
    /// Frames discarded because their timestamp did not increase
    pub out_of_order: u64,
    /// Transient capture errors seen
    pub transient_errors: u64,
}

struct SourceShared {
    mailbox: Mailbox<Frame>,
    running: AtomicBool,
    out_of_order: parking_lot::Mutex<u64>,
    transient_errors: parking_lot::Mutex<u64>,
}

/// Producer of timestamped frames on its own capture thread
pub struct CameraFrameSource {
    shared: Arc<SourceShared>,
    thread: Option<JoinHandle<()>>,
}

impl CameraFrameSource {
    /// Start capturing from `device` on a new thread
    pub fn start(
        device: Box<dyn CameraDevice>,
        config: &CameraConfig,
        events: Arc<EventQueue>,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(SourceShared {
            mailbox: Mailbox::new(),
            running: AtomicBool::new(true),
            out_of_order: parking_lot::Mutex::new(0),
            transient_errors: parking_lot::Mutex::new(0),
        });

        let worker = CaptureLoop {
            device,
            shared: Arc::clone(&shared),
            events,
            backoff: Backoff::new(config.backoff_base(), config.backoff_max()),
            stall_threshold: config.stall_threshold,
        };
        let thread = thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || worker.run())?;

        log::info!("Camera capture started");
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Most recent undelivered frame, without waiting
    pub fn next(&self) -> Option<Frame> {
        self.shared.mailbox.try_take()
    }

    /// Wait up to `timeout` for a frame
    pub fn next_timeout(&self, timeout: Duration) -> Result<Frame, TakeError> {
        self.shared.mailbox.take_timeout(timeout)
    }

    /// Whether the capture thread is still producing
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire) && !self.shared.mailbox.is_closed()
    }

    /// Capture statistics so far
    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            mailbox: self.shared.mailbox.stats(),
            out_of_order: *self.shared.out_of_order.lock(),
            transient_errors: *self.shared.transient_errors.lock(),
        }
    }

    /// Ask the capture thread to stop; wakes any consumer waiting for a frame
    pub fn signal_stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.mailbox.close();
    }

    /// Stop capturing and join the thread
    pub fn stop(&mut self) -> CaptureStats {
        self.signal_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Camera capture thread panicked");
            }
            log::info!("Camera capture stopped");
        }
        self.stats()
    }
}

impl Drop for CameraFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CaptureLoop {
    device: Box<dyn CameraDevice>,
    shared: Arc<SourceShared>,
    events: Arc<EventQueue>,
    backoff: Backoff,
    stall_threshold: u32,
}

impl CaptureLoop {
    fn run(mut self) {
        let intrinsics = self.device.intrinsics();
        let mut last_timestamp: Option<Duration> = None;
        let mut sequence = 0u64;
        let mut stalled = false;

        while self.shared.running.load(Ordering::Acquire) {
            match self.device.capture() {
                Ok(image) => {
                    if stalled {
                        log::info!("Camera capture recovered after {} failures", self.backoff.failures());
                        stalled = false;
                    }
                    self.backoff.reset();

                    if last_timestamp.is_some_and(|last| image.timestamp <= last) {
                        log::warn!(
                            "Dropping frame with non-increasing timestamp {:?} (last {:?})",
                            image.timestamp,
                            last_timestamp
                        );
                        *self.shared.out_of_order.lock() += 1;
                        continue;
                    }
                    last_timestamp = Some(image.timestamp);

                    let frame = Frame::new(image, intrinsics, sequence);
                    sequence += 1;
                    if let Some(old) = self.shared.mailbox.put(frame) {
                        log::trace!("Dropped undelivered frame #{}", old.sequence());
                    }
                }
                Err(CaptureError::Transient(reason)) => {
                    *self.shared.transient_errors.lock() += 1;
                    let delay = self.backoff.next_delay();
                    log::debug!("Transient capture error ({reason}); retrying in {delay:?}");

                    if !stalled && self.backoff.failures() >= self.stall_threshold {
                        stalled = true;
                        log::warn!("Camera stalled after {} consecutive failures", self.backoff.failures());
                        self.events.emit(
                            EventType::CaptureStalled,
                            [
                                ("count", EventArg::Count(u64::from(self.backoff.failures()))),
                                ("message", EventArg::Message(reason)),
                            ],
                        );
                    }
                    thread::sleep(delay);
                }
                Err(CaptureError::Disconnected(reason)) => {
                    log::error!("Camera disconnected: {reason}");
                    self.events.emit(EventType::CaptureDisconnected, [("message", EventArg::Message(reason))]);
                    break;
                }
            }
        }

        self.shared.running.store(false, Ordering::Release);
        self.shared.mailbox.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted device: replays results, then reports disconnect
    struct ScriptedCamera {
        script: VecDeque<Result<u64, CaptureError>>,
        pace: Duration,
    }

    impl CameraDevice for ScriptedCamera {
        fn capture(&mut self) -> Result<CapturedImage, CaptureError> {
            thread::sleep(self.pace);
            match self.script.pop_front() {
                Some(Ok(ms)) => Ok(CapturedImage {
                    data: Arc::from(vec![0u8; 16]),
                    width: 4,
                    height: 4,
                    format: PixelFormat::Gray8,
                    timestamp: Duration::from_millis(ms),
                }),
                Some(Err(err)) => Err(err),
                None => Err(CaptureError::Disconnected("script finished".to_string())),
            }
        }

        fn intrinsics(&self) -> CameraIntrinsics {
            CameraIntrinsics::from_fov(4, 4, 1.0)
        }
    }

    fn fast_config() -> CameraConfig {
        CameraConfig {
            stall_threshold: 2,
            ..CameraConfig::default().with_backoff(1, 4)
        }
    }

    fn drain_all(source: &CameraFrameSource) -> Vec<Frame> {
        let mut frames = Vec::new();
        loop {
            match source.next_timeout(Duration::from_millis(200)) {
                Ok(frame) => frames.push(frame),
                Err(TakeError::Closed) => break,
                Err(TakeError::Timeout) => {}
            }
        }
        frames
    }

    #[test]
    fn test_backoff_is_bounded() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(100));
        let delays: Vec<_> = (0..6).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![10, 20, 40, 80, 100, 100]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_transient_errors_are_retried_and_reported() {
        let script = VecDeque::from(vec![
            Ok(1),
            Err(CaptureError::Transient("exposure".into())),
            Err(CaptureError::Transient("exposure".into())),
            Err(CaptureError::Transient("exposure".into())),
            Ok(2),
        ]);
        let events = EventQueue::new(16);
        let source = CameraFrameSource::start(
            Box::new(ScriptedCamera { script, pace: Duration::from_millis(2) }),
            &fast_config(),
            Arc::clone(&events),
        )
        .unwrap();

        let frames = drain_all(&source);
        assert_eq!(frames.last().map(Frame::timestamp), Some(Duration::from_millis(2)));
        assert_eq!(source.stats().transient_errors, 3);

        let kinds: Vec<_> = events.drain().into_iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, vec![EventType::CaptureStalled, EventType::CaptureDisconnected]);
    }

    #[test]
    fn test_non_increasing_timestamps_are_dropped() {
        let script = VecDeque::from(vec![Ok(10), Ok(10), Ok(5), Ok(11)]);
        let source = CameraFrameSource::start(
            Box::new(ScriptedCamera { script, pace: Duration::from_millis(15) }),
            &fast_config(),
            EventQueue::new(16),
        )
        .unwrap();

        let timestamps: Vec<_> = drain_all(&source).iter().map(Frame::timestamp).collect();
        assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(source.stats().out_of_order, 2);
    }

    #[test]
    fn test_slow_consumer_sees_bounded_backlog() {
        let script = (1..=200).map(Ok).collect();
        let mut source = CameraFrameSource::start(
            Box::new(ScriptedCamera { script, pace: Duration::ZERO }),
            &fast_config(),
            EventQueue::new(16),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        let stats = source.stop();
        let pending = usize::from(source.next().is_some());
        assert!(pending <= 1);
        assert_eq!(stats.mailbox.posted, stats.mailbox.delivered + stats.mailbox.dropped + pending as u64);
        assert!(stats.mailbox.dropped > 0);
    }
}
