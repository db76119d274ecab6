//! Tracking state machine
//!
//! [`PoseTracker::update`] processes one frame and never blocks beyond that
//! frame's processing. A backend result that arrives after the frame budget is
//! abandoned rather than queued, and confident tracking degrades to LIMITED.
//!
//! Relocalization is bounded twice: each RELOCALIZING episode may reject at
//! most `max_relocalization_attempts` frames, and at most
//! `relocalization_budget` LOST → RELOCALIZING cycles may start inside
//! `relocalization_window`. Exhausting either resets to INITIALIZING and tells
//! the caller to discard its anchors.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::{Confidence, Pose, RawEstimate, RawQuality, TrackingBackend, TrackingState};
use crate::camera::Frame;
use crate::core::config::TrackingConfig;
use crate::events::{EventArg, EventQueue, EventType};
use crate::foundation::time::Stopwatch;

/// Result of processing one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingUpdate {
    /// Pose for this frame, present only in TRACKING or LIMITED
    pub pose: Option<Pose>,
    /// State after the frame
    pub state: TrackingState,
    /// State before the frame
    pub previous: TrackingState,
    /// This frame completed a relocalization
    pub relocalized: bool,
    /// Relocalization failed for good; anchors must be discarded
    pub reset: bool,
    /// Backend exceeded the frame budget; result thrown away
    pub abandoned: bool,
    /// Frame was older than one already processed
    pub ignored: bool,
}

impl TrackingUpdate {
    fn new(previous: TrackingState) -> Self {
        Self {
            pose: None,
            state: previous,
            previous,
            relocalized: false,
            reset: false,
            abandoned: false,
            ignored: false,
        }
    }

    /// Tracking broke on this frame
    pub fn entered_lost(&self) -> bool {
        self.state == TrackingState::Lost && self.previous != TrackingState::Lost
    }
}

/// Tracker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Frames handed to the backend
    pub processed: u64,
    /// Frames whose result missed the budget
    pub abandoned: u64,
    /// Stale frames skipped
    pub ignored: u64,
    /// Successful relocalizations
    pub relocalizations: u64,
    /// Unrecoverable resets
    pub resets: u64,
}

/// Pose tracker wrapping a [`TrackingBackend`]
pub struct PoseTracker {
    backend: Box<dyn TrackingBackend>,
    config: TrackingConfig,
    events: Option<Arc<EventQueue>>,
    state: TrackingState,
    init_frames: u32,
    last_frame: Option<Duration>,
    last_good_pose: Option<Pose>,
    attempts: u32,
    cycles: VecDeque<Duration>,
    stats: TrackerStats,
}

impl PoseTracker {
    /// Create a tracker in INITIALIZING
    pub fn new(backend: Box<dyn TrackingBackend>, config: TrackingConfig) -> Self {
        Self {
            backend,
            config,
            events: None,
            state: TrackingState::Initializing,
            init_frames: 0,
            last_frame: None,
            last_good_pose: None,
            attempts: 0,
            cycles: VecDeque::new(),
            stats: TrackerStats::default(),
        }
    }

    /// Publish state transitions to `events`
    pub fn with_events(mut self, events: Arc<EventQueue>) -> Self {
        self.events = Some(events);
        self
    }

    /// Current state
    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// Last pose emitted in TRACKING or LIMITED
    pub fn last_pose(&self) -> Option<&Pose> {
        self.last_good_pose.as_ref()
    }

    /// Counters
    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Process one frame
    pub fn update(&mut self, frame: &Frame) -> TrackingUpdate {
        let mut update = TrackingUpdate::new(self.state);
        let timestamp = frame.timestamp();

        if self.last_frame.is_some_and(|last| timestamp <= last) {
            log::debug!("Ignoring stale frame at {:?}", timestamp);
            self.stats.ignored += 1;
            update.ignored = true;
            return update;
        }
        self.last_frame = Some(timestamp);

        if self.state == TrackingState::Lost && !self.begin_relocalization(timestamp) {
            self.reset("relocalization cycle budget exhausted");
            update.reset = true;
            update.state = self.state;
            return update;
        }

        self.stats.processed += 1;
        let stopwatch = Stopwatch::start_new();
        let estimate = self.backend.estimate(frame);

        if stopwatch.exceeded(self.config.frame_budget()) {
            log::debug!(
                "Abandoning frame #{} after {:.1} ms (budget {:?})",
                frame.sequence(),
                stopwatch.elapsed_millis(),
                self.config.frame_budget()
            );
            self.stats.abandoned += 1;
            update.abandoned = true;
            match self.state {
                TrackingState::Tracking => self.set_state(TrackingState::Limited),
                TrackingState::Relocalizing => update.reset = self.reject_relocalization(),
                _ => {}
            }
            update.state = self.state;
            return update;
        }

        match self.state {
            TrackingState::Initializing => self.initialize(&estimate, timestamp, &mut update),
            TrackingState::Tracking | TrackingState::Limited => self.track(&estimate, timestamp, &mut update),
            TrackingState::Relocalizing => self.relocalize(&estimate, timestamp, &mut update),
            // Left by begin_relocalization above
            TrackingState::Lost => {}
        }

        update.state = self.state;
        update
    }

    fn initialize(&mut self, estimate: &RawEstimate, timestamp: Duration, update: &mut TrackingUpdate) {
        if estimate.quality != RawQuality::Normal {
            self.init_frames = 0;
            return;
        }

        self.init_frames += 1;
        if self.init_frames >= self.config.init_frames_required {
            log::info!("Tracking initialized after {} frames", self.init_frames);
            self.init_frames = 0;
            self.set_state(TrackingState::Tracking);
            update.pose = Some(self.emit_pose(estimate, timestamp));
        }
    }

    fn track(&mut self, estimate: &RawEstimate, timestamp: Duration, update: &mut TrackingUpdate) {
        match estimate.quality {
            RawQuality::Normal => {
                self.set_state(TrackingState::Tracking);
                update.pose = Some(self.emit_pose(estimate, timestamp));
            }
            RawQuality::Limited => {
                self.set_state(TrackingState::Limited);
                update.pose = Some(self.emit_pose(estimate, timestamp));
            }
            RawQuality::NoPose => {
                log::debug!("Tracking lost at {:?}", timestamp);
                self.set_state(TrackingState::Lost);
            }
        }
    }

    fn relocalize(&mut self, estimate: &RawEstimate, timestamp: Duration, update: &mut TrackingUpdate) {
        let continuous = self.last_good_pose.is_some_and(|last| {
            last.transform().translation_distance(&estimate.transform) <= self.config.max_relocalization_jump
        });

        if estimate.quality == RawQuality::Normal && continuous {
            log::info!("Relocalized after {} rejected frames", self.attempts);
            self.attempts = 0;
            self.stats.relocalizations += 1;
            self.set_state(TrackingState::Tracking);
            update.pose = Some(self.emit_pose(estimate, timestamp));
            update.relocalized = true;
        } else {
            update.reset = self.reject_relocalization();
        }
    }

    /// Count a failed relocalization frame; returns true if the tracker reset
    fn reject_relocalization(&mut self) -> bool {
        self.attempts += 1;
        log::trace!("Relocalization attempt {} rejected", self.attempts);
        if self.attempts >= self.config.max_relocalization_attempts {
            self.reset("relocalization attempts exhausted");
            true
        } else {
            false
        }
    }

    /// LOST → RELOCALIZING, unless the cycle budget for the window is spent
    fn begin_relocalization(&mut self, now: Duration) -> bool {
        let window = self.config.relocalization_window();
        while self.cycles.front().is_some_and(|&start| now.saturating_sub(start) > window) {
            self.cycles.pop_front();
        }
        if self.cycles.len() >= self.config.relocalization_budget as usize {
            return false;
        }

        self.cycles.push_back(now);
        self.attempts = 0;
        self.set_state(TrackingState::Relocalizing);
        true
    }

    fn reset(&mut self, reason: &str) {
        log::warn!("Tracking unrecoverable ({reason}); restarting at INITIALIZING");
        self.backend.reset();
        self.stats.resets += 1;
        self.init_frames = 0;
        self.attempts = 0;
        self.last_good_pose = None;
        self.cycles.clear();
        self.state = TrackingState::Initializing;
        if let Some(events) = &self.events {
            events.emit(
                EventType::TrackingStateChanged,
                [
                    ("state", EventArg::State(TrackingState::Initializing)),
                    ("reset", EventArg::Flag(true)),
                    ("message", EventArg::Message(reason.to_string())),
                ],
            );
        }
    }

    fn emit_pose(&mut self, estimate: &RawEstimate, timestamp: Duration) -> Pose {
        let confidence = match self.state {
            TrackingState::Limited => Confidence::Low,
            _ => Confidence::High,
        };
        let pose = Pose::from_transform(&estimate.transform, confidence, timestamp);
        self.last_good_pose = Some(pose);
        pose
    }

    fn set_state(&mut self, state: TrackingState) {
        if self.state == state {
            return;
        }
        log::debug!("Tracking state {:?} -> {:?}", self.state, state);
        self.state = state;
        if let Some(events) = &self.events {
            events.emit(EventType::TrackingStateChanged, [("state", EventArg::State(state))]);
        }
    }
}
