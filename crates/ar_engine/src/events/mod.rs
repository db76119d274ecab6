//! Pipeline event system
//!
//! Tracking transitions, capture stalls, asset failures and surface losses
//! are reported as [`Event`]s carrying named [`EventArg`]s. A handler that
//! returns `true` consumes the event and later handlers never see it.
//!
//! Pipeline threads publish into a shared [`EventQueue`]. The application
//! owns an [`EventSystem`] and calls [`EventSystem::dispatch`] from its own
//! loop, which swaps the queue out under the lock and forwards events to the
//! registered handlers (UI confidence indicator, telemetry, ...).

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use crate::tracking::TrackingState;

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Tracker moved to a different state
    TrackingStateChanged,
    /// Camera kept failing past the stall threshold
    CaptureStalled,
    /// Camera device went away; capture thread ended
    CaptureDisconnected,
    /// A model could not be loaded and was replaced by a placeholder
    AssetLoadFailed,
    /// Loader pool queue was full; art is missing until it drains
    AssetPoolSaturated,
    /// Renderer lost its surface
    RenderSurfaceLost,
    /// Renderer recreated its surface
    RenderSurfaceRestored,
}

/// Variant for type-safe event arguments
#[derive(Debug, Clone, PartialEq)]
pub enum EventArg {
    /// Tracking state
    State(TrackingState),
    /// Asset identifier
    AssetId(String),
    /// Attempt or failure counter
    Count(u64),
    /// Flag (e.g. whether a reset discarded the anchor)
    Flag(bool),
    /// Human readable detail
    Message(String),
}

/// Event with type ID and key-value arguments
#[derive(Debug, Clone)]
pub struct Event {
    /// Type of event
    pub event_type: EventType,
    /// Seconds since the queue was created
    pub timestamp: f64,
    args: HashMap<&'static str, EventArg>,
}

impl Event {
    /// Create a new event with the given type and timestamp
    pub fn new(event_type: EventType, timestamp: f64) -> Self {
        Self {
            event_type,
            timestamp,
            args: HashMap::new(),
        }
    }

    /// Add an argument to the event (builder pattern)
    pub fn with_arg(mut self, key: &'static str, value: EventArg) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Get an argument by key
    pub fn get_arg(&self, key: &str) -> Option<&EventArg> {
        self.args.get(key)
    }

    /// Get the `state` argument if present
    pub fn get_state(&self) -> Option<TrackingState> {
        if let Some(EventArg::State(state)) = self.get_arg("state") {
            Some(*state)
        } else {
            None
        }
    }

    /// Get the `asset_id` argument if present
    pub fn get_asset_id(&self) -> Option<&str> {
        if let Some(EventArg::AssetId(id)) = self.get_arg("asset_id") {
            Some(id.as_str())
        } else {
            None
        }
    }

    /// Get the `count` argument if present
    pub fn get_count(&self) -> Option<u64> {
        if let Some(EventArg::Count(count)) = self.get_arg("count") {
            Some(*count)
        } else {
            None
        }
    }

    /// Get the `message` argument if present
    pub fn get_message(&self) -> Option<&str> {
        if let Some(EventArg::Message(message)) = self.get_arg("message") {
            Some(message.as_str())
        } else {
            None
        }
    }
}

/// Event handler trait
/// Returns true if event was consumed (stops forwarding)
pub trait EventHandler {
    /// Handle an event, return true if consumed
    fn on_event(&mut self, event: &Event) -> bool;
}

struct QueueState {
    events: VecDeque<Event>,
    dropped: u64,
    last_tracking_state: Option<TrackingState>,
}

/// Thread-safe, bounded publisher side of the event system
///
/// When full the oldest event is dropped. Consecutive tracking-state events
/// carrying the same state are suppressed.
pub struct EventQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    epoch: Instant,
}

impl EventQueue {
    /// Default number of undelivered events kept
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Create a shareable queue
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                events: VecDeque::new(),
                dropped: 0,
                last_tracking_state: None,
            }),
            capacity: capacity.max(1),
            epoch: Instant::now(),
        })
    }

    /// Seconds since the queue was created
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Publish an event stamped with the current time
    pub fn emit(&self, event_type: EventType, args: impl IntoIterator<Item = (&'static str, EventArg)>) {
        let event = args
            .into_iter()
            .fold(Event::new(event_type, self.now()), |event, (key, value)| {
                event.with_arg(key, value)
            });
        self.publish(event);
    }

    /// Publish an event without arguments
    pub fn signal(&self, event_type: EventType) {
        self.publish(Event::new(event_type, self.now()));
    }

    /// Publish a prepared event
    pub fn publish(&self, event: Event) {
        let mut state = self.state.lock();

        if event.event_type == EventType::TrackingStateChanged {
            let new_state = event.get_state();
            if new_state.is_some() && new_state == state.last_tracking_state {
                log::trace!("Suppressed duplicate tracking event {:?}", new_state);
                return;
            }
            state.last_tracking_state = new_state;
        }

        if state.events.len() >= self.capacity {
            state.events.pop_front();
            state.dropped += 1;
        }
        state.events.push_back(event);
    }

    /// Take every pending event, oldest first
    pub fn drain(&self) -> Vec<Event> {
        let mut state = self.state.lock();
        std::mem::take(&mut state.events).into()
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Whether no events are pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}

/// Event system with registration and dispatch
/// Follows chain of responsibility pattern
pub struct EventSystem {
    queue: Arc<EventQueue>,
    handlers: HashMap<EventType, Vec<Box<dyn EventHandler>>>,
}

impl EventSystem {
    /// Create an event system draining `queue`
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
        }
    }

    /// The shared publisher queue
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Register a handler for a specific event type
    pub fn register_handler(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) {
        self.handlers.entry(event_type).or_default().push(handler);
    }

    /// Dispatch all pending events, returning how many were drained
    pub fn dispatch(&mut self) -> usize {
        let events = self.queue.drain();
        for event in &events {
            self.dispatch_event(event);
        }
        events.len()
    }

    /// Dispatch single event to registered handlers
    /// Stops on first handler that returns true (consumed)
    fn dispatch_event(&mut self, event: &Event) {
        if let Some(handlers) = self.handlers.get_mut(&event.event_type) {
            for handler in handlers.iter_mut() {
                if handler.on_event(event) {
                    break;
                }
            }
        }
    }
}
