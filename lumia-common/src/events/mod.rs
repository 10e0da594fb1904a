//! Event types for the Lumia event system
//!
//! Provides session event definitions and the EventBus used to publish them.

mod session_types;

pub use session_types::{SessionErrorKind, SessionPhase, SessionStatus};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::TrackId;

/// Session event types
///
/// Events are broadcast via EventBus and can be serialized for diagnostics
/// output (the console driver prints them as JSON lines).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Session phase changed
    ///
    /// Emitted on every transition, including re-entrant ones
    /// (Loading → Loading when a request is superseded).
    StateChanged {
        /// Phase before the change
        old_phase: SessionPhase,
        /// Phase after the change
        new_phase: SessionPhase,
        /// Track the new phase refers to
        track_id: Option<TrackId>,
        /// Epoch of the new phase
        epoch: u64,
        /// When the phase changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track became audible
    TrackStarted {
        track_id: TrackId,
        epoch: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A resource created for a superseded request was torn down unseen
    StaleDiscarded {
        track_id: TrackId,
        /// Epoch the resource was created for
        epoch: u64,
        /// Epoch that superseded it
        current_epoch: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Preferences finished loading (or fell back to defaults)
    PreferencesReady {
        enabled: bool,
        selected_track: Option<TrackId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Recoverable failure
    ///
    /// Never fatal; the session is left in a re-activatable state.
    Error {
        kind: SessionErrorKind,
        track_id: Option<TrackId>,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SessionEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            SessionEvent::StateChanged { .. } => "StateChanged",
            SessionEvent::TrackStarted { .. } => "TrackStarted",
            SessionEvent::StaleDiscarded { .. } => "StaleDiscarded",
            SessionEvent::PreferencesReady { .. } => "PreferencesReady",
            SessionEvent::Error { .. } => "Error",
        }
    }

    /// Error kind, if this is an error event
    pub fn error_kind(&self) -> Option<SessionErrorKind> {
        match self {
            SessionEvent::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use lumia_common::events::{EventBus, SessionEvent, SessionPhase};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(SessionEvent::StateChanged {
///     old_phase: SessionPhase::Idle,
///     new_phase: SessionPhase::Loading,
///     track_id: None,
///     epoch: 1,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "StateChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
