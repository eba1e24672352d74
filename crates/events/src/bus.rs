//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub between the sampling
//! loop and its consumers (log writer, WebSocket sender, webhook). The
//! agent runs one bus of [`LoggedEvent`]s and one of [`LoggedSummary`]s.

use chrono::Utc;
use d4log_core::encounter::TrackedEvent;
use d4log_core::types::{EncounterId, Timestamp};
use d4log_core::{CombatEvent, EncounterSummary};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A combat event stamped with its place in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub session_id: Uuid,

    /// Position in the session, starting at 1 with no gaps.
    pub sequence: u64,

    /// Encounter the event belongs to, `None` outside combat.
    pub encounter_id: Option<EncounterId>,

    /// Snapshot time the event was derived from.
    pub timestamp: Timestamp,

    pub event: CombatEvent,
}

/// A finished encounter, tagged with its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedSummary {
    pub session_id: Uuid,

    #[serde(flatten)]
    pub summary: EncounterSummary,
}

// ---------------------------------------------------------------------------
// SessionSequencer
// ---------------------------------------------------------------------------

/// Hands out the session id and consecutive sequence numbers.
#[derive(Debug)]
pub struct SessionSequencer {
    session_id: Uuid,
    started_at: Timestamp,
    last: u64,
}

impl SessionSequencer {
    /// Start a new session with a time-ordered id.
    pub fn new() -> Self {
        Self::with_session_id(Uuid::now_v7())
    }

    pub fn with_session_id(session_id: Uuid) -> Self {
        Self {
            session_id,
            started_at: Utc::now(),
            last: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Sequence number of the most recent event, 0 before the first.
    pub fn last_sequence(&self) -> u64 {
        self.last
    }

    pub fn stamp(
        &mut self,
        timestamp: Timestamp,
        encounter_id: Option<EncounterId>,
        event: CombatEvent,
    ) -> LoggedEvent {
        self.last += 1;
        LoggedEvent {
            session_id: self.session_id,
            sequence: self.last,
            encounter_id,
            timestamp,
            event,
        }
    }

    pub fn stamp_tracked(&mut self, timestamp: Timestamp, tracked: TrackedEvent) -> LoggedEvent {
        self.stamp(timestamp, tracked.encounter_id, tracked.event)
    }

    pub fn summary(&self, summary: EncounterSummary) -> LoggedSummary {
        LoggedSummary {
            session_id: self.session_id,
            summary,
        }
    }
}

impl Default for SessionSequencer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel. At the default
/// 100 ms sampling interval this holds several minutes of busy combat.
pub const DEFAULT_CAPACITY: usize = 4096;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published record.
///
/// # Usage
///
/// ```rust
/// use d4log_events::bus::{EventBus, LoggedEvent};
///
/// let bus: EventBus<LoggedEvent> = EventBus::default();
/// let mut rx = bus.subscribe();
/// # drop(rx);
/// ```
pub struct EventBus<T = LoggedEvent> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a record to all current subscribers.
    ///
    /// If there are no active subscribers the record is silently dropped.
    pub fn publish(&self, record: T) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(record);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
