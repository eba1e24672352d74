//! Event fan-out, durable logging and external delivery.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`LoggedEvent`] / [`LoggedSummary`] -- the session-stamped records
//!   that flow over the bus.
//! - [`SessionSequencer`] -- assigns the session id and sequence numbers.
//! - [`EventLog`] -- background writer appending records to a JSONL file.
//! - [`replay`] -- reads a JSONL log back.
//! - [`delivery`] -- external delivery channels (webhook).

pub mod bus;
pub mod delivery;
pub mod error;
pub mod persistence;
pub mod replay;

pub use bus::{EventBus, LoggedEvent, LoggedSummary, SessionSequencer};
pub use delivery::webhook::{WebhookDelivery, WebhookError};
pub use error::{EventLogError, Result};
pub use persistence::{event_log_path, summary_log_path, EventLog};
pub use replay::read_event_log;
