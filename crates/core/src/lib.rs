//! `d4log-core` -- combat domain types and pure logic.
//!
//! Nothing in this crate touches the game process, the filesystem or the
//! network. The agent feeds it snapshots and gets back events, encounter
//! markers and summaries.

pub mod buffs;
pub mod combat;
pub mod cooldowns;
pub mod detector;
pub mod encounter;
pub mod error;
pub mod message_types;
pub mod snapshot;
pub mod stats;
pub mod types;

pub use combat::{CombatEvent, EncounterOutcome};
pub use detector::{DetectorConfig, EventDetector};
pub use encounter::{EncounterTracker, TrackedEvent};
pub use error::CoreError;
pub use snapshot::GameSnapshot;
pub use stats::{EncounterStats, EncounterSummary};
