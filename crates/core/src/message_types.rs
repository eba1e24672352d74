//! WebSocket message type discriminators.
//!
//! Used by the agent when streaming to a remote collector and by any
//! consumer parsing that stream.

/// A single logged combat event with its session envelope.
pub const MSG_TYPE_COMBAT_EVENT: &str = "combat_event";

/// A finished encounter's [`EncounterSummary`](crate::stats::EncounterSummary).
pub const MSG_TYPE_ENCOUNTER_SUMMARY: &str = "encounter_summary";

/// Sent once after the logger attached to the game process.
pub const MSG_TYPE_SESSION_START: &str = "session_start";

/// Sent when the logger detaches (game exit or shutdown).
pub const MSG_TYPE_SESSION_END: &str = "session_end";
