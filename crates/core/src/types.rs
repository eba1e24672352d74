/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Runtime id of an actor in the game world. Reused by the game once the
/// actor despawns, so it is only unique while the actor is visible.
pub type EntityId = u32;

/// SNO id of a power (skill, buff, debuff) from the game data files.
pub type PowerId = u32;

/// Sequential id of an encounter within one logging session, starting at 1.
pub type EncounterId = u64;
