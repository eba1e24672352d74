//! Client for the public d4armory.io API.
//!
//! Looks up an account's characters and each character's hero sheet, and
//! the schedule of recent world events. The `armory-parser` binary dumps
//! all of it as JSON.

pub mod api;
pub mod models;

pub use api::{ArmoryApi, ArmoryError, DEFAULT_BASE_URL};
pub use models::{Account, Character, Hero, HeroItem, RecentEvents, WorldTier};
