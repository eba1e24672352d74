//! `d4log-miner` -- reader for mined game-data dumps.
//!
//! Turns a directory of JSON exports (string lists, affixes, skill kits and
//! powers) into a [`GameDatabase`] that the logger uses to put names on the
//! numeric power ids it reads from memory.

pub mod database;
pub mod error;
pub mod files;
pub mod parser;

pub use database::{DatabaseCounts, GameDatabase, ParseWarning};
pub use error::{MinerError, Result};
pub use files::{AffFile, FileKind, PowFile, SklFile, StlFile};
pub use parser::Parser;
