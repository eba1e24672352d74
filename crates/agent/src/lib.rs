//! `d4log-agent` library crate.
//!
//! The combat logger daemon: reads game state from the running game,
//! turns it into combat events and encounter summaries, and writes them to
//! disk and to optional remote collectors. The binary entrypoint lives in
//! `main.rs`; the modules are public for integration testing.

pub mod collector;
pub mod config;
pub mod error;
pub mod logger;
pub mod offsets;
pub mod sender;
pub mod session;

pub use config::AgentConfig;
pub use error::{AgentError, ConfigError, Result};
