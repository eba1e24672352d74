//! External delivery channels for encounter results.

pub mod webhook;
