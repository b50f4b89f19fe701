//! Core domain + application logic for the WhatsApp auto-translator bot.
//!
//! This crate is intentionally platform-agnostic. The WhatsApp session layer
//! and the translation provider live behind ports (traits) implemented in
//! adapter crates.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod langs;
pub mod logging;
pub mod prefs;
pub mod retry;
pub mod session;
pub mod translate;

pub use errors::{Error, Result};
