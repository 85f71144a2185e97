//! Core domain + application logic for the thumbnail relay bot.
//!
//! This crate is framework-agnostic. Telegram lives behind ports (traits)
//! implemented in the adapter crate.

pub mod admin;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod media;
pub mod messaging;
pub mod pipeline;
pub mod platform;
pub mod service;
pub mod stats;
pub mod store;
pub mod thumbnail;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
