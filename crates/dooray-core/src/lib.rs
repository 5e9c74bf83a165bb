//! Core traits, types, and error handling for dooray-tools.
//!
//! This crate provides the foundational abstractions used across all
//! dooray-tools components: the error type, configuration loading, and the
//! upstream API capability consumed by tool handlers.

pub mod client;
pub mod config;
pub mod error;

pub use client::DoorayApi;
pub use config::Config;
pub use error::{Error, Result};
