//! Dooray REST API client for dooray-tools.
//!
//! Implements the [`dooray_core::DoorayApi`] capability over HTTP with
//! Dooray's `dooray-api` authorization scheme and response envelope.

pub mod client;

pub use client::DoorayHttpClient;
