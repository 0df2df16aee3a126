//! # clouddk-core
//!
//! Core types and utilities for working with the cloud.dk provisioning API.
//!
//! This crate provides the shared error taxonomy, client configuration, the
//! single-round-trip HTTP executor and the deadline-bounded wait primitive used
//! by the resource crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status classification
//! - [`id`] - Strongly-typed identifiers for cloud.dk resources
//! - [`config`] - Client settings and wait policy configuration
//! - [`client`] - HTTP executor and timeout constants
//! - [`query`] - Query-string builder
//! - [`wait`] - Deadline ticker and cancellation signal

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod query;
pub mod wait;

// Re-export commonly used types
pub use client::ApiClient;
pub use config::{ClientSettings, WaitSettings};
pub use error::{Error, Result};
pub use wait::{CancelHandle, CancelSignal, Tick, Ticker, WaitPolicy};
