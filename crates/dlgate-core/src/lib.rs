//! Shared error taxonomy, configuration, and domain model for dlgate.
//!
//! This crate has no knowledge of HTTP or of the extractor binary; it is
//! the contract the `dlgate-extractor` and `dlgate-server` crates build on.

pub mod cancel;
pub mod config;
pub mod error;
pub mod model;
pub mod plan;

pub use cancel::CancellationToken;
pub use config::Settings;
pub use error::{DlgateError, ErrorKind, Outcome, Result};
