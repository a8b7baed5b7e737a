//! Fallback controller, profile registry, credential store, and extractor
//! adapter: the resilient extraction pipeline.

pub mod adapter;
pub mod controller;
pub mod credentials;
pub mod registry;

pub use adapter::{ExtractorAdapter, ProcessExtractorAdapter, ProgressEvent};
pub use controller::{FallbackController, FallbackFailure};
pub use credentials::{CredentialHandle, CredentialStore};
pub use registry::{ProfileRegistry, RegistryError};
