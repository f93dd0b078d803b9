//! Netweave simulated infrastructure
//!
//! An in-process [`netweave_cloud::Backend`] that mimics a cloud provider
//! API without touching real infrastructure: deterministic provider refs,
//! kind-aware outputs, injectable failures, and optional latency. Used by
//! the CLI's demo topology and by integration tests of the provisioning
//! engine.

pub mod provider;

// Re-exports
pub use provider::{SimBackend, SimResource};
