//! Netweave backend abstraction
//!
//! This crate defines the capability the provisioning engine consumes: a
//! backend that can create and delete one infrastructure resource at a time,
//! given fully-resolved properties, and report the attributes the created
//! resource exposes.
//!
//! The engine in `netweave-core` drives a dependency graph of resources
//! through any [`Backend`] implementation; `netweave-cloud-sim` provides an
//! in-process simulator for tests and demos.

pub mod backend;
pub mod error;

// Re-exports
pub use backend::{Backend, Outputs, Properties, RetryConfig};
pub use error::{BackendError, Result};
