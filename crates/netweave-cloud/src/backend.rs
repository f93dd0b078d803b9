//! Infrastructure backend trait definition

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Fully-resolved property map handed to a backend. Every attribute
/// reference has already been substituted with a concrete value.
pub type Properties = HashMap<String, serde_json::Value>;

/// Attributes produced by a successful create call (provider ref, allocated
/// IPs, DNS names, ...).
pub type Outputs = HashMap<String, serde_json::Value>;

/// Infrastructure backend abstraction
///
/// All backends (cloud provider APIs, local simulators) implement this trait
/// to provide a unified create/delete interface for the provisioner. The
/// provisioner is agnostic to transport and authentication; a backend only
/// sees one resource at a time with fully-resolved properties.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the backend name (e.g., "sim", "aws")
    fn name(&self) -> &str;

    /// Create one resource of `kind`, registered under the declarer-assigned
    /// `id`. Returns the outputs the resource exposes to its dependents.
    async fn create(&self, kind: &str, id: &str, properties: &Properties) -> Result<Outputs>;

    /// Delete the resource of `kind` previously created under `id`.
    async fn delete(&self, kind: &str, id: &str) -> Result<()>;
}

/// Retry configuration for backend operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Cap on the delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier applied per retry
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based), with
    /// exponential backoff capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}
