//! Simulated backend implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netweave_cloud::{Backend, BackendError, Outputs, Properties};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// One resource held by the simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimResource {
    /// Declarer-assigned id
    pub id: String,

    /// Resource kind
    pub kind: String,

    /// Provider-side ref (e.g., "vpc-000001")
    pub provider_ref: String,

    /// Properties the resource was created with
    pub properties: Properties,

    /// Outputs reported back to the engine
    pub outputs: Outputs,

    /// When the resource was created
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct SimState {
    sequence: u64,
    resources: HashMap<String, SimResource>,
    log: Vec<String>,
    flaky_creates: HashMap<String, u32>,
    fail_creates: HashSet<String>,
    fail_deletes: HashSet<String>,
}

/// An in-process infrastructure API
///
/// Creates nothing real: resources live in a map, provider refs come from a
/// counter, and a few well-known kinds get the extra outputs a cloud API
/// would report (EIP allocation ids, load balancer DNS names). Failure
/// injection and artificial latency make it useful for exercising the
/// engine's retry, rollback, and concurrency paths.
pub struct SimBackend {
    state: Mutex<SimState>,
    latency: Option<Duration>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            latency: None,
        }
    }

    /// Sleep this long inside every create/delete call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `times` create calls for `id` fail with a transient
    /// (retryable) timeout
    pub fn flaky_create(&self, id: impl Into<String>, times: u32) {
        self.state
            .lock()
            .unwrap()
            .flaky_creates
            .insert(id.into(), times);
    }

    /// Make every create call for `id` fail terminally
    pub fn fail_create(&self, id: impl Into<String>) {
        self.state.lock().unwrap().fail_creates.insert(id.into());
    }

    /// Make every delete call for `id` fail
    pub fn fail_delete(&self, id: impl Into<String>) {
        self.state.lock().unwrap().fail_deletes.insert(id.into());
    }

    /// Ids of all currently-existing resources
    pub fn resource_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<String> = state.resources.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of one resource
    pub fn resource(&self, id: &str) -> Option<SimResource> {
        self.state.lock().unwrap().resources.get(id).cloned()
    }

    /// Chronological create/delete event log ("create network the-vpc")
    pub fn event_log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    fn next_ref(state: &mut SimState, kind: &str) -> String {
        state.sequence += 1;
        format!("{}-{:06x}", ref_prefix(kind), state.sequence)
    }
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// AWS-flavored ref prefixes for the kinds the demo topology uses;
/// unknown kinds fall back to the kind tag itself
fn ref_prefix(kind: &str) -> &str {
    match kind {
        "network" => "vpc",
        "internet-gateway" => "igw",
        "gateway-attachment" => "igw-attach",
        "route-table" => "rtb",
        "route" => "r",
        "subnet" => "subnet",
        "eip" => "eipalloc",
        "nat-gateway" => "nat",
        "security-group" => "sg",
        "keypair" => "key",
        "instance" => "i",
        "loadbalancer" => "lb",
        "target-group" => "tg",
        "autoscaling-group" => "asg",
        "listener" => "lsn",
        other => other,
    }
}

#[async_trait]
impl Backend for SimBackend {
    fn name(&self) -> &str {
        "sim"
    }

    async fn create(&self, kind: &str, id: &str, properties: &Properties) -> netweave_cloud::Result<Outputs> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().unwrap();
        state.log.push(format!("create {} {}", kind, id));

        if let Some(remaining) = state.flaky_creates.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                tracing::debug!("Injecting transient failure for {} '{}'", kind, id);
                return Err(BackendError::Timeout(format!(
                    "simulated timeout creating '{}'",
                    id
                )));
            }
        }
        if state.fail_creates.contains(id) {
            tracing::debug!("Injecting terminal failure for {} '{}'", kind, id);
            return Err(BackendError::ApiError(format!(
                "simulated API error creating '{}'",
                id
            )));
        }
        if state.resources.contains_key(id) {
            return Err(BackendError::ResourceAlreadyExists(id.to_string()));
        }

        let provider_ref = Self::next_ref(&mut state, kind);
        let sequence = state.sequence;

        let mut outputs = Outputs::from([("ref".to_string(), json!(provider_ref.clone()))]);
        match kind {
            "eip" => {
                outputs.insert("allocation_id".to_string(), json!(provider_ref.clone()));
                outputs.insert(
                    "public_ip".to_string(),
                    json!(format!("203.0.113.{}", sequence % 254 + 1)),
                );
            }
            "loadbalancer" => {
                outputs.insert(
                    "dns_name".to_string(),
                    json!(format!("{}-{:06x}.elb.sim.netweave.dev", id, sequence)),
                );
            }
            "instance" => {
                outputs.insert(
                    "private_ip".to_string(),
                    json!(format!("10.20.1.{}", sequence % 254 + 1)),
                );
            }
            _ => {}
        }

        tracing::info!("Created {} '{}' as {}", kind, id, provider_ref);
        state.resources.insert(
            id.to_string(),
            SimResource {
                id: id.to_string(),
                kind: kind.to_string(),
                provider_ref,
                properties: properties.clone(),
                outputs: outputs.clone(),
                created_at: Utc::now(),
            },
        );

        Ok(outputs)
    }

    async fn delete(&self, kind: &str, id: &str) -> netweave_cloud::Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().unwrap();
        state.log.push(format!("delete {} {}", kind, id));

        if state.fail_deletes.contains(id) {
            return Err(BackendError::ApiError(format!(
                "simulated API error deleting '{}'",
                id
            )));
        }
        if state.resources.remove(id).is_none() {
            return Err(BackendError::ResourceNotFound(id.to_string()));
        }

        tracing::info!("Deleted {} '{}'", kind, id);
        Ok(())
    }
}
