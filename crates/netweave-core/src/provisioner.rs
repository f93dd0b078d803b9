//! Ordered provisioning engine
//!
//! Drives a finalized [`ResourceGraph`] to completion against a [`Backend`]:
//! resources are created layer by layer, concurrently within a layer and
//! strictly sequentially across layers, so every create call only runs once
//! all of its dependencies have produced their outputs. On failure the
//! engine either rolls back every created resource in reverse layer order
//! or stops and returns the partial result, per [`ApplyOptions`].

use crate::error::{GraphError, Result};
use crate::graph::ResourceGraph;
use crate::node::NodeStatus;
use crate::resolver;
use futures_util::future::join_all;
use netweave_cloud::{Backend, BackendError, Outputs, Properties, RetryConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Options controlling a single apply run
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Cap on concurrent create calls within a layer (None = unbounded)
    pub max_concurrency: Option<usize>,

    /// Delete already-created resources when a node fails
    pub rollback_on_failure: bool,

    /// Retry policy for transient backend errors (None = single attempt)
    pub retry: Option<RetryConfig>,

    /// Cooperative cancellation: stops new layers and pending retries,
    /// in-flight calls are left to finish
    pub cancel: CancellationToken,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            rollback_on_failure: true,
            retry: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Terminal outcome of an apply run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Every resource was created
    Applied,
    /// A create failed (or the run was cancelled) and every created
    /// resource was deleted again
    RolledBack,
    /// Rollback was attempted but at least one compensating delete failed;
    /// real infrastructure may be orphaned
    RollbackFailed,
    /// The run stopped early with rollback disabled; created resources
    /// remain
    Partial,
}

/// A node whose create call failed terminally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node_id: String,
    pub kind: String,
    pub error: String,
    pub attempts: u32,
}

/// A compensating delete that failed during rollback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackFailure {
    pub node_id: String,
    pub error: String,
}

/// Structured result of an apply run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub outcome: ApplyOutcome,

    /// Ids that reached `Created` during the run, in creation order
    /// (rollback may have deleted them again; see node statuses)
    pub created: Vec<String>,

    /// Terminal create failures, each naming the responsible node
    pub failures: Vec<NodeFailure>,

    /// Compensating deletes that failed; never silently dropped
    pub rollback_failures: Vec<RollbackFailure>,

    /// Whether the run was cut short by cancellation
    pub cancelled: bool,

    pub duration_ms: u64,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.outcome == ApplyOutcome::Applied
    }
}

/// Drives a finalized resource graph through a backend
pub struct Provisioner {
    options: ApplyOptions,
}

impl Provisioner {
    pub fn new(options: ApplyOptions) -> Self {
        Self { options }
    }

    pub fn with_defaults() -> Self {
        Self::new(ApplyOptions::default())
    }

    /// Applies the graph: creates every resource in dependency order,
    /// concurrently within each layer.
    ///
    /// All node status and output mutation happens here; the graph is
    /// returned fully `Created`, rolled back, or partially applied
    /// according to the options and the report's outcome.
    pub async fn apply(
        &self,
        graph: &mut ResourceGraph,
        backend: &dyn Backend,
    ) -> Result<ApplyReport> {
        let plan = graph.plan()?;
        let start = Instant::now();
        tracing::info!(
            "Applying {} via backend '{}'",
            plan.summary(),
            backend.name()
        );

        let mut created: Vec<String> = Vec::new();
        let mut created_layers: Vec<Vec<String>> = Vec::new();
        let mut failures: Vec<NodeFailure> = Vec::new();
        let mut cancelled = false;

        for (layer_index, layer) in plan.layers().iter().enumerate() {
            if self.options.cancel.is_cancelled() {
                tracing::warn!("Apply cancelled before layer {}", layer_index);
                cancelled = true;
                break;
            }

            // Dependencies of every node in this layer are Created, so
            // resolution failing here is an engine bug, not a user error.
            let mut work = Vec::with_capacity(layer.len());
            for id in layer {
                graph.set_status(id, NodeStatus::Ready);
                let node = graph.get(id)?;
                let properties = resolver::resolve(node, graph).map_err(|e| {
                    GraphError::InvariantViolation(format!(
                        "resolution failed for scheduled resource '{}': {}",
                        id, e
                    ))
                })?;
                work.push((id.clone(), node.kind.clone(), properties));
            }

            for (id, _, _) in &work {
                graph.set_status(id, NodeStatus::Creating);
            }

            tracing::debug!("Dispatching layer {} ({} resources)", layer_index, work.len());
            let semaphore = self
                .options
                .max_concurrency
                .map(|n| Arc::new(Semaphore::new(n.max(1))));

            let futures = work.into_iter().map(|(id, kind, properties)| {
                let semaphore = semaphore.clone();
                let retry = self.options.retry.clone();
                let cancel = self.options.cancel.clone();
                async move {
                    let _permit = match semaphore.as_ref() {
                        // Never closed during apply, so acquire cannot fail
                        Some(s) => Some(s.acquire().await.expect("apply semaphore closed")),
                        None => None,
                    };
                    let result =
                        create_with_retry(backend, &kind, &id, &properties, retry.as_ref(), &cancel)
                            .await;
                    (id, kind, result)
                }
            });
            let results = join_all(futures).await;

            // Fold results back into the graph on this task; workers never
            // touch shared node state.
            let mut layer_created: Vec<String> = Vec::new();
            let mut layer_failed = false;
            for (id, kind, result) in results {
                match result {
                    Ok(outputs) => {
                        tracing::debug!("Created {} '{}'", kind, id);
                        graph.record_outputs(&id, outputs);
                        created.push(id.clone());
                        layer_created.push(id);
                    }
                    Err((error, attempts)) => {
                        tracing::error!(
                            "Create of {} '{}' failed after {} attempt(s): {}",
                            kind,
                            id,
                            attempts,
                            error
                        );
                        graph.set_status(&id, NodeStatus::Failed);
                        failures.push(NodeFailure {
                            node_id: id,
                            kind,
                            error: error.to_string(),
                            attempts,
                        });
                        layer_failed = true;
                    }
                }
            }
            created_layers.push(layer_created);

            if layer_failed {
                break;
            }
        }

        if self.options.cancel.is_cancelled() && created.len() < plan.node_count() {
            cancelled = true;
        }

        let mut rollback_failures: Vec<RollbackFailure> = Vec::new();
        let outcome = if failures.is_empty() && !cancelled {
            ApplyOutcome::Applied
        } else if self.options.rollback_on_failure {
            rollback(graph, backend, &created_layers, &mut rollback_failures).await;
            if rollback_failures.is_empty() {
                ApplyOutcome::RolledBack
            } else {
                ApplyOutcome::RollbackFailed
            }
        } else {
            ApplyOutcome::Partial
        };

        let report = ApplyReport {
            outcome,
            created,
            failures,
            rollback_failures,
            cancelled,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Apply finished: {:?} ({} created, {} failed) in {}ms",
            report.outcome,
            report.created.len(),
            report.failures.len(),
            report.duration_ms
        );
        Ok(report)
    }
}

impl ResourceGraph {
    /// Convenience entry point: applies this graph with a one-off
    /// [`Provisioner`] built from the given options.
    pub async fn apply(
        &mut self,
        backend: &dyn Backend,
        options: ApplyOptions,
    ) -> Result<ApplyReport> {
        Provisioner::new(options).apply(self, backend).await
    }
}

/// Deletes every created resource in reverse dependency order: later layers
/// before earlier ones, sequentially. Failed deletes leave the node
/// `Created` (the resource still exists) and are recorded on the report.
async fn rollback(
    graph: &mut ResourceGraph,
    backend: &dyn Backend,
    created_layers: &[Vec<String>],
    rollback_failures: &mut Vec<RollbackFailure>,
) {
    for layer in created_layers.iter().rev() {
        for id in layer.iter().rev() {
            let kind = match graph.node(id) {
                Some(node) => node.kind.clone(),
                None => continue,
            };
            match backend.delete(&kind, id).await {
                Ok(()) => {
                    tracing::info!("Rolled back {} '{}'", kind, id);
                    graph.set_status(id, NodeStatus::RolledBack);
                }
                Err(error) => {
                    tracing::error!("Rollback of {} '{}' failed: {}", kind, id, error);
                    rollback_failures.push(RollbackFailure {
                        node_id: id.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }
    }
}

/// Issues one create call with bounded retries for transient errors.
/// Returns the outputs, or the final error together with the number of
/// attempts made. Cancellation skips pending retries; the in-flight call
/// itself is left to finish.
async fn create_with_retry(
    backend: &dyn Backend,
    kind: &str,
    id: &str,
    properties: &Properties,
    retry: Option<&RetryConfig>,
    cancel: &CancellationToken,
) -> std::result::Result<Outputs, (BackendError, u32)> {
    let max_attempts = retry.map(|r| r.max_attempts.max(1)).unwrap_or(1);
    let mut attempt = 1u32;

    loop {
        match backend.create(kind, id, properties).await {
            Ok(outputs) => return Ok(outputs),
            Err(error) => {
                if !error.is_retryable() || attempt >= max_attempts {
                    return Err((error, attempt));
                }
                // retry is Some here, otherwise max_attempts would be 1
                let delay = retry
                    .map(|r| r.delay_for_attempt(attempt))
                    .unwrap_or_default();
                tracing::debug!(
                    "Create of {} '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                    kind,
                    id,
                    attempt,
                    max_attempts,
                    error,
                    delay
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err((error, attempt)),
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ResourceNode;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockBackend {
        log: Mutex<Vec<String>>,
        seen: Mutex<HashMap<String, Properties>>,
        create_counts: Mutex<HashMap<String, u32>>,
        fail_terminal: HashSet<String>,
        fail_transient: Mutex<HashMap<String, u32>>,
        fail_deletes: HashSet<String>,
        latency: Option<Duration>,
        concurrency: Mutex<(usize, usize)>,
        cancel_during: Option<(String, CancellationToken)>,
    }

    impl MockBackend {
        fn created_order(&self) -> Vec<String> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| e.strip_prefix("create:").map(str::to_string))
                .collect()
        }

        fn deleted_order(&self) -> Vec<String> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| e.strip_prefix("delete:").map(str::to_string))
                .collect()
        }

        fn create_count(&self, id: &str) -> u32 {
            self.create_counts
                .lock()
                .unwrap()
                .get(id)
                .copied()
                .unwrap_or(0)
        }

        fn max_concurrency(&self) -> usize {
            self.concurrency.lock().unwrap().1
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        async fn create(&self, _kind: &str, id: &str, properties: &Properties) -> netweave_cloud::Result<Outputs> {
            self.log.lock().unwrap().push(format!("create:{}", id));
            *self
                .create_counts
                .lock()
                .unwrap()
                .entry(id.to_string())
                .or_insert(0) += 1;
            self.seen
                .lock()
                .unwrap()
                .insert(id.to_string(), properties.clone());

            {
                let mut c = self.concurrency.lock().unwrap();
                c.0 += 1;
                c.1 = c.1.max(c.0);
            }
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.concurrency.lock().unwrap().0 -= 1;

            if let Some((target, token)) = &self.cancel_during {
                if target == id {
                    token.cancel();
                }
            }

            {
                let mut transient = self.fail_transient.lock().unwrap();
                if let Some(remaining) = transient.get_mut(id) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(BackendError::Timeout(format!("injected timeout for {}", id)));
                    }
                }
            }
            if self.fail_terminal.contains(id) {
                return Err(BackendError::ApiError(format!("injected failure for {}", id)));
            }

            Ok(Outputs::from([(
                "ref".to_string(),
                json!(format!("{}-ref", id)),
            )]))
        }

        async fn delete(&self, _kind: &str, id: &str) -> netweave_cloud::Result<()> {
            self.log.lock().unwrap().push(format!("delete:{}", id));
            if self.fail_deletes.contains(id) {
                return Err(BackendError::ApiError(format!(
                    "injected delete failure for {}",
                    id
                )));
            }
            Ok(())
        }
    }

    fn chain_graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph.add_node(ResourceNode::new("a", "network")).unwrap();
        graph
            .add_node(ResourceNode::new("b", "subnet").with_reference("upstream", "a", "ref"))
            .unwrap();
        graph
            .add_node(ResourceNode::new("c", "route").with_reference("upstream", "b", "ref"))
            .unwrap();
        graph.finalize().unwrap();
        graph
    }

    #[tokio::test]
    async fn test_linear_chain_creates_in_order_and_flows_outputs() {
        let mut graph = chain_graph();
        let backend = MockBackend::default();

        let report = Provisioner::with_defaults()
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Applied);
        assert!(report.is_success());
        assert_eq!(backend.created_order(), vec!["a", "b", "c"]);
        for id in ["a", "b", "c"] {
            assert_eq!(graph.node(id).unwrap().status, NodeStatus::Created);
        }
        // c's resolved property equals b's returned output
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen["c"].get("upstream"), Some(&json!("b-ref")));
        assert_eq!(seen["b"].get("upstream"), Some(&json!("a-ref")));
    }

    #[tokio::test]
    async fn test_independent_nodes_both_created() {
        let mut graph = ResourceGraph::new();
        graph.add_node(ResourceNode::new("x", "eip")).unwrap();
        graph.add_node(ResourceNode::new("y", "keypair")).unwrap();
        graph.finalize().unwrap();
        let backend = MockBackend::default();

        let report = graph
            .apply(&backend, ApplyOptions::default())
            .await
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Applied);
        assert_eq!(graph.node("x").unwrap().status, NodeStatus::Created);
        assert_eq!(graph.node("y").unwrap().status, NodeStatus::Created);
        assert_eq!(graph.node("x").unwrap().output("ref"), Some(&json!("x-ref")));
        assert_eq!(backend.create_count("x"), 1);
        assert_eq!(backend.create_count("y"), 1);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_in_reverse_order() {
        let mut graph = ResourceGraph::new();
        graph.add_node(ResourceNode::new("root", "network")).unwrap();
        graph
            .add_node(ResourceNode::new("left", "subnet").with_reference("vpc", "root", "ref"))
            .unwrap();
        graph
            .add_node(ResourceNode::new("right", "subnet").with_reference("vpc", "root", "ref"))
            .unwrap();
        graph
            .add_node(
                ResourceNode::new("join", "loadbalancer")
                    .with_reference("a", "left", "ref")
                    .with_reference("b", "right", "ref"),
            )
            .unwrap();
        graph.finalize().unwrap();

        let backend = MockBackend {
            fail_terminal: HashSet::from(["join".to_string()]),
            ..Default::default()
        };

        let report = Provisioner::with_defaults()
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::RolledBack);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].node_id, "join");
        assert!(report.failures[0].error.contains("injected failure"));

        // Later layers first, declaration order reversed within a layer
        assert_eq!(backend.deleted_order(), vec!["right", "left", "root"]);
        assert_eq!(graph.node("join").unwrap().status, NodeStatus::Failed);
        for id in ["root", "left", "right"] {
            assert_eq!(graph.node(id).unwrap().status, NodeStatus::RolledBack);
        }
    }

    #[tokio::test]
    async fn test_rollback_disabled_returns_partial() {
        let mut graph = chain_graph();
        let backend = MockBackend {
            fail_terminal: HashSet::from(["b".to_string()]),
            ..Default::default()
        };

        let options = ApplyOptions {
            rollback_on_failure: false,
            ..Default::default()
        };
        let report = Provisioner::new(options)
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Partial);
        assert!(backend.deleted_order().is_empty());
        assert_eq!(graph.node("a").unwrap().status, NodeStatus::Created);
        assert_eq!(graph.node("b").unwrap().status, NodeStatus::Failed);
        // Never dispatched
        assert_eq!(graph.node("c").unwrap().status, NodeStatus::Pending);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mut graph = chain_graph();
        let backend = MockBackend {
            fail_transient: Mutex::new(HashMap::from([("b".to_string(), 2)])),
            ..Default::default()
        };

        let options = ApplyOptions {
            retry: Some(RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 2.0,
            }),
            ..Default::default()
        };
        let report = Provisioner::new(options)
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Applied);
        assert_eq!(backend.create_count("b"), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_reports_attempts() {
        let mut graph = chain_graph();
        let backend = MockBackend {
            fail_transient: Mutex::new(HashMap::from([("b".to_string(), u32::MAX)])),
            ..Default::default()
        };

        let options = ApplyOptions {
            retry: Some(RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                backoff_multiplier: 2.0,
            }),
            ..Default::default()
        };
        let report = Provisioner::new(options)
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::RolledBack);
        assert_eq!(report.failures[0].node_id, "b");
        assert_eq!(report.failures[0].attempts, 2);
        assert_eq!(backend.create_count("b"), 2);
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let mut graph = chain_graph();
        let backend = MockBackend {
            fail_terminal: HashSet::from(["a".to_string()]),
            ..Default::default()
        };

        let options = ApplyOptions {
            retry: Some(RetryConfig::default()),
            ..Default::default()
        };
        let report = Provisioner::new(options)
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        assert_eq!(backend.create_count("a"), 1);
        assert_eq!(report.failures[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_rollback_failure_is_surfaced() {
        let mut graph = chain_graph();
        let backend = MockBackend {
            fail_terminal: HashSet::from(["c".to_string()]),
            fail_deletes: HashSet::from(["a".to_string()]),
            ..Default::default()
        };

        let report = Provisioner::with_defaults()
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::RollbackFailed);
        assert_eq!(report.rollback_failures.len(), 1);
        assert_eq!(report.rollback_failures[0].node_id, "a");
        assert_eq!(graph.node("b").unwrap().status, NodeStatus::RolledBack);
        // The failed delete leaves the resource in place
        assert_eq!(graph.node("a").unwrap().status, NodeStatus::Created);
    }

    #[tokio::test]
    async fn test_max_concurrency_bounds_inflight_creates() {
        let mut graph = ResourceGraph::new();
        for id in ["s1", "s2", "s3", "s4"] {
            graph.add_node(ResourceNode::new(id, "subnet")).unwrap();
        }
        graph.finalize().unwrap();

        let backend = MockBackend {
            latency: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let options = ApplyOptions {
            max_concurrency: Some(2),
            ..Default::default()
        };
        let report = Provisioner::new(options)
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Applied);
        assert!(backend.max_concurrency() <= 2);
    }

    #[tokio::test]
    async fn test_layer_runs_concurrently() {
        let mut graph = ResourceGraph::new();
        for id in ["s1", "s2", "s3"] {
            graph.add_node(ResourceNode::new(id, "subnet")).unwrap();
        }
        graph.finalize().unwrap();

        let backend = MockBackend {
            latency: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let start = Instant::now();
        Provisioner::with_defaults()
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        // Three 100ms creates in one layer should overlap; sequential
        // execution would take 300ms
        assert!(start.elapsed() < Duration::from_millis(250));
        assert_eq!(backend.max_concurrency(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_later_layers_and_rolls_back() {
        let mut graph = chain_graph();
        let token = CancellationToken::new();
        let backend = MockBackend {
            cancel_during: Some(("a".to_string(), token.clone())),
            ..Default::default()
        };

        let options = ApplyOptions {
            cancel: token,
            ..Default::default()
        };
        let report = Provisioner::new(options)
            .apply(&mut graph, &backend)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.outcome, ApplyOutcome::RolledBack);
        // Layer 0 finished, nothing after it was dispatched
        assert_eq!(backend.created_order(), vec!["a"]);
        assert_eq!(backend.deleted_order(), vec!["a"]);
        assert_eq!(graph.node("b").unwrap().status, NodeStatus::Pending);
    }

    #[tokio::test]
    async fn test_apply_requires_finalized_graph() {
        let mut graph = ResourceGraph::new();
        graph.add_node(ResourceNode::new("a", "network")).unwrap();
        let backend = MockBackend::default();

        let result = Provisioner::with_defaults().apply(&mut graph, &backend).await;
        assert!(matches!(result, Err(GraphError::NotFinalized)));
    }
}
