//! Dependency graph over declared resources
//!
//! The graph owns every [`ResourceNode`] and derives its edges from the
//! attribute references embedded in node properties: an edge `A -> B` exists
//! iff some property of A references an output of B. Callers never mutate
//! edges directly; `finalize()` recomputes them, rejects dangling references
//! and cycles, and freezes the node set. Planning peels the finalized graph
//! into layers of mutually independent resources (Kahn's algorithm), using
//! declaration order as the tie-break so identical graphs always produce
//! identical plans.

use crate::error::{GraphError, Result};
use crate::node::{NodeStatus, ResourceNode};
use crate::plan::Plan;
use netweave_cloud::Outputs;
use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A set of declared resources and the dependency edges implied by their
/// attribute references
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
    /// Map from id to node
    nodes: HashMap<String, ResourceNode>,

    /// Declaration order, used for deterministic scheduling tie-breaks
    insertion_order: Vec<String>,

    /// Derived edges: node id -> ids it depends on
    dependencies: HashMap<String, Vec<String>>,

    /// Derived reverse edges: node id -> ids depending on it
    dependents: HashMap<String, Vec<String>>,

    finalized: bool,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of declared resources
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Declares a resource.
    ///
    /// Fails with [`GraphError::DuplicateId`] if the id is already taken and
    /// with [`GraphError::AlreadyFinalized`] once the graph is frozen.
    pub fn add_node(&mut self, node: ResourceNode) -> Result<()> {
        if self.finalized {
            return Err(GraphError::AlreadyFinalized);
        }
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateId(node.id));
        }

        self.insertion_order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Returns a node by id
    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Returns a node by id, failing with [`GraphError::UnknownNode`]
    pub fn get(&self, id: &str) -> Result<&ResourceNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    /// Iterates over all nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
    }

    /// All node ids in declaration order
    pub fn node_ids(&self) -> &[String] {
        &self.insertion_order
    }

    /// Ids this node depends on (empty before `finalize()`)
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.dependencies.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids depending on this node (empty before `finalize()`)
    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Derives the edge relation from attribute references and freezes the
    /// graph.
    ///
    /// Fails with [`GraphError::DanglingReference`] if any reference targets
    /// an undeclared id, and with [`GraphError::CycleDetected`] (reporting
    /// the offending cycle as an ordered id sequence) if the relation is not
    /// acyclic. Calling `finalize()` again on a finalized graph is a no-op.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }

        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

        for id in &self.insertion_order {
            let node = &self.nodes[id];
            let mut deps: Vec<String> = Vec::new();
            for reference in node.references() {
                if !self.nodes.contains_key(&reference.target) {
                    return Err(GraphError::DanglingReference {
                        node: id.clone(),
                        target: reference.target.clone(),
                    });
                }
                // Two references to the same target collapse into one edge
                if !deps.contains(&reference.target) {
                    deps.push(reference.target.clone());
                }
            }
            for dep in &deps {
                dependents.entry(dep.clone()).or_default().push(id.clone());
            }
            dependencies.insert(id.clone(), deps);
        }

        if let Some(cycle) = self.find_cycle(&dependencies) {
            return Err(GraphError::CycleDetected { cycle });
        }

        self.dependencies = dependencies;
        self.dependents = dependents;
        self.finalized = true;
        tracing::debug!(
            "Finalized graph with {} resources and {} edges",
            self.nodes.len(),
            self.dependencies.values().map(Vec::len).sum::<usize>()
        );
        Ok(())
    }

    /// Searches the dependency relation for a cycle, returning its node ids
    /// in dependency order
    fn find_cycle(&self, dependencies: &HashMap<String, Vec<String>>) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();

        for id in &self.insertion_order {
            if visited.contains(id.as_str()) {
                continue;
            }
            if let Some(cycle) =
                Self::dfs_cycle(id, dependencies, &mut visited, &mut stack, &mut on_stack)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        node: &str,
        dependencies: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
        on_stack: &mut HashSet<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        stack.push(node.to_string());
        on_stack.insert(node.to_string());

        if let Some(deps) = dependencies.get(node) {
            for dep in deps {
                if on_stack.contains(dep) {
                    // Back edge: the cycle is the stack suffix starting at dep
                    let start = stack.iter().position(|n| n == dep).unwrap_or(0);
                    return Some(stack[start..].to_vec());
                }
                if !visited.contains(dep) {
                    if let Some(cycle) =
                        Self::dfs_cycle(dep, dependencies, visited, stack, on_stack)
                    {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        on_stack.remove(node);
        None
    }

    /// Peels the finalized graph into layers of independent resources.
    ///
    /// Layer k contains every node whose dependencies all lie in layers
    /// `0..k`; intra-layer order is declaration order. The result is a
    /// partition of the node set and is identical across repeated calls.
    pub fn plan(&self) -> Result<Plan> {
        if !self.finalized {
            return Err(GraphError::NotFinalized);
        }

        let mut placed: HashSet<String> = HashSet::new();
        let mut layers: Vec<Vec<String>> = Vec::new();

        while placed.len() < self.nodes.len() {
            let layer: Vec<String> = self
                .insertion_order
                .iter()
                .filter(|id| !placed.contains(id.as_str()))
                .filter(|id| {
                    self.dependencies_of(id)
                        .iter()
                        .all(|dep| placed.contains(dep.as_str()))
                })
                .cloned()
                .collect();

            if layer.is_empty() {
                // finalize() rejected cycles, so an empty layer here means
                // the edge relation was corrupted after the fact
                return Err(GraphError::InvariantViolation(
                    "no resource is ready but the graph is not exhausted".to_string(),
                ));
            }

            for id in &layer {
                placed.insert(id.clone());
            }
            layers.push(layer);
        }

        Ok(Plan::new(layers))
    }

    /// Renders the dependency graph in Graphviz DOT format, edges pointing
    /// from a dependency to its dependents (creation order)
    pub fn to_dot(&self) -> String {
        let mut graph = DiGraph::<String, ()>::new();
        let mut indices = HashMap::new();

        for id in &self.insertion_order {
            let node = &self.nodes[id];
            let index = graph.add_node(format!("{} ({})", id, node.kind));
            indices.insert(id.clone(), index);
        }

        for id in &self.insertion_order {
            let node = &self.nodes[id];
            for reference in node.references() {
                if let (Some(&from), Some(&to)) = (indices.get(&reference.target), indices.get(id)) {
                    if !graph.contains_edge(from, to) {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }

        format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }

    pub(crate) fn set_status(&mut self, id: &str, status: NodeStatus) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.status = status;
        }
    }

    /// Stores backend outputs and marks the node created. Called exactly
    /// once per node, by the provisioner.
    pub(crate) fn record_outputs(&mut self, id: &str, outputs: Outputs) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.outputs = outputs;
            node.status = NodeStatus::Created;
        }
    }
}
