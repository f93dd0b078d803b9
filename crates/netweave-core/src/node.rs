//! Resource node model
//!
//! A [`ResourceNode`] is one declared unit of infrastructure: a kind tag,
//! desired properties, a lifecycle status, and the outputs the backend
//! reported once the resource exists. Properties may embed
//! [`AttributeRef`]s — placeholders for values only known after another
//! resource has been created — which is what induces the dependency edges
//! of the graph.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reference to an output of another resource, resolvable once that
/// resource has been created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRef {
    /// Id of the node that produces the output
    pub target: String,

    /// Name of the output to read
    pub output: String,
}

impl AttributeRef {
    pub fn new(target: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            output: output.into(),
        }
    }
}

impl std::fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${{{}.{}}}", self.target, self.output)
    }
}

/// A declared property value: either a concrete literal or a reference to
/// another resource's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Literal(serde_json::Value),
    Reference(AttributeRef),
}

impl PropertyValue {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        PropertyValue::Literal(value.into())
    }

    pub fn reference(target: impl Into<String>, output: impl Into<String>) -> Self {
        PropertyValue::Reference(AttributeRef::new(target, output))
    }

    /// Returns the embedded reference, if this value is one
    pub fn as_reference(&self) -> Option<&AttributeRef> {
        match self {
            PropertyValue::Reference(r) => Some(r),
            PropertyValue::Literal(_) => None,
        }
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        PropertyValue::Literal(value)
    }
}

/// Lifecycle status of a resource node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Declared, dependencies not yet satisfied
    Pending,
    /// All dependencies created, eligible for dispatch
    Ready,
    /// Create call in flight
    Creating,
    /// Create succeeded, outputs available
    Created,
    /// Create failed after exhausting retries
    Failed,
    /// Deleted again while compensating for a failure
    RolledBack,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Pending => write!(f, "pending"),
            NodeStatus::Ready => write!(f, "ready"),
            NodeStatus::Creating => write!(f, "creating"),
            NodeStatus::Created => write!(f, "created"),
            NodeStatus::Failed => write!(f, "failed"),
            NodeStatus::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// One declared resource in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Unique stable identifier, assigned by the declarer
    pub id: String,

    /// Resource type tag (e.g., "network", "subnet", "loadbalancer")
    pub kind: String,

    /// Desired properties; may contain attribute references
    pub properties: HashMap<String, PropertyValue>,

    /// Current lifecycle status
    pub status: NodeStatus,

    /// Outputs reported by the backend, populated after a successful create
    pub outputs: HashMap<String, serde_json::Value>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            properties: HashMap::new(),
            status: NodeStatus::Pending,
            outputs: HashMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Declare a literal property
    pub fn with_literal(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties
            .insert(name.into(), PropertyValue::Literal(value.into()));
        self
    }

    /// Declare a property referencing another resource's output
    pub fn with_reference(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.properties
            .insert(name.into(), PropertyValue::reference(target, output));
        self
    }

    /// Iterates over every attribute reference embedded in the properties
    pub fn references(&self) -> impl Iterator<Item = &AttributeRef> {
        self.properties.values().filter_map(|v| v.as_reference())
    }

    /// Returns an output value by name, if the resource has been created
    pub fn output(&self, name: &str) -> Option<&serde_json::Value> {
        self.outputs.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_references() {
        let node = ResourceNode::new("route", "route")
            .with_literal("destination", "0.0.0.0/0")
            .with_reference("route_table_id", "public-rt", "ref")
            .with_reference("gateway_id", "igw", "ref");

        let mut targets: Vec<&str> = node.references().map(|r| r.target.as_str()).collect();
        targets.sort();
        assert_eq!(targets, vec!["igw", "public-rt"]);
        assert_eq!(node.status, NodeStatus::Pending);
    }

    #[test]
    fn test_literal_passes_through_json_types() {
        let node = ResourceNode::new("asg", "autoscaling-group")
            .with_literal("min_capacity", 2)
            .with_literal("max_capacity", 4);

        assert_eq!(node.references().count(), 0);
        assert_eq!(
            node.properties.get("min_capacity"),
            Some(&PropertyValue::Literal(serde_json::json!(2)))
        );
    }
}
