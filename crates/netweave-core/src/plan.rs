//! Layered creation plan
//!
//! A [`Plan`] partitions the graph's node ids into ordered layers: every
//! resource in layer k depends only on resources in layers `0..k`, so all
//! resources within one layer can be created concurrently.

use serde::{Deserialize, Serialize};

/// Ordered layers of mutually independent resource ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    layers: Vec<Vec<String>>,
}

impl Plan {
    pub(crate) fn new(layers: Vec<Vec<String>>) -> Self {
        Self { layers }
    }

    /// The layers, outermost first
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Total number of resources across all layers
    pub fn node_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Index of the layer containing the given id
    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|n| n == id))
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            resources: self.node_count(),
            layers: self.len(),
            max_width: self.layers.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

/// Summary of a plan's shape
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub resources: usize,
    pub layers: usize,
    pub max_width: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} resources in {} layers (up to {} in parallel)",
            self.resources, self.layers, self.max_width
        )
    }
}
