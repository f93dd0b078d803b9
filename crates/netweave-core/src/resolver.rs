//! Output resolution
//!
//! Substitutes the attribute references in a node's declared properties with
//! the concrete outputs of the referenced resources. Resolution reads graph
//! state but never mutates it, and fails fast on the first reference whose
//! target is not yet created or does not expose the requested output.

use crate::error::{GraphError, Result};
use crate::graph::ResourceGraph;
use crate::node::{NodeStatus, PropertyValue, ResourceNode};
use netweave_cloud::Properties;

/// Materializes a fully-literal property map for one node.
pub fn resolve(node: &ResourceNode, graph: &ResourceGraph) -> Result<Properties> {
    let mut resolved = Properties::new();

    for (name, value) in &node.properties {
        match value {
            PropertyValue::Literal(literal) => {
                resolved.insert(name.clone(), literal.clone());
            }
            PropertyValue::Reference(reference) => {
                let target = graph.get(&reference.target)?;
                if target.status != NodeStatus::Created {
                    return Err(GraphError::UnresolvedDependency {
                        target: reference.target.clone(),
                        output: reference.output.clone(),
                    });
                }
                let output = target.output(&reference.output).ok_or_else(|| {
                    GraphError::MissingOutput {
                        target: reference.target.clone(),
                        output: reference.output.clone(),
                    }
                })?;
                resolved.insert(name.clone(), output.clone());
            }
        }
    }

    Ok(resolved)
}
