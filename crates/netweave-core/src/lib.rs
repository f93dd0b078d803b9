//! Netweave provisioning engine
//!
//! Netweave materializes a declared set of infrastructure resources — a
//! virtual network, gateways, routes, subnets, a load balancer, a compute
//! tier — in a safe order, against any [`netweave_cloud::Backend`].
//! Resources reference each other's outputs before those outputs exist;
//! the engine turns these references into a dependency graph, rejects
//! cycles and dangling references, and creates resources layer by layer
//! with maximal concurrency among independent ones.
//!
//! # Phases
//!
//! Declaration is pure and synchronous: build a [`ResourceGraph`] from
//! [`ResourceNode`]s, then [`ResourceGraph::finalize`] derives the edges
//! and freezes the graph. [`ResourceGraph::plan`] yields the layered
//! creation order without side effects, which makes dry runs and tests
//! possible without a real backend. [`Provisioner::apply`] is the only
//! effectful step.
//!
//! # Example
//!
//! ```
//! use netweave_core::{ResourceGraph, ResourceNode};
//!
//! let mut graph = ResourceGraph::new();
//! graph.add_node(ResourceNode::new("the-vpc", "network")
//!     .with_literal("cidr", "10.20.0.0/16"))?;
//! graph.add_node(ResourceNode::new("subnet-1", "subnet")
//!     .with_reference("vpc_id", "the-vpc", "ref")
//!     .with_literal("cidr", "10.20.1.0/24"))?;
//! graph.finalize()?;
//!
//! let plan = graph.plan()?;
//! assert_eq!(plan.layers().len(), 2);
//! # Ok::<(), netweave_core::GraphError>(())
//! ```

pub mod error;
pub mod graph;
pub mod node;
pub mod plan;
pub mod provisioner;
pub mod resolver;

// Re-exports
pub use error::{GraphError, Result};
pub use graph::ResourceGraph;
pub use node::{AttributeRef, NodeStatus, PropertyValue, ResourceNode};
pub use plan::{Plan, PlanSummary};
pub use provisioner::{
    ApplyOptions, ApplyOutcome, ApplyReport, NodeFailure, Provisioner, RollbackFailure,
};
