//! Provisioning engine error types

use thiserror::Error;

/// Errors raised while constructing, planning, or applying a resource graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate resource id: {0}")]
    DuplicateId(String),

    #[error("Resource '{node}' references unknown resource '{target}'")]
    DanglingReference { node: String, target: String },

    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error("Graph has not been finalized; call finalize() before planning")]
    NotFinalized,

    #[error("Graph is already finalized; no further resources can be declared")]
    AlreadyFinalized,

    #[error("Unknown resource: {0}")]
    UnknownNode(String),

    #[error("Output '{output}' of resource '{target}' is not available yet")]
    UnresolvedDependency { target: String, output: String },

    #[error("Resource '{target}' exposes no output named '{output}'")]
    MissingOutput { target: String, output: String },

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
