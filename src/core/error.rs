//! Structured planning errors.
//!
//! Every error is fatal to the planning pass: each one indicates an invalid
//! declaration set, not a transient condition, so nothing is retried and no
//! partial plan is ever returned.

use super::types::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Error raised while computing a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A declared reference names a node that is not in the set.
    #[error("node '{node}' references unknown node '{target}'")]
    DanglingReference { node: String, target: String },

    /// The ordering relations form a cycle; `members` are the ids on it.
    #[error("dependency cycle involving: {}", .members.join(", "))]
    CyclicDependency { members: Vec<String> },

    /// Two networks to be interconnected share address space.
    #[error("address spaces overlap: {a} and {b}")]
    OverlappingAddressSpace { a: String, b: String },

    /// A stage consumes an artifact no earlier stage produces.
    #[error("stage '{stage}' consumes artifact '{artifact}' that no prior stage produces")]
    BrokenArtifactChain { stage: String, artifact: String },

    /// The capability table has no entry for this principal/resource pair.
    #[error("no capability entry for {principal_kind} -> {resource_kind}")]
    UnknownCapability {
        principal_kind: ResourceKind,
        resource_kind: ResourceKind,
    },

    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("subnet {subnet} is outside network block {network}")]
    SubnetOutsideNetwork { subnet: String, network: String },

    #[error("subnets {a} and {b} overlap within one network")]
    OverlappingSubnets { a: String, b: String },

    #[error("{0}")]
    Validation(String),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}
