//! Least-privilege grant derivation.
//!
//! Every Grants edge maps through a static capability table keyed by
//! (principal kind, resource kind). A principal only ever receives the
//! actions implied by an edge that exists in the graph — never a wildcard
//! — and multiple edges for the same (principal, resource) pair union
//! into a single grant. The table is versioned; changing it is a
//! configuration change, not a runtime decision.

use super::error::PlanError;
use super::graph::Graph;
use super::types::*;
use std::collections::{BTreeMap, BTreeSet};

/// Capability table revision shipped with this build.
pub const CAPABILITY_TABLE_VERSION: &str = "2026-07";

/// Minimal action set a principal of `principal` kind needs on a resource
/// of `resource` kind. `None` means no entry — an invalid pairing.
pub fn capabilities(
    principal: ResourceKind,
    resource: ResourceKind,
) -> Option<&'static [&'static str]> {
    use ResourceKind::*;
    match (principal, resource) {
        // Image push path only — no delete, no pull-through config
        (Role, ImageRegistry) => Some(&[
            "registry:InitiateLayerUpload",
            "registry:UploadLayerPart",
            "registry:CompleteLayerUpload",
            "registry:PutImage",
        ]),
        (Role, BuildProject) => Some(&["build:StartBuild", "build:BatchGetBuilds"]),
        // Managed administrative session channel
        (Role, ServiceEndpoint) => Some(&["endpoint:OpenSession", "endpoint:SendMessage"]),
        (Role, Network) => Some(&["network:DescribeTopology"]),
        _ => None,
    }
}

/// Derive the deduplicated grant set from every Grants edge in the graph.
/// Deterministic: output is sorted by (principal, resource), action sets
/// are sorted, and re-running on the same graph is byte-identical.
pub fn derive_grants(graph: &Graph) -> Result<Vec<Grant>, PlanError> {
    let mut merged: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();

    for edge in graph
        .edges
        .iter()
        .filter(|e| e.relation == Relation::Grants)
    {
        let principal = graph
            .nodes
            .get(&edge.from)
            .ok_or_else(|| PlanError::DanglingReference {
                node: edge.to.clone(),
                target: edge.from.clone(),
            })?;
        let resource = graph
            .nodes
            .get(&edge.to)
            .ok_or_else(|| PlanError::DanglingReference {
                node: edge.from.clone(),
                target: edge.to.clone(),
            })?;

        let actions = capabilities(principal.kind, resource.kind).ok_or(
            PlanError::UnknownCapability {
                principal_kind: principal.kind,
                resource_kind: resource.kind,
            },
        )?;

        merged
            .entry((edge.from.clone(), edge.to.clone()))
            .or_default()
            .extend(actions.iter().map(|s| (*s).to_string()));
    }

    Ok(merged
        .into_iter()
        .map(|((principal, resource), actions)| Grant {
            principal,
            resource,
            actions,
        })
        .collect())
}
