//! Plan assembly — the ordered action list for the provisioning engine.
//!
//! Node actions follow the dependency order. Grants, routes, endpoint
//! placements, and artifact bindings are inserted immediately after the
//! last node they reference is emitted, so the engine never sees an
//! action whose endpoints do not yet exist. The serialized list is
//! fingerprinted with BLAKE3 so callers can detect plan changes cheaply.

use super::error::PlanError;
use super::graph::Graph;
use super::types::*;
use std::collections::{BTreeSet, HashSet};

/// Everything the emitter combines into one plan.
pub struct EmitInputs<'a> {
    pub name: &'a str,
    pub order: &'a [String],
    pub graph: &'a Graph,
    pub grants: Vec<Grant>,
    pub routes: Vec<RoutePlanEntry>,
    pub endpoints: Vec<EndpointPlacement>,
    pub bindings: Vec<ArtifactBinding>,
    /// Node ids the engine already created; these emit as `update`
    pub provisioned: &'a BTreeSet<String>,
}

/// Hash a byte slice. Returns `"blake3:{hex}"`.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(bytes).to_hex())
}

/// Assemble the ordered action list.
pub fn emit(inputs: EmitInputs<'_>) -> Result<Plan, PlanError> {
    // Each derived artifact waits on the node ids it references
    let mut pending: Vec<Option<(Vec<String>, PlanItem)>> = Vec::new();
    for grant in inputs.grants {
        let needs = vec![grant.principal.clone(), grant.resource.clone()];
        pending.push(Some((needs, PlanItem::Grant(grant))));
    }
    for route in inputs.routes {
        let mut needs = vec![route.network.clone()];
        if let NextHop::TransitAttachment(att) = &route.next_hop {
            needs.push(att.clone());
        }
        pending.push(Some((needs, PlanItem::Route(route))));
    }
    for endpoint in inputs.endpoints {
        let needs = vec![endpoint.network.clone()];
        pending.push(Some((needs, PlanItem::Endpoint(endpoint))));
    }
    for binding in inputs.bindings {
        let needs = vec![binding.from_stage.clone(), binding.to_stage.clone()];
        pending.push(Some((needs, PlanItem::Artifact(binding))));
    }

    let mut actions: Vec<PlannedAction> = Vec::new();
    let mut emitted: HashSet<&str> = HashSet::with_capacity(inputs.order.len());
    let mut to_create = 0u32;
    let mut to_update = 0u32;

    for id in inputs.order {
        let node = inputs.graph.nodes.get(id).ok_or_else(|| {
            PlanError::Validation(format!("creation order names unknown node '{id}'"))
        })?;

        let op = if inputs.provisioned.contains(id) {
            to_update += 1;
            PlanOp::Update
        } else {
            to_create += 1;
            PlanOp::Create
        };
        actions.push(PlannedAction {
            op,
            item: PlanItem::Node(node.clone()),
        });
        emitted.insert(id.as_str());

        for slot in pending.iter_mut() {
            let ready = slot
                .as_ref()
                .is_some_and(|(needs, _)| needs.iter().all(|n| emitted.contains(n.as_str())));
            if ready {
                if let Some((_, item)) = slot.take() {
                    actions.push(PlannedAction {
                        op: PlanOp::Create,
                        item,
                    });
                }
            }
        }
    }

    for slot in pending.iter_mut() {
        if let Some((needs, _)) = slot.take() {
            let missing: Vec<String> = needs
                .into_iter()
                .filter(|n| !emitted.contains(n.as_str()))
                .collect();
            return Err(PlanError::Validation(format!(
                "derived artifact references nodes missing from the creation order: {}",
                missing.join(", ")
            )));
        }
    }

    let encoded = serde_json::to_vec(&actions)?;
    Ok(Plan {
        name: inputs.name.to_string(),
        fingerprint: fingerprint_bytes(&encoded),
        execution_order: inputs.order.to_vec(),
        actions,
        to_create,
        to_update,
    })
}
