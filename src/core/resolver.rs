//! Template resolution and creation-order computation.
//!
//! Resolves `{{context.account}}` / `{{context.region}}` templates in
//! attribute strings; `{{ref.*}}` tokens are deferred references and pass
//! through untouched. Creation order comes from Kahn's algorithm over the
//! ordering relations (DependsOn, Grants) with ascending-id tie-breaking
//! among simultaneously-ready nodes.

use super::error::PlanError;
use super::graph::Graph;
use super::types::*;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Resolve context template variables in a string. Deferred `{{ref.*}}`
/// tokens are left intact for the provisioning engine.
pub fn resolve_template(template: &str, context: &PlanContext) -> Result<String, PlanError> {
    let mut result = template.to_string();
    let mut start = 0;

    while let Some(open_rel) = result[start..].find("{{") {
        let open = start + open_rel;
        let close_rel = result[open..].find("}}").ok_or_else(|| {
            PlanError::Validation(format!("unclosed template in '{template}'"))
        })?;
        let close = open + close_rel + 2;
        let key = result[open + 2..close - 2].trim().to_string();

        if key.starts_with("ref.") {
            start = close;
            continue;
        }

        let value = match key.as_str() {
            "context.account" => context.account.clone().ok_or_else(|| {
                PlanError::Validation("template reads context.account but none is set".to_string())
            })?,
            "context.region" => context.region.clone().ok_or_else(|| {
                PlanError::Validation("template reads context.region but none is set".to_string())
            })?,
            other => {
                return Err(PlanError::Validation(format!(
                    "unknown template variable: {other}"
                )))
            }
        };

        result.replace_range(open..close, &value);
        start = open + value.len();
    }

    Ok(result)
}

fn resolve_value(
    value: &mut serde_yaml_ng::Value,
    context: &PlanContext,
) -> Result<(), PlanError> {
    match value {
        serde_yaml_ng::Value::String(s) => {
            *s = resolve_template(s, context)?;
        }
        serde_yaml_ng::Value::Sequence(seq) => {
            for v in seq {
                resolve_value(v, context)?;
            }
        }
        serde_yaml_ng::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                resolve_value(v, context)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Resolve context templates across every resource's attributes, returning
/// a new config. The input declaration set is never mutated.
pub fn resolve_attributes(config: &TrazarConfig) -> Result<TrazarConfig, PlanError> {
    let mut resolved = config.clone();
    for decl in resolved.resources.values_mut() {
        for value in decl.attributes.values_mut() {
            resolve_value(value, &resolved.context)?;
        }
    }
    Ok(resolved)
}

/// Compute the creation order: every node appears after everything it
/// depends on (DependsOn and Grants edges). Ties among equally-ready nodes
/// break by ascending id for determinism.
pub fn creation_order(graph: &Graph) -> Result<Vec<String>, PlanError> {
    let ids: Vec<&str> = graph.nodes.keys().map(String::as_str).collect();
    let mut in_degree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> =
        ids.iter().map(|id| (*id, Vec::new())).collect();

    for edge in graph.edges.iter().filter(|e| e.relation.orders_creation()) {
        // `from` reads `to`, so `to` is created first
        dependents
            .get_mut(edge.to.as_str())
            .ok_or_else(|| PlanError::DanglingReference {
                node: edge.from.clone(),
                target: edge.to.clone(),
            })?
            .push(edge.from.as_str());
        *in_degree
            .get_mut(edge.from.as_str())
            .ok_or_else(|| PlanError::DanglingReference {
                node: edge.to.clone(),
                target: edge.from.clone(),
            })? += 1;
    }

    let mut queue: VecDeque<&str> = VecDeque::new();
    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.sort_unstable();
    queue.extend(ready);

    let mut order: Vec<String> = Vec::with_capacity(ids.len());
    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());

        let mut next_ready: Vec<&str> = Vec::new();
        if let Some(children) = dependents.get(current) {
            for &child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        next_ready.push(child);
                    }
                }
            }
        }
        next_ready.sort_unstable();
        queue.extend(next_ready);
    }

    if order.len() != ids.len() {
        let ordered: HashSet<&str> = order.iter().map(String::as_str).collect();
        let remaining: BTreeSet<&str> = ids
            .iter()
            .filter(|id| !ordered.contains(**id))
            .copied()
            .collect();
        return Err(PlanError::CyclicDependency {
            members: cycle_members(remaining, graph),
        });
    }

    Ok(order)
}

/// Narrow the unresolved set down to the nodes actually sitting on a
/// cycle: iteratively strip nodes with no unresolved dependent or no
/// unresolved dependency, so downstream nodes of a cycle are not blamed.
fn cycle_members(mut remaining: BTreeSet<&str>, graph: &Graph) -> Vec<String> {
    loop {
        let mut has_dependent: HashSet<&str> = HashSet::new();
        let mut has_dependency: HashSet<&str> = HashSet::new();
        for edge in graph.edges.iter().filter(|e| e.relation.orders_creation()) {
            if remaining.contains(edge.from.as_str()) && remaining.contains(edge.to.as_str()) {
                has_dependent.insert(edge.to.as_str());
                has_dependency.insert(edge.from.as_str());
            }
        }
        let stripped: BTreeSet<&str> = remaining
            .iter()
            .filter(|id| has_dependent.contains(**id) && has_dependency.contains(**id))
            .copied()
            .collect();
        if stripped.len() == remaining.len() {
            break;
        }
        remaining = stripped;
    }
    remaining.into_iter().map(str::to_string).collect()
}
