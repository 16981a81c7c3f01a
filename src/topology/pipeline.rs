//! Pipeline artifact threading and stage wiring.
//!
//! Stage 0 takes no input; each later stage binds to the immediately
//! preceding stage's primary output unless it names an explicit input
//! artifact, which must come from an earlier stage. Every stage running
//! under a role yields a Grants edge from that role to each resource the
//! stage touches — grants are derived from these edges, never authored.

use crate::core::error::PlanError;
use crate::core::types::*;
use indexmap::IndexMap;

/// Derived pipeline wiring: artifact bindings plus the graph edges the
/// stages imply (role dependencies, grants, hand-offs).
#[derive(Debug, Clone)]
pub struct PipelineWiring {
    pub bindings: Vec<ArtifactBinding>,
    pub edges: Vec<ReferenceEdge>,
}

/// Thread artifacts through the declared stages and wire each stage to
/// its execution role and touched resources. `nodes` must already contain
/// the materialized stage nodes.
pub fn wire_stages(
    stages: &[StageDecl],
    nodes: &IndexMap<String, ResourceNode>,
) -> Result<PipelineWiring, PlanError> {
    let mut bindings = Vec::new();
    let mut edges = Vec::new();

    for (idx, stage) in stages.iter().enumerate() {
        let role = match &stage.execution_role {
            Some(role_id) => {
                let role = nodes
                    .get(role_id)
                    .ok_or_else(|| PlanError::DanglingReference {
                        node: stage.name.clone(),
                        target: role_id.clone(),
                    })?;
                if role.kind != ResourceKind::Role {
                    return Err(PlanError::Validation(format!(
                        "stage '{}' execution role '{}' is a {}, not a role",
                        stage.name, role.id, role.kind
                    )));
                }
                edges.push(ReferenceEdge {
                    from: stage.name.clone(),
                    to: role.id.clone(),
                    relation: Relation::DependsOn,
                });
                Some(role)
            }
            None => None,
        };

        for touched in &stage.touches {
            let target = nodes
                .get(touched)
                .ok_or_else(|| PlanError::DanglingReference {
                    node: stage.name.clone(),
                    target: touched.clone(),
                })?;
            let role = role.ok_or_else(|| {
                PlanError::Validation(format!(
                    "stage '{}' touches '{}' but declares no execution role",
                    stage.name, touched
                ))
            })?;
            edges.push(ReferenceEdge {
                from: role.id.clone(),
                to: target.id.clone(),
                relation: Relation::Grants,
            });
        }

        let binding = match (&stage.input_artifact, idx) {
            (None, 0) => None,
            (Some(name), 0) => {
                return Err(PlanError::BrokenArtifactChain {
                    stage: stage.name.clone(),
                    artifact: name.clone(),
                })
            }
            (Some(name), _) => {
                // Explicit override: nearest earlier producer wins
                let producer = stages[..idx]
                    .iter()
                    .rev()
                    .find(|s| s.output_artifacts.iter().any(|a| a == name))
                    .ok_or_else(|| PlanError::BrokenArtifactChain {
                        stage: stage.name.clone(),
                        artifact: name.clone(),
                    })?;
                Some((producer.name.clone(), name.clone()))
            }
            (None, _) => {
                let prev = &stages[idx - 1];
                let primary = prev.output_artifacts.first().ok_or_else(|| {
                    PlanError::BrokenArtifactChain {
                        stage: stage.name.clone(),
                        artifact: format!("<primary output of '{}'>", prev.name),
                    }
                })?;
                Some((prev.name.clone(), primary.clone()))
            }
        };

        if let Some((from_stage, artifact)) = binding {
            edges.push(ReferenceEdge {
                from: from_stage.clone(),
                to: stage.name.clone(),
                relation: Relation::FeedsArtifactTo,
            });
            bindings.push(ArtifactBinding {
                from_stage,
                to_stage: stage.name.clone(),
                artifact,
            });
        }
    }

    Ok(PipelineWiring { bindings, edges })
}
