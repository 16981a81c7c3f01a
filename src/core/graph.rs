//! Reference graph construction.
//!
//! Scans each node's attribute values (recursively through sequences and
//! mappings) for `{{ref.<id>.<identifier>}}` tokens and emits one edge per
//! reference found, with the relation taken from a static (source kind,
//! target kind) table. Explicit `depends_on` lists add DependsOn edges.
//! Pipeline stages are materialized as nodes of kind `pipeline_stage` so
//! the dependency resolver covers them.

use super::error::PlanError;
use super::types::*;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// The reference graph: nodes plus every declared relationship.
#[derive(Debug, Clone)]
pub struct Graph {
    pub nodes: IndexMap<String, ResourceNode>,
    pub edges: Vec<ReferenceEdge>,
}

/// A deferred read of another node's exposed identifier, found inside an
/// attribute value. Not resolvable until the target is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    pub target: String,
    pub identifier: String,
}

/// Relation implied by a reference from one kind to another.
pub fn relation_for(source: ResourceKind, target: ResourceKind) -> Relation {
    use ResourceKind::*;
    match (source, target) {
        // A role reading a resource identifier needs access to it
        (Role, ImageRegistry | BuildProject | ServiceEndpoint | Network) => Relation::Grants,
        // Route tables and subnets pointing at the transit fabric
        (RouteTable | Subnet, TransitAttachment | TransitRouter) => Relation::Routes,
        (PipelineStage, PipelineStage) => Relation::FeedsArtifactTo,
        _ => Relation::DependsOn,
    }
}

/// Collect every `{{ref.<id>.<identifier>}}` token in a value tree.
pub fn scan_refs(value: &serde_yaml_ng::Value, out: &mut Vec<AttributeRef>) {
    match value {
        serde_yaml_ng::Value::String(s) => scan_str(s, out),
        serde_yaml_ng::Value::Sequence(seq) => {
            for v in seq {
                scan_refs(v, out);
            }
        }
        serde_yaml_ng::Value::Mapping(map) => {
            for (_, v) in map {
                scan_refs(v, out);
            }
        }
        _ => {}
    }
}

fn scan_str(s: &str, out: &mut Vec<AttributeRef>) {
    let mut rest = s;
    while let Some(open) = rest.find("{{") {
        let Some(close_rel) = rest[open..].find("}}") else {
            break;
        };
        let close = open + close_rel;
        let token = rest[open + 2..close].trim();
        if let Some(ref_part) = token.strip_prefix("ref.") {
            if let Some((target, identifier)) = ref_part.split_once('.') {
                out.push(AttributeRef {
                    target: target.to_string(),
                    identifier: identifier.to_string(),
                });
            }
        }
        rest = &rest[close + 2..];
    }
}

/// Build the reference graph from a declaration set. Fails when any
/// reference or dependency names a node outside the set.
pub fn build(config: &TrazarConfig) -> Result<Graph, PlanError> {
    let mut nodes: IndexMap<String, ResourceNode> = IndexMap::new();

    for (id, decl) in &config.resources {
        nodes.insert(
            id.clone(),
            ResourceNode {
                id: id.clone(),
                kind: decl.kind,
                attributes: decl.attributes.clone(),
                exposed_identifiers: BTreeMap::new(),
            },
        );
    }

    // Pipeline stages become first-class nodes so ordering covers them
    for stage in &config.pipeline {
        if nodes.contains_key(&stage.name) {
            return Err(PlanError::Validation(format!(
                "stage '{}' collides with a declared resource id",
                stage.name
            )));
        }
        nodes.insert(
            stage.name.clone(),
            ResourceNode::new(stage.name.clone(), ResourceKind::PipelineStage),
        );
    }

    let mut edges: Vec<ReferenceEdge> = Vec::new();
    for (id, decl) in &config.resources {
        let mut refs = Vec::new();
        for value in decl.attributes.values() {
            scan_refs(value, &mut refs);
        }
        for attr_ref in refs {
            let target = nodes
                .get(&attr_ref.target)
                .ok_or_else(|| PlanError::DanglingReference {
                    node: id.clone(),
                    target: attr_ref.target.clone(),
                })?;
            let edge = ReferenceEdge {
                from: id.clone(),
                to: target.id.clone(),
                relation: relation_for(decl.kind, target.kind),
            };
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }

        for dep in &decl.depends_on {
            if !nodes.contains_key(dep) {
                return Err(PlanError::DanglingReference {
                    node: id.clone(),
                    target: dep.clone(),
                });
            }
            let edge = ReferenceEdge {
                from: id.clone(),
                to: dep.clone(),
                relation: Relation::DependsOn,
            };
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
    }

    Ok(Graph { nodes, edges })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> TrazarConfig {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn test_scan_single_ref() {
        let value = serde_yaml_ng::Value::String("{{ref.registry.name}}".to_string());
        let mut out = Vec::new();
        scan_refs(&value, &mut out);
        assert_eq!(
            out,
            vec![AttributeRef {
                target: "registry".to_string(),
                identifier: "name".to_string(),
            }]
        );
    }

    #[test]
    fn test_scan_embedded_and_multiple() {
        let value = serde_yaml_ng::Value::String(
            "push {{ref.registry.uri}} from {{ref.repo.clone_url}}".to_string(),
        );
        let mut out = Vec::new();
        scan_refs(&value, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].target, "registry");
        assert_eq!(out[1].target, "repo");
    }

    #[test]
    fn test_scan_nested_sequence_and_mapping() {
        let yaml = r#"
env:
  IMAGE_REPO: "{{ref.registry.name}}"
commands:
  - "login {{ref.registry.uri}}"
"#;
        let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(yaml).unwrap();
        let mut out = Vec::new();
        scan_refs(&value, &mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_scan_ignores_context_templates() {
        let value = serde_yaml_ng::Value::String("{{context.account}}".to_string());
        let mut out = Vec::new();
        scan_refs(&value, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_relation_table() {
        use ResourceKind::*;
        assert_eq!(relation_for(Role, ImageRegistry), Relation::Grants);
        assert_eq!(relation_for(Role, Network), Relation::Grants);
        assert_eq!(relation_for(RouteTable, TransitAttachment), Relation::Routes);
        assert_eq!(relation_for(Subnet, TransitRouter), Relation::Routes);
        assert_eq!(
            relation_for(PipelineStage, PipelineStage),
            Relation::FeedsArtifactTo
        );
        assert_eq!(relation_for(BuildProject, ImageRegistry), Relation::DependsOn);
        assert_eq!(relation_for(Subnet, Network), Relation::DependsOn);
    }

    #[test]
    fn test_build_edges_from_attributes() {
        let config = parse(
            r#"
version: "1.0"
name: t
resources:
  registry:
    kind: image_registry
    attributes: {repository_name: demo}
  build:
    kind: build_project
    attributes:
      source_repo: demo-src
      image_repo: "{{ref.registry.name}}"
"#,
        );
        let graph = build(&config).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(
            graph.edges,
            vec![ReferenceEdge {
                from: "build".to_string(),
                to: "registry".to_string(),
                relation: Relation::DependsOn,
            }]
        );
    }

    #[test]
    fn test_build_role_reference_is_grants() {
        let config = parse(
            r#"
version: "1.0"
name: t
resources:
  registry:
    kind: image_registry
    attributes: {repository_name: demo}
  build-role:
    kind: role
    attributes:
      pushes_to: "{{ref.registry.arn}}"
"#,
        );
        let graph = build(&config).unwrap();
        assert_eq!(graph.edges[0].relation, Relation::Grants);
    }

    #[test]
    fn test_build_dangling_reference() {
        let config = parse(
            r#"
version: "1.0"
name: t
resources:
  build:
    kind: build_project
    attributes:
      image_repo: "{{ref.ghost.name}}"
"#,
        );
        let err = build(&config).unwrap_err();
        assert!(matches!(
            err,
            PlanError::DanglingReference { ref node, ref target }
                if node == "build" && target == "ghost"
        ));
    }

    #[test]
    fn test_build_dangling_depends_on() {
        let config = parse(
            r#"
version: "1.0"
name: t
resources:
  a:
    kind: network
    depends_on: [missing]
"#,
        );
        assert!(matches!(
            build(&config).unwrap_err(),
            PlanError::DanglingReference { .. }
        ));
    }

    #[test]
    fn test_build_materializes_stage_nodes() {
        let config = parse(
            r#"
version: "1.0"
name: t
resources:
  build-role:
    kind: role
pipeline:
  - name: source
    output_artifacts: [src]
"#,
        );
        let graph = build(&config).unwrap();
        assert_eq!(graph.nodes["source"].kind, ResourceKind::PipelineStage);
    }

    #[test]
    fn test_build_stage_id_collision() {
        let config = parse(
            r#"
version: "1.0"
name: t
resources:
  source:
    kind: network
pipeline:
  - name: source
"#,
        );
        assert!(matches!(
            build(&config).unwrap_err(),
            PlanError::Validation(_)
        ));
    }

    #[test]
    fn test_build_deduplicates_repeated_refs() {
        let config = parse(
            r#"
version: "1.0"
name: t
resources:
  registry:
    kind: image_registry
    attributes: {repository_name: demo}
  build:
    kind: build_project
    attributes:
      a: "{{ref.registry.name}}"
      b: "{{ref.registry.uri}}"
"#,
        );
        let graph = build(&config).unwrap();
        assert_eq!(graph.edges.len(), 1);
    }
}
