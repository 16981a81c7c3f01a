//! Planning pipeline — declaration set in, ordered plan out.
//!
//! Passes run in a fixed sequence: template resolution, graph
//! construction, pipeline wiring, topology planning, creation ordering,
//! grant derivation, emission. Each pass is pure; the whole pipeline is
//! deterministic for a given declaration set and provisioned-node set.

use super::emitter::{self, EmitInputs};
use super::error::PlanError;
use super::graph::{self, Graph};
use super::grants;
use super::resolver;
use super::types::*;
use crate::topology::{network, pipeline};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Plan a fresh deployment: every node emits as `create`.
pub fn plan(config: &TrazarConfig) -> Result<Plan, PlanError> {
    plan_against(config, &BTreeSet::new())
}

/// Plan against a set of already-provisioned node ids, which emit as
/// `update` instead of `create`. Derived artifacts always re-emit; the
/// provisioning engine reconciles them idempotently.
pub fn plan_against(
    config: &TrazarConfig,
    provisioned: &BTreeSet<String>,
) -> Result<Plan, PlanError> {
    info!(name = %config.name, "planning deployment");

    let resolved = resolver::resolve_attributes(config)?;
    let mut graph = graph::build(&resolved)?;
    debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "reference graph built"
    );

    let wiring = pipeline::wire_stages(&resolved.pipeline, &graph.nodes)?;
    for edge in wiring.edges {
        if !graph.edges.contains(&edge) {
            graph.edges.push(edge);
        }
    }

    let (routes, endpoints) = plan_topology(&resolved, &mut graph)?;
    let order = resolver::creation_order(&graph)?;
    let derived = grants::derive_grants(&graph)?;
    debug!(
        order_len = order.len(),
        grants = derived.len(),
        routes = routes.len(),
        "passes complete"
    );

    emitter::emit(EmitInputs {
        name: &resolved.name,
        order: &order,
        graph: &graph,
        grants: derived,
        routes,
        endpoints,
        bindings: wiring.bindings,
        provisioned,
    })
}

/// Validate the declared networks, plan endpoint placements, and (when a
/// transit link is declared) plan the interconnect routes. Attachment
/// nodes gain DependsOn edges toward their router and network so the
/// creation order covers the transit fabric.
fn plan_topology(
    config: &TrazarConfig,
    graph: &mut Graph,
) -> Result<(Vec<RoutePlanEntry>, Vec<EndpointPlacement>), PlanError> {
    for (name, net) in &config.networks {
        let node = graph
            .nodes
            .get(&net.node)
            .ok_or_else(|| PlanError::DanglingReference {
                node: name.clone(),
                target: net.node.clone(),
            })?;
        if node.kind != ResourceKind::Network {
            return Err(PlanError::Validation(format!(
                "network '{name}' points at node '{}' of kind {}, expected network",
                node.id, node.kind
            )));
        }
        network::validate_network(net)?;
    }

    let endpoints = network::endpoint_placements(&config.networks);

    let Some(transit) = &config.transit else {
        return Ok((Vec::new(), endpoints));
    };

    let router = graph
        .nodes
        .get(&transit.router)
        .ok_or_else(|| PlanError::DanglingReference {
            node: "transit".to_string(),
            target: transit.router.clone(),
        })?;
    if router.kind != ResourceKind::TransitRouter {
        return Err(PlanError::Validation(format!(
            "transit router '{}' is a {}, not a transit_router",
            router.id, router.kind
        )));
    }
    if transit.attachments.len() != 2 {
        return Err(PlanError::Validation(format!(
            "transit link declares {} attachment(s), expected exactly 2",
            transit.attachments.len()
        )));
    }

    let mut sides: Vec<(&NetworkDescriptor, &str)> = Vec::with_capacity(2);
    for (net_name, att_id) in &transit.attachments {
        let net = config
            .networks
            .get(net_name)
            .ok_or_else(|| PlanError::DanglingReference {
                node: "transit".to_string(),
                target: net_name.clone(),
            })?;
        let att = graph
            .nodes
            .get(att_id)
            .ok_or_else(|| PlanError::DanglingReference {
                node: "transit".to_string(),
                target: att_id.clone(),
            })?;
        if att.kind != ResourceKind::TransitAttachment {
            return Err(PlanError::Validation(format!(
                "transit attachment '{}' is a {}, not a transit_attachment",
                att.id, att.kind
            )));
        }
        for to in [transit.router.clone(), net.node.clone()] {
            let edge = ReferenceEdge {
                from: att_id.clone(),
                to,
                relation: Relation::DependsOn,
            };
            if !graph.edges.contains(&edge) {
                graph.edges.push(edge);
            }
        }
        sides.push((net, att_id.as_str()));
    }

    let routes = network::plan_interconnect(
        sides[0].0,
        sides[1].0,
        (sides[0].1, sides[1].1),
        transit.policy,
    )?;
    Ok((routes, endpoints))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE_YAML: &str = r#"
version: "1.0"
name: build-pipeline
context:
  account: "123456789012"
  region: us-west-2
resources:
  registry:
    kind: image_registry
    attributes:
      repository_name: demo-app
  build-role:
    kind: role
pipeline:
  - name: source
    output_artifacts: [src]
  - name: build
    input_artifact: src
    output_artifacts: [image]
    execution_role: build-role
    touches: [registry]
"#;

    const NETWORK_YAML: &str = r#"
version: "1.0"
name: dual-network
resources:
  net1:
    kind: network
  net2:
    kind: network
  tgw:
    kind: transit_router
  att1:
    kind: transit_attachment
  att2:
    kind: transit_attachment
networks:
  vpc1:
    node: net1
    cidr_block: 10.0.0.0/16
    private_subnets: [10.0.0.0/27, 10.0.0.32/27]
    endpoints: [ssm]
  vpc2:
    node: net2
    cidr_block: 10.1.0.0/16
    private_subnets: [10.1.0.0/27]
transit:
  router: tgw
  attachments:
    vpc1: att1
    vpc2: att2
"#;

    fn parse(yaml: &str) -> TrazarConfig {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    fn action_key(action: &PlannedAction) -> String {
        match &action.item {
            PlanItem::Node(n) => format!("node:{}", n.id),
            PlanItem::Grant(g) => format!("grant:{}->{}", g.principal, g.resource),
            PlanItem::Route(r) => format!("route:{}", r.network),
            PlanItem::Endpoint(e) => format!("endpoint:{}/{}", e.network, e.service),
            PlanItem::Artifact(b) => format!("artifact:{}->{}", b.from_stage, b.to_stage),
        }
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let plan = plan(&parse(PIPELINE_YAML)).unwrap();
        assert_eq!(
            plan.execution_order,
            vec!["registry", "source", "build-role", "build"]
        );

        let keys: Vec<String> = plan.actions.iter().map(action_key).collect();
        assert_eq!(
            keys,
            vec![
                "node:registry",
                "node:source",
                "node:build-role",
                "grant:build-role->registry",
                "node:build",
                "artifact:source->build",
            ]
        );

        let grant = plan
            .actions
            .iter()
            .find_map(|a| match &a.item {
                PlanItem::Grant(g) => Some(g),
                _ => None,
            })
            .unwrap();
        assert!(grant.actions.contains("registry:PutImage"));
        assert!(!grant.actions.contains("*"));
        assert_eq!(plan.to_create, 4);
        assert_eq!(plan.to_update, 0);
    }

    #[test]
    fn test_dual_network_end_to_end() {
        let plan = plan(&parse(NETWORK_YAML)).unwrap();
        assert_eq!(
            plan.execution_order,
            vec!["net1", "net2", "tgw", "att1", "att2"]
        );

        let routes: Vec<&RoutePlanEntry> = plan
            .actions
            .iter()
            .filter_map(|a| match &a.item {
                PlanItem::Route(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes.iter().filter(|r| r.network == "net1").count(), 2);
        assert_eq!(routes.iter().filter(|r| r.network == "net2").count(), 1);

        let endpoints: Vec<&EndpointPlacement> = plan
            .actions
            .iter()
            .filter_map(|a| match &a.item {
                PlanItem::Endpoint(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].network, "net1");
        assert_eq!(endpoints[0].service, "ssm");

        // Every route comes after the attachment node it forwards through
        let keys: Vec<String> = plan.actions.iter().map(action_key).collect();
        let att1_pos = keys.iter().position(|k| k == "node:att1").unwrap();
        let att2_pos = keys.iter().position(|k| k == "node:att2").unwrap();
        for (pos, action) in plan.actions.iter().enumerate() {
            if let PlanItem::Route(r) = &action.item {
                let NextHop::TransitAttachment(att) = &r.next_hop else {
                    panic!("transit route without attachment hop");
                };
                let att_pos = if att == "att1" { att1_pos } else { att2_pos };
                assert!(pos > att_pos);
            }
        }
    }

    #[test]
    fn test_fingerprint_stable_across_runs() {
        let config = parse(NETWORK_YAML);
        let first = plan(&config).unwrap();
        let second = plan(&config).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(
            serde_json::to_string(&first.actions).unwrap(),
            serde_json::to_string(&second.actions).unwrap()
        );
    }

    #[test]
    fn test_plan_against_marks_provisioned() {
        let provisioned: BTreeSet<String> =
            ["net1".to_string(), "tgw".to_string()].into_iter().collect();
        let plan = plan_against(&parse(NETWORK_YAML), &provisioned).unwrap();
        assert_eq!(plan.to_update, 2);
        assert_eq!(plan.to_create, 3);
        for action in &plan.actions {
            if let PlanItem::Node(n) = &action.item {
                let expected = if provisioned.contains(&n.id) {
                    PlanOp::Update
                } else {
                    PlanOp::Create
                };
                assert_eq!(action.op, expected);
            }
        }
    }

    #[test]
    fn test_cycle_rejected() {
        let yaml = r#"
version: "1.0"
name: t
resources:
  a:
    kind: network
    depends_on: [b]
  b:
    kind: network
    depends_on: [a]
"#;
        assert!(matches!(
            plan(&parse(yaml)).unwrap_err(),
            PlanError::CyclicDependency { .. }
        ));
    }

    #[test]
    fn test_transit_requires_two_attachments() {
        let yaml = r#"
version: "1.0"
name: t
resources:
  net1:
    kind: network
  tgw:
    kind: transit_router
  att1:
    kind: transit_attachment
networks:
  vpc1:
    node: net1
    cidr_block: 10.0.0.0/16
transit:
  router: tgw
  attachments:
    vpc1: att1
"#;
        let err = plan(&parse(yaml)).unwrap_err();
        assert!(err.to_string().contains("expected exactly 2"));
    }

    #[test]
    fn test_transit_unknown_network_name() {
        let yaml = r#"
version: "1.0"
name: t
resources:
  net1:
    kind: network
  tgw:
    kind: transit_router
  att1:
    kind: transit_attachment
  att2:
    kind: transit_attachment
networks:
  vpc1:
    node: net1
    cidr_block: 10.0.0.0/16
transit:
  router: tgw
  attachments:
    vpc1: att1
    ghost: att2
"#;
        assert!(matches!(
            plan(&parse(yaml)).unwrap_err(),
            PlanError::DanglingReference { .. }
        ));
    }

    #[test]
    fn test_network_node_kind_checked() {
        let yaml = r#"
version: "1.0"
name: t
resources:
  reg:
    kind: image_registry
    attributes: {repository_name: demo}
networks:
  vpc1:
    node: reg
    cidr_block: 10.0.0.0/16
"#;
        assert!(matches!(
            plan(&parse(yaml)).unwrap_err(),
            PlanError::Validation(_)
        ));
    }

    #[test]
    fn test_overlapping_network_blocks_rejected() {
        let yaml = r#"
version: "1.0"
name: t
resources:
  net1:
    kind: network
  net2:
    kind: network
  tgw:
    kind: transit_router
  att1:
    kind: transit_attachment
  att2:
    kind: transit_attachment
networks:
  vpc1:
    node: net1
    cidr_block: 10.0.0.0/16
  vpc2:
    node: net2
    cidr_block: 10.0.128.0/17
transit:
  router: tgw
  attachments:
    vpc1: att1
    vpc2: att2
"#;
        assert!(matches!(
            plan(&parse(yaml)).unwrap_err(),
            PlanError::OverlappingAddressSpace { .. }
        ));
    }

    #[test]
    fn test_pipeline_and_networks_coexist() {
        let yaml = r#"
version: "1.0"
name: combined
resources:
  registry:
    kind: image_registry
    attributes: {repository_name: demo}
  build-role:
    kind: role
  net1:
    kind: network
networks:
  vpc1:
    node: net1
    cidr_block: 10.0.0.0/16
    endpoints: [ssm]
pipeline:
  - name: source
    output_artifacts: [src]
  - name: build
    execution_role: build-role
    touches: [registry]
    output_artifacts: [image]
"#;
        let plan = plan(&parse(yaml)).unwrap();
        assert_eq!(plan.execution_order.len(), 5);
        assert!(plan
            .actions
            .iter()
            .any(|a| matches!(&a.item, PlanItem::Endpoint(_))));
        assert!(plan
            .actions
            .iter()
            .any(|a| matches!(&a.item, PlanItem::Grant(_))));
    }
}
