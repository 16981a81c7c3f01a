//! Declaration-set and plan types.
//!
//! Defines the YAML schema for resource nodes, network descriptors, the
//! transit interconnect, and pipeline stages, plus the derived artifacts
//! (grants, routes, endpoint placements, actions) handed to the external
//! provisioning engine. All schema types derive Serialize/Deserialize for
//! YAML roundtripping; derived artifacts only serialize.

use crate::topology::cidr::Cidr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Top-level trazar.yaml
// ============================================================================

/// Root configuration — the declared infrastructure topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrazarConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable deployment name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Plan-level account/region parameters, passed explicitly — the core
    /// never reads ambient process state.
    #[serde(default)]
    pub context: PlanContext,

    /// Resource node declarations (order-preserving)
    pub resources: IndexMap<String, ResourceDecl>,

    /// Private network descriptors, keyed by a local name
    #[serde(default)]
    pub networks: IndexMap<String, NetworkDescriptor>,

    /// Transit-router interconnect between two declared networks
    #[serde(default)]
    pub transit: Option<TransitLink>,

    /// Build pipeline stages, in execution order
    #[serde(default)]
    pub pipeline: Vec<StageDecl>,
}

/// Plan-level configuration parameters, templatable as
/// `{{context.account}}` and `{{context.region}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanContext {
    #[serde(default)]
    pub account: Option<String>,

    #[serde(default)]
    pub region: Option<String>,
}

// ============================================================================
// Resource nodes
// ============================================================================

/// A single declared infrastructure resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Resource kind
    pub kind: ResourceKind,

    /// Kind-specific attributes. String values may carry
    /// `{{context.*}}` templates and `{{ref.<id>.<identifier>}}`
    /// deferred references to other nodes' exposed identifiers.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_yaml_ng::Value>,

    /// Explicit dependencies (other node ids that must be created first)
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Resource kind enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Subnet,
    RouteTable,
    TransitRouter,
    TransitAttachment,
    SecurityRule,
    ServiceEndpoint,
    ImageRegistry,
    BuildProject,
    PipelineStage,
    Role,
    Policy,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::RouteTable => "route_table",
            Self::TransitRouter => "transit_router",
            Self::TransitAttachment => "transit_attachment",
            Self::SecurityRule => "security_rule",
            Self::ServiceEndpoint => "service_endpoint",
            Self::ImageRegistry => "image_registry",
            Self::BuildProject => "build_project",
            Self::PipelineStage => "pipeline_stage",
            Self::Role => "role",
            Self::Policy => "policy",
        };
        write!(f, "{s}")
    }
}

/// A typed node in the reference graph. Built once per planning pass and
/// immutable during resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceNode {
    /// Stable, caller-assigned id, unique within a graph
    pub id: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Kind-specific attributes, context templates already resolved
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_yaml_ng::Value>,

    /// Identifiers the node exposes once created (an ARN-equivalent, a
    /// CIDR block). Empty during planning; the provisioning engine fills
    /// it as it resolves deferred references.
    #[serde(skip_serializing)]
    pub exposed_identifiers: BTreeMap<String, String>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: BTreeMap::new(),
            exposed_identifiers: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Reference edges
// ============================================================================

/// How one node relates to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    DependsOn,
    Grants,
    Routes,
    FeedsArtifactTo,
}

impl Relation {
    /// Whether the relation constrains creation order. A Grants edge does:
    /// the resource must exist before the grant can be attached to the
    /// principal. Routes and artifact hand-offs never order creation.
    pub fn orders_creation(&self) -> bool {
        matches!(self, Self::DependsOn | Self::Grants)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependsOn => write!(f, "depends_on"),
            Self::Grants => write!(f, "grants"),
            Self::Routes => write!(f, "routes"),
            Self::FeedsArtifactTo => write!(f, "feeds_artifact_to"),
        }
    }
}

/// A directed reference between two nodes. `from` reads an identifier of
/// `to`, so `to` must exist first wherever the relation orders creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEdge {
    pub from: String,
    pub to: String,
    pub relation: Relation,
}

// ============================================================================
// Networks
// ============================================================================

/// A private network and its address layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// The resource node (kind `network`) this descriptor belongs to
    pub node: String,

    /// The network's full address block
    pub cidr_block: Cidr,

    /// Private subnets, each a sub-range of `cidr_block`, non-overlapping
    #[serde(default)]
    pub private_subnets: Vec<Cidr>,

    /// Managed services needing an in-network access point (e.g. the
    /// administrative session channel)
    #[serde(default)]
    pub endpoints: Vec<String>,
}

/// Transit-router interconnect between two declared networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitLink {
    /// The transit-router node id
    pub router: String,

    /// Permitted traffic direction(s)
    #[serde(default)]
    pub policy: TrafficPolicy,

    /// Network name -> transit-attachment node id, in declaration order.
    /// Exactly two entries; "first"/"second" in the policy follow this
    /// order.
    pub attachments: IndexMap<String, String>,
}

/// Which direction(s) of traffic the interconnect permits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficPolicy {
    #[default]
    Symmetric,
    FirstToSecond,
    SecondToFirst,
}

/// Where traffic matching a route entry is forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextHop {
    Local,
    TransitAttachment(String),
}

/// One (source subnet, destination range, next hop) routing tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePlanEntry {
    /// The network node whose route table carries this entry
    pub network: String,

    pub source_subnet: Cidr,

    pub destination: Cidr,

    pub next_hop: NextHop,
}

/// A managed-service access point placed inside one network. Never enters
/// the peer network's route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointPlacement {
    pub network: String,
    pub service: String,
}

// ============================================================================
// Pipeline
// ============================================================================

/// A declared pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDecl {
    /// Stage name, also the id of its materialized graph node
    pub name: String,

    /// Artifact consumed by this stage. Absent means: bind to the
    /// preceding stage's primary output (stage 0 takes no input).
    #[serde(default)]
    pub input_artifact: Option<String>,

    /// Artifacts produced, primary first
    #[serde(default)]
    pub output_artifacts: Vec<String>,

    /// Role node the stage runs under
    #[serde(default)]
    pub execution_role: Option<String>,

    /// Resource node ids the stage's actions touch; each yields a Grants
    /// edge from the execution role
    #[serde(default)]
    pub touches: Vec<String>,
}

/// The binding of one stage's output artifact to a later stage's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactBinding {
    pub from_stage: String,
    pub to_stage: String,
    pub artifact: String,
}

// ============================================================================
// Grants
// ============================================================================

/// A derived, minimal permission record. Never authored directly — always
/// traces back to a Grants edge in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    /// Role node id
    pub principal: String,

    /// Resource node id the actions apply to
    pub resource: String,

    /// Capability strings, sorted for deterministic output
    pub actions: BTreeSet<String>,
}

// ============================================================================
// Plan
// ============================================================================

/// Operation the provisioning engine should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOp {
    Create,
    Update,
}

impl fmt::Display for PlanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
        }
    }
}

/// Payload of a single planned action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanItem {
    Node(ResourceNode),
    Grant(Grant),
    Route(RoutePlanEntry),
    Endpoint(EndpointPlacement),
    Artifact(ArtifactBinding),
}

/// One entry of the emitted action list.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    pub op: PlanOp,

    #[serde(flatten)]
    pub item: PlanItem,
}

/// The complete plan — the sole hand-off to the provisioning engine.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Config name
    pub name: String,

    /// BLAKE3 fingerprint of the serialized action list
    pub fingerprint: String,

    /// Topological creation order (node ids)
    pub execution_order: Vec<String>,

    /// Ordered actions: nodes in dependency order, with grants, routes,
    /// endpoints, and artifact bindings inserted as soon as their
    /// endpoints exist
    pub actions: Vec<PlannedAction>,

    /// Summary counts
    pub to_create: u32,
    pub to_update: u32,
}

// ============================================================================
// Template helper
// ============================================================================

/// Convert a serde_yaml_ng::Value to a string for template resolution.
pub fn yaml_value_to_string(val: &serde_yaml_ng::Value) -> String {
    match val {
        serde_yaml_ng::Value::String(s) => s.clone(),
        serde_yaml_ng::Value::Number(n) => n.to_string(),
        serde_yaml_ng::Value::Bool(b) => b.to_string(),
        serde_yaml_ng::Value::Null => String::new(),
        other => format!("{other:?}"),
    }
}

// ============================================================================
// Tests
// ============================================================================
