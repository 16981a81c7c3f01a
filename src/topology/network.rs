//! Cross-network route planning over a transit router.
//!
//! Two independently addressed private networks are joined selectively:
//! each private subnet gets one route toward the peer's whole block via
//! the local transit attachment, per permitted direction. Endpoint
//! placements are per-network and independent of inter-network routing,
//! so they can never leak into the peer's route table.

use crate::core::error::PlanError;
use crate::core::types::*;
use crate::topology::cidr::Cidr;
use indexmap::IndexMap;

/// Check a single network's internal address layout: every private subnet
/// inside the block, no two subnets overlapping.
pub fn validate_network(net: &NetworkDescriptor) -> Result<(), PlanError> {
    for subnet in &net.private_subnets {
        if !net.cidr_block.contains(subnet) {
            return Err(PlanError::SubnetOutsideNetwork {
                subnet: subnet.to_string(),
                network: net.cidr_block.to_string(),
            });
        }
    }
    for (i, a) in net.private_subnets.iter().enumerate() {
        for b in &net.private_subnets[i + 1..] {
            if a.overlaps(b) {
                return Err(PlanError::OverlappingSubnets {
                    a: a.to_string(),
                    b: b.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Plan the route entries interconnecting two networks through their
/// transit attachments. Because the blocks are proven disjoint first, no
/// emitted entry can self-route or shadow a subnet's local range.
pub fn plan_interconnect(
    first: &NetworkDescriptor,
    second: &NetworkDescriptor,
    attachments: (&str, &str),
    policy: TrafficPolicy,
) -> Result<Vec<RoutePlanEntry>, PlanError> {
    validate_network(first)?;
    validate_network(second)?;

    if first.cidr_block.overlaps(&second.cidr_block) {
        return Err(PlanError::OverlappingAddressSpace {
            a: first.cidr_block.to_string(),
            b: second.cidr_block.to_string(),
        });
    }

    let mut routes = Vec::new();
    if policy != TrafficPolicy::SecondToFirst {
        routes_toward(first, second.cidr_block, attachments.0, &mut routes);
    }
    if policy != TrafficPolicy::FirstToSecond {
        routes_toward(second, first.cidr_block, attachments.1, &mut routes);
    }
    Ok(routes)
}

fn routes_toward(
    net: &NetworkDescriptor,
    destination: Cidr,
    attachment: &str,
    out: &mut Vec<RoutePlanEntry>,
) {
    for subnet in &net.private_subnets {
        out.push(RoutePlanEntry {
            network: net.node.clone(),
            source_subnet: *subnet,
            destination,
            next_hop: NextHop::TransitAttachment(attachment.to_string()),
        });
    }
}

/// One placement per required managed service per network.
pub fn endpoint_placements(
    networks: &IndexMap<String, NetworkDescriptor>,
) -> Vec<EndpointPlacement> {
    networks
        .values()
        .flat_map(|net| {
            net.endpoints.iter().map(|service| EndpointPlacement {
                network: net.node.clone(),
                service: service.clone(),
            })
        })
        .collect()
}
