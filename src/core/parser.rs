//! YAML parsing and declaration-set validation.
//!
//! Parses trazar.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - depends_on references must exist and never self-reference
//! - Required attributes per resource kind
//! - Network descriptors, the transit link, and pipeline stages must
//!   reference declared nodes of the right kind
//!
//! Validation collects every problem instead of stopping at the first;
//! planning-time checks (cycles, CIDR math, artifact chains) live in the
//! planner passes.

use super::error::PlanError;
use super::types::*;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a trazar.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<TrazarConfig, PlanError> {
    let content = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse a trazar.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<TrazarConfig, PlanError> {
    Ok(serde_yaml_ng::from_str(yaml)?)
}

fn err(errors: &mut Vec<ValidationError>, message: String) {
    errors.push(ValidationError { message });
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &TrazarConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        err(
            &mut errors,
            format!("version must be \"1.0\", got \"{}\"", config.version),
        );
    }

    if config.name.is_empty() {
        err(&mut errors, "name must not be empty".to_string());
    }

    for (id, decl) in &config.resources {
        for dep in &decl.depends_on {
            if !config.resources.contains_key(dep) {
                err(
                    &mut errors,
                    format!("resource '{id}' depends on unknown resource '{dep}'"),
                );
            }
            if dep == id {
                err(&mut errors, format!("resource '{id}' depends on itself"));
            }
        }

        match decl.kind {
            ResourceKind::ImageRegistry => {
                if !decl.attributes.contains_key("repository_name") {
                    err(
                        &mut errors,
                        format!("resource '{id}' (image_registry) has no repository_name"),
                    );
                }
            }
            ResourceKind::BuildProject => {
                if !decl.attributes.contains_key("source_repo") {
                    err(
                        &mut errors,
                        format!("resource '{id}' (build_project) has no source_repo"),
                    );
                }
            }
            ResourceKind::PipelineStage => {
                err(
                    &mut errors,
                    format!(
                        "resource '{id}' declares kind pipeline_stage directly; \
                         stages are declared under `pipeline`"
                    ),
                );
            }
            _ => {}
        }
    }

    validate_networks(config, &mut errors);
    validate_transit(config, &mut errors);
    validate_pipeline(config, &mut errors);

    errors
}

fn kind_of(config: &TrazarConfig, id: &str) -> Option<ResourceKind> {
    config.resources.get(id).map(|d| d.kind)
}

fn validate_networks(config: &TrazarConfig, errors: &mut Vec<ValidationError>) {
    for (name, net) in &config.networks {
        match kind_of(config, &net.node) {
            None => err(
                errors,
                format!("network '{name}' references unknown node '{}'", net.node),
            ),
            Some(ResourceKind::Network) => {}
            Some(other) => err(
                errors,
                format!(
                    "network '{name}' node '{}' has kind {other}, expected network",
                    net.node
                ),
            ),
        }

        for subnet in &net.private_subnets {
            if !net.cidr_block.contains(subnet) {
                err(
                    errors,
                    format!(
                        "network '{name}' subnet {subnet} is outside block {}",
                        net.cidr_block
                    ),
                );
            }
        }
        for (i, a) in net.private_subnets.iter().enumerate() {
            for b in &net.private_subnets[i + 1..] {
                if a.overlaps(b) {
                    err(
                        errors,
                        format!("network '{name}' subnets {a} and {b} overlap"),
                    );
                }
            }
        }
    }
}

fn validate_transit(config: &TrazarConfig, errors: &mut Vec<ValidationError>) {
    let Some(transit) = &config.transit else {
        return;
    };

    match kind_of(config, &transit.router) {
        None => err(
            errors,
            format!("transit references unknown router '{}'", transit.router),
        ),
        Some(ResourceKind::TransitRouter) => {}
        Some(other) => err(
            errors,
            format!(
                "transit router '{}' has kind {other}, expected transit_router",
                transit.router
            ),
        ),
    }

    if transit.attachments.len() != 2 {
        err(
            errors,
            format!(
                "transit declares {} attachment(s), expected exactly 2",
                transit.attachments.len()
            ),
        );
    }

    for (net_name, att_id) in &transit.attachments {
        if !config.networks.contains_key(net_name) {
            err(
                errors,
                format!("transit attachment references unknown network '{net_name}'"),
            );
        }
        match kind_of(config, att_id) {
            None => err(
                errors,
                format!("transit references unknown attachment node '{att_id}'"),
            ),
            Some(ResourceKind::TransitAttachment) => {}
            Some(other) => err(
                errors,
                format!(
                    "transit attachment '{att_id}' has kind {other}, \
                     expected transit_attachment"
                ),
            ),
        }
    }
}

fn validate_pipeline(config: &TrazarConfig, errors: &mut Vec<ValidationError>) {
    let mut seen: Vec<&str> = Vec::new();
    for stage in &config.pipeline {
        if seen.contains(&stage.name.as_str()) {
            err(errors, format!("duplicate pipeline stage '{}'", stage.name));
        }
        seen.push(&stage.name);

        if config.resources.contains_key(&stage.name) {
            err(
                errors,
                format!(
                    "pipeline stage '{}' collides with a declared resource id",
                    stage.name
                ),
            );
        }

        if let Some(role_id) = &stage.execution_role {
            match kind_of(config, role_id) {
                None => err(
                    errors,
                    format!(
                        "stage '{}' references unknown execution role '{role_id}'",
                        stage.name
                    ),
                ),
                Some(ResourceKind::Role) => {}
                Some(other) => err(
                    errors,
                    format!(
                        "stage '{}' execution role '{role_id}' has kind {other}, expected role",
                        stage.name
                    ),
                ),
            }
        }

        for touched in &stage.touches {
            if !config.resources.contains_key(touched) {
                err(
                    errors,
                    format!(
                        "stage '{}' touches unknown resource '{touched}'",
                        stage.name
                    ),
                );
            }
        }
    }
}
