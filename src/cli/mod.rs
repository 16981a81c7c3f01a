//! CLI subcommands — init, validate, plan, emit.

use crate::core::{parser, planner, types};
use clap::Subcommand;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new trazar project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate trazar.yaml without planning
    Validate {
        /// Path to trazar.yaml
        #[arg(short, long, default_value = "trazar.yaml")]
        file: PathBuf,
    },

    /// Show the ordered plan (creation order, grants, routes, hand-offs)
    Plan {
        /// Path to trazar.yaml
        #[arg(short, long, default_value = "trazar.yaml")]
        file: PathBuf,

        /// YAML list of already-provisioned node ids (emit as update)
        #[arg(long)]
        provisioned: Option<PathBuf>,
    },

    /// Emit the full plan for the provisioning engine
    Emit {
        /// Path to trazar.yaml
        #[arg(short, long, default_value = "trazar.yaml")]
        file: PathBuf,

        /// Output format: json or yaml
        #[arg(long, default_value = "json")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// YAML list of already-provisioned node ids (emit as update)
        #[arg(long)]
        provisioned: Option<PathBuf>,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan { file, provisioned } => cmd_plan(&file, provisioned.as_deref()),
        Commands::Emit {
            file,
            format,
            out,
            provisioned,
        } => cmd_emit(&file, &format, out.as_deref(), provisioned.as_deref()),
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("trazar.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }

    let template = r#"version: "1.0"
name: my-deployment
description: "Planned by trazar"

context:
  account: "123456789012"
  region: us-west-2

resources:
  registry:
    kind: image_registry
    attributes:
      repository_name: my-app

networks: {}

pipeline: []
"#;
    std::fs::write(&config_path, template)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized trazar project at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file).map_err(|e| e.to_string())?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!(
            "OK: {} ({} resources, {} networks, {} stages)",
            config.name,
            config.resources.len(),
            config.networks.len(),
            config.pipeline.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

fn cmd_plan(file: &Path, provisioned: Option<&Path>) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    let provisioned = load_provisioned(provisioned)?;
    let plan = planner::plan_against(&config, &provisioned).map_err(|e| e.to_string())?;
    print_plan(&plan);
    Ok(())
}

fn cmd_emit(
    file: &Path,
    format: &str,
    out: Option<&Path>,
    provisioned: Option<&Path>,
) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    let provisioned = load_provisioned(provisioned)?;
    let plan = planner::plan_against(&config, &provisioned).map_err(|e| e.to_string())?;

    let rendered = match format {
        "json" => serde_json::to_string_pretty(&plan).map_err(|e| e.to_string())?,
        "yaml" => serde_yaml_ng::to_string(&plan).map_err(|e| e.to_string())?,
        other => return Err(format!("unknown format '{}' (expected json or yaml)", other)),
    };

    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
            println!("Wrote plan to {} ({})", path.display(), plan.fingerprint);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Parse and validate a trazar config file, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<types::TrazarConfig, String> {
    let config = parser::parse_config_file(file).map_err(|e| e.to_string())?;
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

/// Load the provisioned-node list: a YAML sequence of node ids.
fn load_provisioned(path: Option<&Path>) -> Result<BTreeSet<String>, String> {
    let Some(path) = path else {
        return Ok(BTreeSet::new());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let ids: Vec<String> = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("invalid provisioned list {}: {}", path.display(), e))?;
    Ok(ids.into_iter().collect())
}

/// Display a plan to stdout.
fn print_plan(plan: &types::Plan) {
    println!("Planning: {} ({} actions)", plan.name, plan.actions.len());
    println!();

    for action in &plan.actions {
        let symbol = match action.op {
            types::PlanOp::Create => "+",
            types::PlanOp::Update => "~",
        };
        println!("  {} {}", symbol, describe(&action.item));
    }

    println!();
    println!(
        "Plan: {} to create, {} to update.",
        plan.to_create, plan.to_update
    );
    println!("Fingerprint: {}", plan.fingerprint);
}

fn describe(item: &types::PlanItem) -> String {
    use types::PlanItem;
    match item {
        PlanItem::Node(n) => format!("{} [{}]", n.id, n.kind),
        PlanItem::Grant(g) => format!(
            "grant {} -> {} ({} action(s))",
            g.principal,
            g.resource,
            g.actions.len()
        ),
        PlanItem::Route(r) => format!(
            "route {} {} -> {}",
            r.network, r.source_subnet, r.destination
        ),
        PlanItem::Endpoint(e) => format!("endpoint {} in {}", e.service, e.network),
        PlanItem::Artifact(b) => format!(
            "artifact '{}' {} -> {}",
            b.artifact, b.from_stage, b.to_stage
        ),
    }
}
