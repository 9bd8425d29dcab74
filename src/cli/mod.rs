//! CG-040: CLI subcommands. Init, validate, permissions, plan, generate, status.

use crate::core::{executor, parser, planner, state, types};
use crate::permissions::{grants_for_schema, policy, StaticLibraryIndex};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new cloudgen project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate app.yaml without generating anything
    Validate {
        /// Path to app.yaml
        #[arg(short, long, default_value = "app.yaml")]
        file: PathBuf,
    },

    /// Show aggregated permissions per lambda
    Permissions {
        /// Path to app.yaml
        #[arg(short, long, default_value = "app.yaml")]
        file: PathBuf,

        /// Extra library declarations (YAML list)
        #[arg(short, long)]
        library: Option<PathBuf>,
    },

    /// Show what a generation would change (diff against stored graph)
    Plan {
        /// Path to app.yaml
        #[arg(short, long, default_value = "app.yaml")]
        file: PathBuf,

        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,

        /// Extra library declarations (YAML list)
        #[arg(short, long)]
        library: Option<PathBuf>,
    },

    /// Generate the resource graph and write it to the output directory
    Generate {
        /// Path to app.yaml
        #[arg(short, long, default_value = "app.yaml")]
        file: PathBuf,

        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,

        /// Extra library declarations (YAML list)
        #[arg(short, long)]
        library: Option<PathBuf>,
    },

    /// Show the stored graph
    Status {
        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Permissions { file, library } => cmd_permissions(&file, library.as_deref()),
        Commands::Plan { file, out, library } => cmd_plan(&file, &out, library.as_deref()),
        Commands::Generate { file, out, library } => cmd_generate(&file, &out, library.as_deref()),
        Commands::Status { out } => cmd_status(&out),
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let schema_path = path.join("app.yaml");
    if schema_path.exists() {
        return Err(format!("{} already exists", schema_path.display()));
    }

    let out_dir = path.join("out");
    std::fs::create_dir_all(&out_dir).map_err(|e| format!("cannot create out dir: {}", e))?;

    let template = r#"version: "1.0"
name: my-app
description: "Generated by cloudgen"
platform: aws
region: us-east-1
account: "000000000000"

api:
  name: my-api
  allow_cors: false

lambdas: {}

routes:
  dynamic: []
  static: []

events:
  scheduled: []
"#;
    std::fs::write(&schema_path, template)
        .map_err(|e| format!("cannot write {}: {}", schema_path.display(), e))?;

    println!("Initialized cloudgen project at {}", path.display());
    println!("  Created: {}", schema_path.display());
    println!("  Created: {}/", out_dir.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let schema = parser::parse_schema_file(file)?;
    let errors = parser::validate_schema(&schema);

    if errors.is_empty() {
        println!(
            "OK: {} ({}, {} lambdas, {} routes, {} timers)",
            schema.name,
            schema.platform,
            schema.lambdas.len(),
            schema.routes.dynamic.len() + schema.routes.statics.len(),
            schema.events.scheduled.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate an app.yaml file, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<types::Schema, String> {
    let schema = parser::parse_schema_file(file)?;
    let errors = parser::validate_schema(&schema);
    if errors.is_empty() {
        return Ok(schema);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

/// Library index from the schema plus an optional declarations file.
fn load_library(schema: &types::Schema, library: Option<&Path>) -> Result<StaticLibraryIndex, String> {
    let index = StaticLibraryIndex::from_schema(schema);
    match library {
        Some(path) => Ok(index.merge(StaticLibraryIndex::load(path)?)),
        None => Ok(index),
    }
}

fn cmd_permissions(file: &Path, library: Option<&Path>) -> Result<(), String> {
    let schema = parse_and_validate(file)?;
    let index = load_library(&schema, library)?;
    let grants = grants_for_schema(&schema, &index).map_err(|e| e.to_string())?;

    for (lambda, set) in &grants {
        println!("{} ({} grants):", lambda, set.len());
        for grant in set {
            println!("  {}", grant);
        }
        match schema.platform {
            types::Platform::Aws => {
                let document = policy::aws_policy(set, &schema.region, &schema.account);
                println!("  policy: {} statement(s)", document.statement.len());
            }
            types::Platform::Azure => {
                for role in policy::azure_roles(set, &schema.account) {
                    println!("  role: {} @ {}", role.role, role.scope);
                }
            }
        }
    }
    if grants.is_empty() {
        println!("No lambdas declared.");
    }
    Ok(())
}

fn cmd_plan(file: &Path, out: &Path, library: Option<&Path>) -> Result<(), String> {
    let schema = parse_and_validate(file)?;
    let index = load_library(&schema, library)?;
    let result = executor::generate(&schema, &index).map_err(|e| e.to_string())?;

    let stored = state::load_graph(out)?;
    let plan = planner::plan(&schema.name, &result.resources, stored.as_ref());
    print_plan(&plan);
    Ok(())
}

/// Display a plan to stdout.
fn print_plan(plan: &planner::GenerationPlan) {
    println!("Planning: {} ({} resources)", plan.app, plan.changes.len());
    println!();

    for change in &plan.changes {
        let symbol = match change.action {
            planner::PlanAction::Create => "+",
            planner::PlanAction::Update => "~",
            planner::PlanAction::Destroy => "-",
            planner::PlanAction::NoOp => " ",
        };
        println!("  {} {}", symbol, change.description);
    }

    println!();
    println!(
        "Plan: {} to add, {} to change, {} to destroy, {} unchanged.",
        plan.to_create, plan.to_update, plan.to_destroy, plan.unchanged
    );
}

fn cmd_generate(file: &Path, out: &Path, library: Option<&Path>) -> Result<(), String> {
    let schema = parse_and_validate(file)?;
    let index = load_library(&schema, library)?;
    let result = executor::generate(&schema, &index).map_err(|e| e.to_string())?;

    let sweeps = result.report.sweeps;
    let graph = result.into_graph(&schema.name);
    let path = state::save_graph(out, &graph)?;

    println!(
        "Generated {} resources, {} outputs in {} sweep(s)",
        graph.resources.len(),
        graph.outputs.outputs.len(),
        sweeps
    );
    println!("  Digest: {}", graph.digest);
    println!("  Wrote: {}", path.display());
    Ok(())
}

fn cmd_status(out: &Path) -> Result<(), String> {
    let Some(graph) = state::load_graph(out)? else {
        println!("No graph found. Run `cloudgen generate` first.");
        return Ok(());
    };

    println!("App: {}", graph.app);
    println!("  Generated: {}", graph.generated_at);
    println!("  Generator: {}", graph.generator);
    println!("  Digest: {}", graph.digest);
    println!("  Resources: {}", graph.resources.len());

    let mut kinds: indexmap::IndexMap<&str, usize> = indexmap::IndexMap::new();
    for resource in &graph.resources {
        *kinds.entry(resource.kind.as_str()).or_default() += 1;
    }
    kinds.sort_keys();
    for (kind, count) in &kinds {
        println!("    {}: {}", kind, count);
    }
    println!("  Outputs: {}", graph.outputs.outputs.len());
    Ok(())
}
