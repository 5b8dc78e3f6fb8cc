//! Gantry CLI - CI task graph generator

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;

use gantry::error::Result;
use gantry::from_now::{current_json_time, json_time_from_now};
use gantry::manager::BUILD_SLUGID_KEY;
use gantry::{
    parse_commit, CmdlineParams, FixSuggestion, GantryError, Graph, GraphMetadata, JobFile,
    Namespace, RouteConfig, SchemaValidator, Slugid, TaskGraphManager, Templates, TreeherderRoutes,
};
use gantry::slugid::IdGen;

/// Job selection used for every non-try project
const DEFAULT_TRY: &str = "try: -b do -p all";

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Expand declarative CI job definitions into a task graph")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the task graph for a push and print it as JSON
    Graph {
        /// Project the graph is built for, e.g. try
        #[arg(long)]
        project: String,

        /// Commit message carrying the try syntax job selection
        #[arg(long)]
        message: Option<String>,

        /// Email address of who owns this graph
        #[arg(long)]
        owner: String,

        /// Treeherder revision hash to attach results to
        #[arg(long)]
        revision_hash: Option<String>,

        /// URL for the "base" repository to clone
        #[arg(long)]
        base_repository: Option<String>,

        /// URL for the "head" repository to fetch the revision from
        #[arg(long)]
        head_repository: String,

        /// Reference in the head repository (defaults to the revision)
        #[arg(long)]
        head_ref: Option<String>,

        /// Commit revision to use from the head repository
        #[arg(long)]
        head_rev: String,

        #[arg(long, default_value_t = 0)]
        pushlog_id: u64,

        /// Template root directory
        #[arg(long, default_value = ".")]
        templates: PathBuf,

        /// Job file path; defaults to a per-project file under the
        /// template root, falling back to tasks/branches/base_jobs.yml
        #[arg(long)]
        jobs: Option<PathBuf>,

        /// Route configuration document
        #[arg(long)]
        routes: Option<PathBuf>,

        /// Emit only the task list, omitting scopes and metadata
        #[arg(long)]
        extend_graph: bool,
    },

    /// Resolve and print a single build task (no graph)
    Build {
        #[arg(long, default_value = "dev@localhost")]
        owner: String,

        #[arg(long)]
        base_repository: Option<String>,

        #[arg(long)]
        head_repository: String,

        #[arg(long)]
        head_ref: Option<String>,

        #[arg(long)]
        head_rev: String,

        /// Template root directory
        #[arg(long, default_value = ".")]
        templates: PathBuf,

        /// Path to the build task template, relative to the root
        build_task: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Graph { .. } => create_graph(cli.command),
        Commands::Build { .. } => create_build(cli.command),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

/// Shared substitution values derived from repository coordinates
fn repository_parameters(
    owner: &str,
    base_repository: Option<&str>,
    head_repository: &str,
    head_ref: Option<&str>,
    head_rev: &str,
) -> Result<Namespace> {
    let parameters: Namespace = [
        ("owner".to_string(), json!(owner)),
        (
            "base_repository".to_string(),
            json!(base_repository.unwrap_or(head_repository)),
        ),
        ("head_repository".to_string(), json!(head_repository)),
        ("head_ref".to_string(), json!(head_ref.unwrap_or(head_rev))),
        ("head_rev".to_string(), json!(head_rev)),
        ("now".to_string(), json!(current_json_time())),
        ("deadline".to_string(), json!(json_time_from_now("24 hours")?)),
        ("expires".to_string(), json!(json_time_from_now("14 days")?)),
    ]
    .into_iter()
    .collect();
    Ok(parameters)
}

fn create_graph(command: Commands) -> Result<()> {
    let Commands::Graph {
        project,
        message,
        owner,
        revision_hash,
        base_repository,
        head_repository,
        head_ref,
        head_rev,
        pushlog_id,
        templates,
        jobs,
        routes,
        extend_graph,
    } = command
    else {
        unreachable!("dispatched on variant");
    };

    // Message is only honored on try; every other project expands the
    // full default selection.
    let message = if project == "try" {
        message.ok_or_else(|| GantryError::TrySyntax {
            details: "creating a try graph requires --message".to_string(),
        })?
    } else {
        DEFAULT_TRY.to_string()
    };

    let jobs = jobs.unwrap_or_else(|| {
        let per_project = templates
            .join("tasks/branches")
            .join(&project)
            .join("job_flags.yml");
        if per_project.exists() {
            per_project
        } else {
            templates.join("tasks/branches/base_jobs.yml")
        }
    });
    let job_file = JobFile::load(&jobs)?;
    let job_graph = parse_commit(&message, &job_file)?;

    let revision_hash = revision_hash.filter(|h| !h.is_empty());
    let route_config = RouteConfig::load(&routes.unwrap_or_else(|| templates.join("routes.json")))?;
    let treeherder_routes = TreeherderRoutes::default();

    let mut parameters = repository_parameters(
        &owner,
        base_repository.as_deref(),
        &head_repository,
        head_ref.as_deref(),
        &head_rev,
    )?;
    parameters.insert("project".to_string(), json!(project));
    parameters.insert("pushlog_id".to_string(), json!(pushlog_id.to_string()));
    parameters.insert(
        "revision_hash".to_string(),
        json!(revision_hash.as_deref().unwrap_or("")),
    );

    let mut graph = Graph::new(GraphMetadata {
        source: head_repository.clone(),
        owner: owner.clone(),
        description: "Task graph generated via gantry graph".to_string(),
        name: "task graph local".to_string(),
    });

    // The graph itself needs the treeherder route scopes up front when
    // results are reported against a revision hash.
    if let Some(hash) = &revision_hash {
        let suffix = format!("{project}.{hash}");
        for prefix in treeherder_routes.prefixes() {
            graph.add_scope(format!("queue:route:{prefix}.{suffix}"));
        }
    }

    let template_store = Templates::new(&templates);
    let validator = SchemaValidator::new()?;
    let cmdline = CmdlineParams {
        project,
        revision_hash,
    };

    let mut manager = TaskGraphManager::new(
        &mut graph,
        &template_store,
        &validator,
        parameters,
        job_file.parameters.clone(),
        route_config,
        treeherder_routes,
        &cmdline,
        Box::new(Slugid),
    );
    for (name, build) in &job_graph {
        manager.configure(name, build)?;
    }
    drop(manager);

    graph.dedup_scopes();

    let output = if extend_graph {
        json!({ "tasks": graph.tasks })
    } else {
        serde_json::to_value(&graph)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn create_build(command: Commands) -> Result<()> {
    let Commands::Build {
        owner,
        base_repository,
        head_repository,
        head_ref,
        head_rev,
        templates,
        build_task,
    } = command
    else {
        unreachable!("dispatched on variant");
    };

    let mut parameters = repository_parameters(
        &owner,
        base_repository.as_deref(),
        &head_repository,
        head_ref.as_deref(),
        &head_rev,
    )?;
    let slug = Slugid.next();
    parameters.insert(BUILD_SLUGID_KEY.to_string(), json!(slug));

    let template_store = Templates::new(&templates);
    let mut task = template_store.load(&build_task, &parameters)?;
    if let Some(obj) = task.as_object_mut() {
        obj.entry("taskId").or_insert_with(|| json!(slug));
    }

    SchemaValidator::new()?.validate(&task, &build_task)?;
    println!("{}", serde_json::to_string_pretty(&task["task"])?);

    Ok(())
}
