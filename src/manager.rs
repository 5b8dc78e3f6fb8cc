//! Task graph manager — the graph-expansion engine
//!
//! Walks a tree of job definitions, resolves inherited and per-node
//! parameters, instantiates task templates, performs chunk fan-out and
//! appends every produced task plus its permission scopes to a shared
//! [`Graph`]. Expansion is depth-first and synchronous: parents are
//! always appended before the tasks that require them.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{GantryError, Result};
use crate::graph::Graph;
use crate::jobs::{BuildDefinition, PostTasks};
use crate::params::{self, Namespace};
use crate::routes::{
    decorate_json_routes, decorate_treeherder_routes, RouteConfig, TreeherderRoutes,
};
use crate::schema::SchemaValidator;
use crate::slugid::IdGen;
use crate::template::Delimiters;
use crate::templates::Templates;

/// Scope granting permission to define a task on a worker type
const DEFINE_TASK_SCOPE: &str = "queue:define-task:aws-provisioner-v1/";

/// Reserved parameter key carrying the current build task's identifier
pub const BUILD_SLUGID_KEY: &str = "build_slugid";

/// Command-line derived parameters the manager depends on
#[derive(Debug, Clone, Default)]
pub struct CmdlineParams {
    pub project: String,
    /// Treeherder revision hash; route decoration only happens when
    /// this is present
    pub revision_hash: Option<String>,
}

/// Treeherder metadata propagated from a build to all its descendants
#[derive(Debug, Clone, PartialEq)]
pub struct TreeherderConfig {
    pub collection: Map<String, Value>,
    pub build: Map<String, Value>,
    pub machine: Map<String, Value>,
}

/// Working state for one `configure` call.
///
/// Recomputed from scratch for every top-level build so nothing leaks
/// across sibling builds.
struct BuildContext {
    base_post_parameters: Namespace,
    treeherder: TreeherderConfig,
}

pub struct TaskGraphManager<'a> {
    graph: &'a mut Graph,
    templates: &'a Templates,
    validator: &'a SchemaValidator,
    build_parameters: Namespace,
    global_parameters: BTreeMap<String, BTreeMap<String, Value>>,
    json_routes: Vec<String>,
    treeherder_routes: TreeherderRoutes,
    revision_hash: Option<String>,
    treeherder_suffix: String,
    delimiters: Delimiters,
    ids: Box<dyn IdGen>,
}

impl<'a> TaskGraphManager<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        graph: &'a mut Graph,
        templates: &'a Templates,
        validator: &'a SchemaValidator,
        build_parameters: Namespace,
        global_parameters: BTreeMap<String, BTreeMap<String, Value>>,
        route_config: RouteConfig,
        treeherder_routes: TreeherderRoutes,
        cmdline: &CmdlineParams,
        ids: Box<dyn IdGen>,
    ) -> Self {
        let treeherder_suffix = format!(
            "{}.{}",
            cmdline.project,
            cmdline.revision_hash.as_deref().unwrap_or("")
        );

        Self {
            graph,
            templates,
            validator,
            build_parameters,
            global_parameters,
            json_routes: route_config.routes,
            treeherder_routes,
            revision_hash: cmdline.revision_hash.clone(),
            treeherder_suffix,
            delimiters: Delimiters::default(),
            ids,
        }
    }

    /// Expand one top-level build definition into the graph: the build
    /// task itself, then every declared post-task, recursively.
    pub fn configure(&mut self, name: &str, build: &BuildDefinition) -> Result<()> {
        info!(job = name, template = %build.task, "expanding build");

        let slug = self.ids.next();
        let mut build_parameters = self.build_parameters.clone();
        build_parameters.insert(BUILD_SLUGID_KEY.to_string(), json!(slug));

        let mut build_task = self.templates.load(&build.task, &build_parameters)?;
        set_task_id(&mut build_task, &slug);

        if self.revision_hash.is_some() {
            if let Some(payload) = build_task.get_mut("task") {
                decorate_treeherder_routes(
                    payload,
                    &self.treeherder_suffix,
                    &self.treeherder_routes,
                )?;
                decorate_json_routes(build, payload, &self.json_routes, &build_parameters)?;
            }
        }

        self.validator.validate(&build_task, &build.task)?;

        // Treeherder symbol configuration required for each build so
        // descendants report under the same platform. Must be coherent
        // before the task is admitted to the graph.
        let treeherder = extract_treeherder(&build_task, &build.task)?;
        if let Some(payload) = build_task.get_mut("task") {
            write_treeherder(payload, &treeherder);
        }

        let worker_type = require_worker_type(&build_task, &build.task)?;
        let mut scopes = vec![format!("{DEFINE_TASK_SCOPE}{worker_type}")];
        scopes.extend(payload_strings(&build_task, "scopes"));
        scopes.extend(
            payload_strings(&build_task, "routes")
                .into_iter()
                .map(|route| format!("queue:route:{route}")),
        );

        let base_post_parameters =
            params::merge(&build_parameters, &params::flatten(&build_task, "root"));

        self.graph.add_task(build_task.clone());
        for scope in scopes {
            self.graph.add_scope(scope);
        }

        let ctx = BuildContext {
            base_post_parameters,
            treeherder,
        };
        self.expand_post_tasks(&ctx, &build_task, &build.post_tasks)
    }

    /// Recursive post-task expansion.
    ///
    /// For a chunked post-task the last produced chunk becomes the
    /// parent for further nesting; see DESIGN.md for why.
    fn expand_post_tasks(
        &mut self,
        ctx: &BuildContext,
        parent_task: &Value,
        post_tasks: &PostTasks,
    ) -> Result<()> {
        if post_tasks.is_empty() {
            return Ok(());
        }

        let level =
            params::merge(&ctx.base_post_parameters, &params::flatten(parent_task, "parent"));

        for (name, post) in post_tasks.iter() {
            let template_path =
                post.task
                    .as_deref()
                    .ok_or_else(|| GantryError::MissingPostTaskTemplate {
                        name: name.clone(),
                    })?;

            // Literal parameters first, inherited sets second; later
            // inherited sets win on key collision.
            let mut post_parameters = params::merge(
                &level,
                &params::render(&post.parameters, &level, &self.delimiters)?,
            );
            for set_name in &post.inherit_parameters {
                let set = self.global_parameters.get(set_name).ok_or_else(|| {
                    GantryError::UnknownParameterSet {
                        name: set_name.clone(),
                    }
                })?;
                let rendered = params::render(set, &post_parameters, &self.delimiters)?;
                post_parameters = params::merge(&post_parameters, &rendered);
            }

            // Peek at the template with no parameters, purely to read
            // its declared chunk configuration.
            let pre_task = self.templates.peek(template_path)?;
            let declared_chunks = pre_task
                .pointer("/task/extra/chunks/total")
                .and_then(Value::as_u64);

            let produced = if let Some(declared_total) = declared_chunks {
                let total_chunks = match post_parameters.get("total_chunks") {
                    Some(value) => value_as_chunk_count(name, value)?,
                    None => {
                        post_parameters
                            .insert("total_chunks".to_string(), json!(declared_total));
                        value_as_chunk_count(name, &json!(declared_total))?
                    }
                };
                debug!(post_task = name.as_str(), total_chunks, "chunk fan-out");

                let mut last = None;
                for chunk in 1..=total_chunks {
                    post_parameters.insert("chunk".to_string(), json!(chunk));
                    last = Some(self.produce_dependent(
                        template_path,
                        &post_parameters,
                        ctx,
                        true,
                    )?);
                }
                last
            } else {
                Some(self.produce_dependent(template_path, &post_parameters, ctx, false)?)
            };

            if let Some(new_parent) = produced {
                self.expand_post_tasks(ctx, &new_parent, &post.post_tasks)?;
            }
        }

        Ok(())
    }

    /// Resolve one dependent task: fresh identifier, requires on the
    /// build task, treeherder metadata copied from the build, schema
    /// checked, then appended to the graph with its scopes.
    fn produce_dependent(
        &mut self,
        template_path: &str,
        parameters: &Namespace,
        ctx: &BuildContext,
        treeherder_route: bool,
    ) -> Result<Value> {
        let id = self.ids.next();
        let mut task = self.templates.load(template_path, parameters)?;
        set_task_id(&mut task, &id);

        if let Some(Value::String(build_slug)) = parameters.get(BUILD_SLUGID_KEY) {
            push_requires(&mut task, build_slug.clone());
        }

        if let Some(payload) = task.get_mut("task") {
            write_treeherder(payload, &ctx.treeherder);
            ensure_list(payload, "routes");
            ensure_list(payload, "scopes");

            if treeherder_route && self.revision_hash.is_some() {
                decorate_treeherder_routes(
                    payload,
                    &self.treeherder_suffix,
                    &self.treeherder_routes,
                )?;
            }
        }

        self.validator.validate(&task, template_path)?;

        let worker_type = require_worker_type(&task, template_path)?;
        let mut scopes = vec![format!("{DEFINE_TASK_SCOPE}{worker_type}")];
        scopes.extend(payload_strings(&task, "scopes"));

        self.graph.add_task(task.clone());
        for scope in scopes {
            self.graph.add_scope(scope);
        }

        Ok(task)
    }
}

fn set_task_id(task: &mut Value, id: &str) {
    if let Some(obj) = task.as_object_mut() {
        obj.insert("taskId".to_string(), json!(id));
    }
}

fn push_requires(task: &mut Value, upstream: String) {
    if let Some(obj) = task.as_object_mut() {
        let requires = obj.entry("requires").or_insert_with(|| json!([]));
        if let Some(list) = requires.as_array_mut() {
            list.push(json!(upstream));
        }
    }
}

fn ensure_list(payload: &mut Value, key: &str) {
    if let Some(obj) = payload.as_object_mut() {
        obj.entry(key).or_insert_with(|| json!([]));
    }
}

/// Collect the string entries of a list under the task payload
fn payload_strings(task: &Value, key: &str) -> Vec<String> {
    task.pointer(&format!("/task/{key}"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn require_worker_type(task: &Value, context: &str) -> Result<String> {
    task.pointer("/task/workerType")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GantryError::MissingTaskField {
            task: context.to_string(),
            field: "task.workerType".to_string(),
        })
}

/// Read `extra.treeherder` off a resolved build task, applying the
/// defaulting rules: `build` falls back to `machine`, `collection`
/// falls back to `{opt: true}`. Missing `machine` and a collection
/// without exactly one key are contract violations.
fn extract_treeherder(task: &Value, context: &str) -> Result<TreeherderConfig> {
    let block = task
        .pointer("/task/extra/treeherder")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let machine = block
        .get("machine")
        .and_then(Value::as_object)
        .cloned()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| GantryError::MissingTreeherderMachine {
            task: context.to_string(),
        })?;

    let build = block
        .get("build")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(|| machine.clone());

    let collection = match block.get("collection").and_then(Value::as_object) {
        Some(map) => map.clone(),
        None => [("opt".to_string(), json!(true))].into_iter().collect(),
    };

    if collection.len() != 1 {
        return Err(GantryError::MalformedCollection {
            task: context.to_string(),
            keys: collection.len(),
        });
    }

    Ok(TreeherderConfig {
        collection,
        build,
        machine,
    })
}

/// Overwrite the propagated treeherder keys on a task payload, keeping
/// whatever else the template declared (symbol, group names, ...)
fn write_treeherder(payload: &mut Value, config: &TreeherderConfig) {
    let Some(obj) = payload.as_object_mut() else {
        return;
    };
    let extra = obj
        .entry("extra")
        .or_insert_with(|| json!({}))
        .as_object_mut();
    let Some(extra) = extra else { return };
    let treeherder = extra
        .entry("treeherder")
        .or_insert_with(|| json!({}))
        .as_object_mut();
    let Some(treeherder) = treeherder else { return };

    treeherder.insert("collection".to_string(), Value::Object(config.collection.clone()));
    treeherder.insert("build".to_string(), Value::Object(config.build.clone()));
    treeherder.insert("machine".to_string(), Value::Object(config.machine.clone()));
}

fn value_as_chunk_count(name: &str, value: &Value) -> Result<u64> {
    let count = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    match count {
        Some(n) if n >= 1 => Ok(n),
        _ => Err(GantryError::InvalidChunkCount {
            name: name.to_string(),
        }),
    }
}
