//! Route decoration
//!
//! Tasks gain two kinds of dashboard/indexing routes: treeherder
//! reporting routes derived from an environment table plus a
//! project/revision suffix, and index routes expanded from `{field}`
//! style templates declared in the route configuration file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{GantryError, Result};
use crate::jobs::BuildDefinition;
use crate::params::Namespace;
use crate::template::scalar_to_string;

/// `{field}` references inside a route template
static ROUTE_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("route field regex"));

/// Environment name to treeherder route prefix.
///
/// An immutable table passed to constructors rather than consulted as
/// ambient global state; unknown environments are hard errors.
#[derive(Debug, Clone)]
pub struct TreeherderRoutes {
    table: BTreeMap<String, String>,
}

impl Default for TreeherderRoutes {
    fn default() -> Self {
        let table = [
            ("staging".to_string(), "tc-treeherder-stage".to_string()),
            ("production".to_string(), "tc-treeherder".to_string()),
        ]
        .into_iter()
        .collect();
        Self { table }
    }
}

impl TreeherderRoutes {
    pub fn prefix(&self, env: &str) -> Result<&str> {
        self.table
            .get(env)
            .map(String::as_str)
            .ok_or_else(|| GantryError::UnknownTreeherderEnv {
                env: env.to_string(),
            })
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.table.values().map(String::as_str)
    }
}

/// Route templates loaded from the fixed route configuration document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub routes: Vec<String>,
}

impl RouteConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

/// Append treeherder reporting routes to a task payload.
///
/// No-op when the task has no `extra` block. Environments come from
/// `extra.treeherderEnv`, defaulting to staging only.
pub fn decorate_treeherder_routes(
    task: &mut Value,
    suffix: &str,
    routes: &TreeherderRoutes,
) -> Result<()> {
    let envs: Vec<String> = match task.get("extra") {
        None => return Ok(()),
        Some(extra) => match extra.get("treeherderEnv").and_then(Value::as_array) {
            Some(list) => list
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            None => vec!["staging".to_string()],
        },
    };

    for env in envs {
        let route = format!("{}.{}", routes.prefix(&env)?, suffix);
        push_route(task, route);
    }

    Ok(())
}

/// Append index routes expanded from `{field}` templates.
///
/// The substitution context is the caller's parameters plus the
/// build product and the build node's name and type. A template
/// referencing a missing field is a hard error.
pub fn decorate_json_routes(
    build: &BuildDefinition,
    task: &mut Value,
    route_templates: &[String],
    parameters: &Namespace,
) -> Result<()> {
    let build_product = task
        .pointer("/extra/build_product")
        .cloned()
        .ok_or_else(|| GantryError::MissingTaskField {
            task: build.task.clone(),
            field: "extra.build_product".to_string(),
        })?;

    let mut context = parameters.clone();
    context.insert("build_product".to_string(), build_product);
    context.insert("build_name".to_string(), json!(build.build_name));
    context.insert("build_type".to_string(), json!(build.build_type));

    for template in route_templates {
        let route = expand_route(template, &context)?;
        push_route(task, route);
    }

    Ok(())
}

fn expand_route(template: &str, context: &Namespace) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in ROUTE_FIELD_RE.captures_iter(template) {
        let whole = caps.get(0).expect("capture 0 always present");
        let field = &caps[1];
        let value = context
            .get(field)
            .ok_or_else(|| GantryError::MissingRouteField {
                template: template.to_string(),
                field: field.to_string(),
            })?;

        out.push_str(&template[last..whole.start()]);
        out.push_str(&scalar_to_string(field, value)?);
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

fn push_route(task: &mut Value, route: String) {
    if let Some(obj) = task.as_object_mut() {
        let routes = obj.entry("routes").or_insert_with(|| json!([]));
        if let Some(list) = routes.as_array_mut() {
            list.push(json!(route));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_node() -> BuildDefinition {
        serde_yaml::from_str(
            r#"
task: builds/linux64.yml
build_name: linux64
build_type: opt
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_treeherder_routes_noop_without_extra() {
        let mut task = json!({"workerType": "w"});
        let before = task.clone();
        decorate_treeherder_routes(&mut task, "try.abc", &TreeherderRoutes::default()).unwrap();
        assert_eq!(task, before);
    }

    #[test]
    fn test_treeherder_routes_default_staging() {
        let mut task = json!({"extra": {}});
        decorate_treeherder_routes(&mut task, "try.abc", &TreeherderRoutes::default()).unwrap();
        assert_eq!(task["routes"], json!(["tc-treeherder-stage.try.abc"]));
    }

    #[test]
    fn test_treeherder_routes_env_order_preserved() {
        let mut task = json!({
            "extra": {"treeherderEnv": ["staging", "production"]},
            "routes": ["existing"]
        });
        decorate_treeherder_routes(&mut task, "try.abc123", &TreeherderRoutes::default())
            .unwrap();
        assert_eq!(
            task["routes"],
            json!([
                "existing",
                "tc-treeherder-stage.try.abc123",
                "tc-treeherder.try.abc123"
            ])
        );
    }

    #[test]
    fn test_treeherder_routes_unknown_env_fails() {
        let mut task = json!({"extra": {"treeherderEnv": ["nightly"]}});
        let err =
            decorate_treeherder_routes(&mut task, "s", &TreeherderRoutes::default()).unwrap_err();
        assert!(matches!(err, GantryError::UnknownTreeherderEnv { env } if env == "nightly"));
    }

    #[test]
    fn test_json_routes_substitute_fields() {
        let mut task = json!({"extra": {"build_product": "b2g"}});
        let templates = vec!["index.{project}.{build_product}.{build_name}-{build_type}".to_string()];
        let params: Namespace = [("project".to_string(), json!("try"))].into_iter().collect();

        decorate_json_routes(&build_node(), &mut task, &templates, &params).unwrap();
        assert_eq!(task["routes"], json!(["index.try.b2g.linux64-opt"]));
    }

    #[test]
    fn test_json_routes_missing_field_fails() {
        let mut task = json!({"extra": {"build_product": "b2g"}});
        let templates = vec!["index.{revision}".to_string()];
        let err = decorate_json_routes(&build_node(), &mut task, &templates, &Namespace::new())
            .unwrap_err();
        assert!(matches!(err, GantryError::MissingRouteField { field, .. } if field == "revision"));
    }

    #[test]
    fn test_json_routes_require_build_product() {
        let mut task = json!({"extra": {}});
        let err = decorate_json_routes(&build_node(), &mut task, &[], &Namespace::new())
            .unwrap_err();
        assert!(matches!(err, GantryError::MissingTaskField { .. }));
    }

    #[test]
    fn test_route_config_accepts_json_and_yaml() {
        let parsed: RouteConfig =
            serde_yaml::from_str(r#"{"routes": ["index.{project}.latest"]}"#).unwrap();
        assert_eq!(parsed.routes, vec!["index.{project}.latest"]);
    }
}
