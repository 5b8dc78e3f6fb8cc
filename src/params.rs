//! Parameter model: flattening, merging and rendering
//!
//! A [`Namespace`] is the ordered key/value space every template is
//! substituted against. Nested task descriptors are flattened into
//! dotted keys (`root.task.workerType`) so downstream tasks can refer
//! to any field of an already-expanded ancestor.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{GantryError, Result};
use crate::template::{self, Delimiters};

/// Ordered mapping from dotted key to a JSON scalar or list value
pub type Namespace = BTreeMap<String, Value>;

/// Flatten a nested document into dotted keys.
///
/// Objects recurse; every other value (including lists) is retained
/// as-is at its key. Pure function, the input is never mutated.
pub fn flatten(document: &Value, prefix: &str) -> Namespace {
    let mut out = Namespace::new();
    flatten_into(document, prefix, &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut Namespace) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let dotted = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, &dotted, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

/// Return `base` with every key of `overrides` applied on top.
///
/// Later keys win; `base` is not mutated.
pub fn merge(base: &Namespace, overrides: &Namespace) -> Namespace {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Render a map of literal string parameters against a context.
///
/// Every value in `parameters` must be a string; anything else is a
/// contract violation. Placeholders resolve through `context` and an
/// unresolved placeholder is a hard error.
pub fn render(
    parameters: &BTreeMap<String, Value>,
    context: &Namespace,
    delimiters: &Delimiters,
) -> Result<Namespace> {
    let mut rendered = Namespace::new();

    for (key, value) in parameters {
        let text = value
            .as_str()
            .ok_or_else(|| GantryError::NonStringParameter { key: key.clone() })?;
        let resolved = template::render_str(text, context, delimiters)?;
        rendered.insert(key.clone(), Value::String(resolved));
    }

    Ok(rendered)
}
