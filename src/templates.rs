//! Template resolver: loads YAML task templates from disk and renders
//! placeholders into a concrete task descriptor.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{GantryError, Result};
use crate::params::Namespace;
use crate::template::{self, Delimiters};

/// Loads task templates relative to a root directory
pub struct Templates {
    root: PathBuf,
    delimiters: Delimiters,
}

impl Templates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            delimiters: Delimiters::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a template, substitute all placeholders and parse the
    /// result into a structured task descriptor.
    ///
    /// Missing files and unresolved placeholders are hard errors.
    pub fn load(&self, path: &str, parameters: &Namespace) -> Result<Value> {
        let raw = self.read(path)?;
        let rendered = template::render_str(&raw, parameters, &self.delimiters)?;
        self.parse(path, &rendered)
    }

    /// Load a template with unresolved placeholders blanked out.
    ///
    /// Only the template's embedded defaults (chunk counts in
    /// particular) survive this pass; the result is never admitted to
    /// a graph.
    pub fn peek(&self, path: &str) -> Result<Value> {
        let raw = self.read(path)?;
        let rendered =
            template::render_str_lenient(&raw, &Namespace::new(), &self.delimiters)?;
        self.parse(path, &rendered)
    }

    fn read(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        fs::read_to_string(&full).map_err(|e| GantryError::TemplateLoad {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn parse(&self, path: &str, rendered: &str) -> Result<Value> {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(rendered).map_err(|e| GantryError::TemplateLoad {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        serde_json::to_value(yaml).map_err(|e| GantryError::TemplateLoad {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}
