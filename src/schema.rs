//! Wire-schema validation of produced task descriptors
//!
//! Every task is checked against the embedded JSON Schema before it is
//! admitted to the graph. A validation failure aborts the whole run.

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{GantryError, Result};

/// Embedded wire schema for a single task envelope
const SCHEMA_JSON: &str = include_str!("../schemas/task.schema.json");

/// Compiled task schema validator
pub struct SchemaValidator {
    validator: Validator,
}

impl SchemaValidator {
    pub fn new() -> Result<Self> {
        let schema: Value = serde_json::from_str(SCHEMA_JSON)?;
        let validator = Validator::new(&schema).map_err(|e| GantryError::SchemaCompile {
            reason: e.to_string(),
        })?;
        Ok(Self { validator })
    }

    /// Validate one task envelope; `context` names the offending
    /// template in the error.
    pub fn validate(&self, task: &Value, context: &str) -> Result<()> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(task)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GantryError::SchemaValidation {
                task: context.to_string(),
                errors,
            })
        }
    }
}
