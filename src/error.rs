//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

pub type Result<T> = std::result::Result<T, GantryError>;

/// Every failure in graph expansion is a configuration or input error;
/// nothing here is retried, expansion always aborts on the first error.
#[derive(Error, Debug)]
pub enum GantryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to load template '{path}': {reason}")]
    TemplateLoad { path: String, reason: String },

    #[error("Placeholder opened at byte {position} is never closed")]
    UnclosedPlaceholder { position: usize },

    #[error("Unresolved placeholder '{key}'")]
    UnresolvedPlaceholder { key: String },

    #[error("Placeholder '{key}' resolves to a non-scalar value")]
    NonScalarPlaceholder { key: String },

    #[error("Parameter '{key}' must be a string to be rendered")]
    NonStringParameter { key: String },

    #[error("Unknown treeherder environment '{env}'")]
    UnknownTreeherderEnv { env: String },

    #[error("Route template '{template}' references missing field '{field}'")]
    MissingRouteField { template: String, field: String },

    #[error("({task}): missing required field '{field}'")]
    MissingTaskField { task: String, field: String },

    #[error("({task}): extra.treeherder.machine required for all builds")]
    MissingTreeherderMachine { task: String },

    #[error("({task}): extra.treeherder.collection must contain exactly one type, found {keys}")]
    MalformedCollection { task: String, keys: usize },

    #[error("Unknown parameter set '{name}' in inherit-parameters")]
    UnknownParameterSet { name: String },

    #[error("Post-task '{name}' does not declare a task template")]
    MissingPostTaskTemplate { name: String },

    #[error("Unknown job '{name}' in commit message")]
    UnknownJob { name: String },

    #[error("Invalid try syntax: {details}")]
    TrySyntax { details: String },

    #[error("Invalid time offset '{offset}'")]
    InvalidTimeOffset { offset: String },

    #[error("Post-task '{name}' declares an invalid chunk count")]
    InvalidChunkCount { name: String },

    #[error("Failed to compile task schema: {reason}")]
    SchemaCompile { reason: String },

    #[error("({task}): schema validation failed:\n{}", .errors.join("\n"))]
    SchemaValidation { task: String, errors: Vec<String> },
}

impl FixSuggestion for GantryError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            GantryError::Io(_) => Some("Check file path and permissions"),
            GantryError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            GantryError::JsonParse(_) => Some("Check JSON syntax"),
            GantryError::TemplateLoad { .. } => {
                Some("Template paths are relative to the template root directory")
            }
            GantryError::UnclosedPlaceholder { .. } => {
                Some("Close the placeholder with the matching delimiter, e.g. <% key %>")
            }
            GantryError::UnresolvedPlaceholder { .. } => {
                Some("Declare the key in parameters or inherit-parameters before using it")
            }
            GantryError::NonScalarPlaceholder { .. } => {
                Some("Only strings, numbers and booleans can be substituted into templates")
            }
            GantryError::NonStringParameter { .. } => {
                Some("Literal parameter values in job definitions must be strings")
            }
            GantryError::UnknownTreeherderEnv { .. } => {
                Some("Valid treeherderEnv values are 'staging' and 'production'")
            }
            GantryError::MissingRouteField { .. } => {
                Some("Add the field to the build definition or template extra block")
            }
            GantryError::MissingTaskField { .. } => Some("Add the field to the task template"),
            GantryError::MissingTreeherderMachine { .. } => {
                Some("Add extra.treeherder.machine to the build task template")
            }
            GantryError::MalformedCollection { .. } => {
                Some("Use a single-key collection such as {opt: true} or {debug: true}")
            }
            GantryError::UnknownParameterSet { .. } => {
                Some("Declare the set under top-level 'parameters' in the job file")
            }
            GantryError::MissingPostTaskTemplate { .. } => {
                Some("Every post-task needs a 'task' key pointing at a template")
            }
            GantryError::UnknownJob { .. } => {
                Some("Job names in -p must match entries under 'builds' in the job file")
            }
            GantryError::TrySyntax { .. } => {
                Some("Expected commit syntax: try: -b do -p job1,job2")
            }
            GantryError::InvalidTimeOffset { .. } => {
                Some("Use offsets like '1 day', '2 hours 30 minutes' or '1 year'")
            }
            GantryError::InvalidChunkCount { .. } => {
                Some("total_chunks must be a positive integer")
            }
            GantryError::SchemaCompile { .. } => None,
            GantryError::SchemaValidation { .. } => {
                Some("Fix the task template to match the wire schema")
            }
        }
    }
}
