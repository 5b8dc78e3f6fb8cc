//! Gantry - expands declarative CI job definitions into a task graph

pub mod commit;
pub mod error;
pub mod from_now;
pub mod graph;
pub mod jobs;
pub mod manager;
pub mod params;
pub mod routes;
pub mod schema;
pub mod slugid;
pub mod template;
pub mod templates;

pub use commit::parse_commit;
pub use error::{FixSuggestion, GantryError};
pub use graph::{Graph, GraphMetadata};
pub use jobs::{BuildDefinition, JobFile, PostTask, PostTasks};
pub use manager::{CmdlineParams, TaskGraphManager};
pub use params::Namespace;
pub use routes::{RouteConfig, TreeherderRoutes};
pub use schema::SchemaValidator;
pub use slugid::{IdGen, Slugid};
pub use templates::Templates;
