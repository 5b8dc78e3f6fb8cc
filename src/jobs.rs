//! Job-definition input model
//!
//! A job file declares named build definitions plus globally shared
//! parameter sets. Build definitions nest post-tasks recursively;
//! declaration order of post-tasks is preserved because it determines
//! the order tasks are appended to the graph.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Top-level job file: global parameter sets plus named builds
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFile {
    /// Named parameter sets referenced by `inherit-parameters`
    #[serde(default)]
    pub parameters: BTreeMap<String, BTreeMap<String, Value>>,

    /// Named build definitions selectable from the commit message
    #[serde(default)]
    pub builds: BTreeMap<String, BuildDefinition>,
}

impl JobFile {
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&yaml)?)
    }
}

/// A root build node
#[derive(Debug, Clone, Deserialize)]
pub struct BuildDefinition {
    /// Template path of the build task
    pub task: String,

    pub build_name: String,
    pub build_type: String,

    #[serde(default, rename = "post-tasks")]
    pub post_tasks: PostTasks,
}

/// A dependent task declaration, recursively carrying its own post-tasks
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostTask {
    /// Template path; absent only for a null declaration, which fails
    /// at expansion time
    #[serde(default)]
    pub task: Option<String>,

    /// Literal overrides, rendered against ancestor parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,

    /// Names of global parameter sets to merge in, in list order
    #[serde(default, rename = "inherit-parameters")]
    pub inherit_parameters: Vec<String>,

    #[serde(default, rename = "post-tasks")]
    pub post_tasks: PostTasks,
}

/// Order-preserving mapping of post-task name to definition.
///
/// A null definition body deserializes as an empty one.
#[derive(Debug, Clone, Default)]
pub struct PostTasks(pub Vec<(String, PostTask)>);

impl PostTasks {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, PostTask)> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for PostTasks {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PostTasksVisitor;

        impl<'de> Visitor<'de> for PostTasksVisitor {
            type Value = PostTasks;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of post-task names to definitions")
            }

            fn visit_unit<E>(self) -> std::result::Result<Self::Value, E> {
                Ok(PostTasks::default())
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((name, def)) = map.next_entry::<String, Option<PostTask>>()? {
                    entries.push((name, def.unwrap_or_default()));
                }
                Ok(PostTasks(entries))
            }
        }

        deserializer.deserialize_any(PostTasksVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB_FILE: &str = r#"
parameters:
  defaults:
    locale: "en-US"

builds:
  linux64:
    task: builds/linux64.yml
    build_name: linux64
    build_type: opt
    post-tasks:
      mochitest:
        task: tests/mochitest.yml
        parameters:
          suite: "mochitest"
        inherit-parameters:
          - defaults
        post-tasks:
          upload: null
      reftest:
        task: tests/reftest.yml
"#;

    #[test]
    fn test_parse_job_file() {
        let jobs: JobFile = serde_yaml::from_str(JOB_FILE).unwrap();
        assert!(jobs.parameters.contains_key("defaults"));

        let build = &jobs.builds["linux64"];
        assert_eq!(build.task, "builds/linux64.yml");
        assert_eq!(build.build_type, "opt");
        assert_eq!(build.post_tasks.0.len(), 2);
    }

    #[test]
    fn test_post_tasks_preserve_declaration_order() {
        let jobs: JobFile = serde_yaml::from_str(JOB_FILE).unwrap();
        let names: Vec<&str> = jobs.builds["linux64"]
            .post_tasks
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["mochitest", "reftest"]);
    }

    #[test]
    fn test_null_post_task_is_empty() {
        let jobs: JobFile = serde_yaml::from_str(JOB_FILE).unwrap();
        let (name, upload) = &jobs.builds["linux64"].post_tasks.0[0].1.post_tasks.0[0];
        assert_eq!(name, "upload");
        assert!(upload.task.is_none());
        assert!(upload.post_tasks.is_empty());
    }

    #[test]
    fn test_inherit_parameters_keep_list_order() {
        let yaml = r#"
task: t.yml
inherit-parameters: [b, a, c]
"#;
        let post: PostTask = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(post.inherit_parameters, vec!["b", "a", "c"]);
    }
}
