//! Integration tests for the gantry CLI
//!
//! These run the actual binary against a fixture template tree and
//! verify the emitted JSON.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn gantry_cmd() -> Command {
    Command::cargo_bin("gantry").unwrap()
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let files: &[(&str, &str)] = &[
        (
            "builds/linux64.yml",
            r#"
task:
  workerType: b2gbuild
  scopes:
    - 'docker-worker:image:builder'
  extra:
    build_product: b2g
    treeherder:
      machine:
        platform: linux64
  metadata:
    owner: '<% owner %>'
    source: '<% head_repository %>'
    created: '<% now %>'
"#,
        ),
        (
            "tests/mochitest.yml",
            r#"
task:
  workerType: b2gtest
  extra:
    chunks:
      total: 2
  payload:
    chunk: '<% chunk %>'
"#,
        ),
        (
            "jobs.yml",
            r#"
builds:
  linux64:
    task: builds/linux64.yml
    build_name: linux64
    build_type: opt
    post-tasks:
      mochitest:
        task: tests/mochitest.yml
"#,
        ),
        (
            "routes.json",
            r#"{"routes": ["index.{project}.{build_product}.{build_name}-{build_type}"]}"#,
        ),
    ];
    for (path, content) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    dir
}

fn graph_args(dir: &TempDir) -> Vec<String> {
    [
        "graph",
        "--project",
        "try",
        "--message",
        "try: -b o -p linux64",
        "--owner",
        "dev@example.com",
        "--head-repository",
        "https://hg.example.org/try",
        "--head-rev",
        "deadbeef",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain([
        "--templates".to_string(),
        dir.path().display().to_string(),
        "--jobs".to_string(),
        dir.path().join("jobs.yml").display().to_string(),
    ])
    .collect()
}

#[test]
fn test_help_flag() {
    gantry_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Expand declarative CI job definitions",
        ));
}

#[test]
fn test_graph_emits_expected_task_count() {
    let dir = fixture();
    let output = gantry_cmd().args(graph_args(&dir)).output().unwrap();
    assert!(output.status.success(), "{:?}", output);

    let graph: Value = serde_json::from_slice(&output.stdout).unwrap();
    let tasks = graph["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 3);
    assert_eq!(graph["metadata"]["owner"], "dev@example.com");
    assert_eq!(graph["metadata"]["name"], "task graph local");

    // No revision hash: the build task gains no routes at all
    assert!(tasks[0]["task"].get("routes").is_none());
}

#[test]
fn test_graph_with_revision_hash_decorates_and_scopes() {
    let dir = fixture();
    let mut args = graph_args(&dir);
    args.extend(["--revision-hash".to_string(), "abc123".to_string()]);

    let output = gantry_cmd().args(args).output().unwrap();
    assert!(output.status.success(), "{:?}", output);

    let graph: Value = serde_json::from_slice(&output.stdout).unwrap();
    let routes = graph["tasks"][0]["task"]["routes"].as_array().unwrap();
    assert!(routes.iter().any(|r| r == "tc-treeherder-stage.try.abc123"));
    assert!(routes.iter().any(|r| r == "index.try.b2g.linux64-opt"));

    let scopes = graph["scopes"].as_array().unwrap();
    assert!(scopes
        .iter()
        .any(|s| s == "queue:route:tc-treeherder.try.abc123"));
    // Deduplicated: every scope appears once
    let mut seen = std::collections::HashSet::new();
    assert!(scopes.iter().all(|s| seen.insert(s.as_str().unwrap())));
}

#[test]
fn test_extend_graph_omits_scopes_and_metadata() {
    let dir = fixture();
    let mut args = graph_args(&dir);
    args.push("--extend-graph".to_string());

    let output = gantry_cmd().args(args).output().unwrap();
    assert!(output.status.success(), "{:?}", output);

    let graph: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(graph.get("scopes").is_none());
    assert!(graph.get("metadata").is_none());
    assert_eq!(graph["tasks"].as_array().unwrap().len(), 3);
}

#[test]
fn test_graph_unknown_job_fails_with_suggestion() {
    let dir = fixture();
    let mut args = graph_args(&dir);
    let pos = args.iter().position(|a| a == "try: -b o -p linux64").unwrap();
    args[pos] = "try: -b o -p win64".to_string();

    gantry_cmd()
        .args(args)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown job 'win64'"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_try_without_message_fails() {
    let dir = fixture();
    let args = graph_args(&dir);
    let filtered: Vec<String> = {
        let mut out = Vec::new();
        let mut skip = false;
        for arg in args {
            if skip {
                skip = false;
                continue;
            }
            if arg == "--message" {
                skip = true;
                continue;
            }
            out.push(arg);
        }
        out
    };

    gantry_cmd()
        .args(filtered)
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires --message"));
}

#[test]
fn test_build_subcommand_prints_task_payload() {
    let dir = fixture();
    let output = gantry_cmd()
        .args([
            "build",
            "--head-repository",
            "https://hg.example.org/try",
            "--head-rev",
            "deadbeef",
            "--templates",
            &dir.path().display().to_string(),
            "builds/linux64.yml",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    let task: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(task["workerType"], "b2gbuild");
    assert_eq!(task["metadata"]["source"], "https://hg.example.org/try");
}

#[test]
fn test_build_missing_template_fails() {
    let dir = fixture();
    gantry_cmd()
        .args([
            "build",
            "--head-repository",
            "https://hg.example.org/try",
            "--head-rev",
            "deadbeef",
            "--templates",
            &dir.path().display().to_string(),
            "builds/nope.yml",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load template"));
}
