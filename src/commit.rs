//! Commit-message job selection
//!
//! Parses the try syntax (`try: -b do -p linux64,macosx64`) into the
//! list of build definitions the graph should expand. This is the only
//! component that sees the raw commit message; the task graph manager
//! receives fully resolved build definitions.

use crate::error::{GantryError, Result};
use crate::jobs::{BuildDefinition, JobFile};

#[derive(Debug, Clone, Copy, Default)]
struct BuildTypes {
    opt: bool,
    debug: bool,
}

impl BuildTypes {
    fn selects(&self, build_type: &str) -> bool {
        match build_type {
            "opt" => self.opt,
            "debug" => self.debug,
            // Types outside the -b vocabulary are always selected
            _ => true,
        }
    }
}

/// Select the builds requested by a commit message.
///
/// `-b` takes any combination of `d` (debug) and `o` (opt); `-p` takes
/// `all` or a comma-separated list of job names. Without `-p` nothing
/// is selected. Unknown job names are hard errors.
pub fn parse_commit(message: &str, jobs: &JobFile) -> Result<Vec<(String, BuildDefinition)>> {
    let args = message
        .lines()
        .find_map(|line| line.find("try:").map(|at| &line[at + 4..]))
        .ok_or_else(|| GantryError::TrySyntax {
            details: "no 'try:' marker in commit message".to_string(),
        })?;

    let mut types = BuildTypes {
        opt: true,
        debug: true,
    };
    let mut platforms: Option<String> = None;

    let mut tokens = args.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        match token {
            "-b" | "--build" => {
                let spec = tokens.next().ok_or_else(|| GantryError::TrySyntax {
                    details: "-b requires an argument".to_string(),
                })?;
                types = parse_build_types(spec)?;
            }
            "-p" | "--platform" => {
                let spec = tokens.next().ok_or_else(|| GantryError::TrySyntax {
                    details: "-p requires an argument".to_string(),
                })?;
                platforms = Some(spec.to_string());
            }
            flag if flag.starts_with('-') => {
                // Unrecognized flag: skip its value if it has one
                if tokens.peek().is_some_and(|next| !next.starts_with('-')) {
                    tokens.next();
                }
            }
            _ => {}
        }
    }

    let Some(platforms) = platforms else {
        return Ok(Vec::new());
    };

    let mut selected = Vec::new();
    if platforms == "all" {
        for (name, build) in &jobs.builds {
            if types.selects(&build.build_type) {
                selected.push((name.clone(), build.clone()));
            }
        }
    } else {
        for name in platforms.split(',').filter(|n| !n.is_empty()) {
            let build = jobs
                .builds
                .get(name)
                .ok_or_else(|| GantryError::UnknownJob {
                    name: name.to_string(),
                })?;
            if types.selects(&build.build_type) {
                selected.push((name.to_string(), build.clone()));
            }
        }
    }

    Ok(selected)
}

fn parse_build_types(spec: &str) -> Result<BuildTypes> {
    let mut types = BuildTypes::default();
    for c in spec.chars() {
        match c {
            'o' => types.opt = true,
            'd' => types.debug = true,
            other => {
                return Err(GantryError::TrySyntax {
                    details: format!("unknown build type '{other}' in -b {spec}"),
                })
            }
        }
    }
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_file() -> JobFile {
        serde_yaml::from_str(
            r#"
builds:
  linux64:
    task: builds/linux64.yml
    build_name: linux64
    build_type: opt
  linux64-debug:
    task: builds/linux64-debug.yml
    build_name: linux64
    build_type: debug
  macosx64:
    task: builds/macosx64.yml
    build_name: macosx64
    build_type: opt
"#,
        )
        .unwrap()
    }

    fn names(selected: &[(String, BuildDefinition)]) -> Vec<&str> {
        selected.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn test_select_all() {
        let selected = parse_commit("try: -b do -p all", &job_file()).unwrap();
        assert_eq!(names(&selected), vec!["linux64", "linux64-debug", "macosx64"]);
    }

    #[test]
    fn test_select_named_jobs() {
        let selected = parse_commit("try: -b do -p linux64,macosx64", &job_file()).unwrap();
        assert_eq!(names(&selected), vec!["linux64", "macosx64"]);
    }

    #[test]
    fn test_build_type_filter() {
        let selected = parse_commit("try: -b d -p all", &job_file()).unwrap();
        assert_eq!(names(&selected), vec!["linux64-debug"]);
    }

    #[test]
    fn test_unknown_job_fails() {
        let err = parse_commit("try: -p win64", &job_file()).unwrap_err();
        assert!(matches!(err, GantryError::UnknownJob { name } if name == "win64"));
    }

    #[test]
    fn test_missing_marker_fails() {
        assert!(matches!(
            parse_commit("fix the build", &job_file()),
            Err(GantryError::TrySyntax { .. })
        ));
    }

    #[test]
    fn test_no_platforms_selects_nothing() {
        let selected = parse_commit("try: -b do", &job_file()).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_unrecognized_flags_are_ignored() {
        let selected = parse_commit("try: -b o -u all -p linux64", &job_file()).unwrap();
        assert_eq!(names(&selected), vec!["linux64"]);
    }
}
