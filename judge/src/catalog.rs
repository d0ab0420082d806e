//! Problem catalog: what to run and what output to expect.
//!
//! Problems are TOML files, one per file, in a catalog directory.
//! See `judge/problems/` for examples.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A read-only problem definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDefinition {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    pub title: String,
    /// Container image the submission runs in.
    pub image: String,
    /// Shell command line run inside the container's working directory.
    pub command: String,
    /// Bytes fed to the process on standard input.
    #[serde(default)]
    pub stdin: String,
    pub expected_output: String,
}

/// On-disk layout of a problem file.
#[derive(Debug, Clone, Deserialize)]
struct ProblemFile {
    problem: ProblemDefinition,
}

impl ProblemDefinition {
    /// Load and validate a problem file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read problem {}", path.display()))?;
        Self::parse_str(&contents).with_context(|| format!("load problem {}", path.display()))
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let file: ProblemFile = toml::from_str(contents).context("parse problem")?;
        file.problem.validate()?;
        Ok(file.problem)
    }

    pub fn validate(&self) -> Result<()> {
        validate_problem_id(&self.id)?;
        if self.title.trim().is_empty() {
            bail!("problem.title must be non-empty");
        }
        if self.image.trim().is_empty() {
            bail!("problem.image must be non-empty");
        }
        if self.command.trim().is_empty() {
            bail!("problem.command must be non-empty");
        }
        if self.expected_output.trim().is_empty() {
            bail!("problem.expected_output must be non-empty");
        }
        Ok(())
    }
}

/// Source of problem definitions.
pub trait ProblemCatalog: Sync {
    fn lookup(&self, id: &str) -> Option<&ProblemDefinition>;

    /// All problems, sorted by id.
    fn problems(&self) -> Vec<&ProblemDefinition>;
}

/// Catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    problems: BTreeMap<String, ProblemDefinition>,
}

impl MemoryCatalog {
    /// Build a catalog from definitions, validating each. Errors on duplicate ids.
    pub fn new(problems: impl IntoIterator<Item = ProblemDefinition>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for problem in problems {
            problem
                .validate()
                .with_context(|| format!("problem {:?} invalid", problem.id))?;
            if by_id.contains_key(&problem.id) {
                return Err(anyhow!("duplicate problem.id {}", problem.id));
            }
            by_id.insert(problem.id.clone(), problem);
        }
        Ok(Self { problems: by_id })
    }
}

impl ProblemCatalog for MemoryCatalog {
    fn lookup(&self, id: &str) -> Option<&ProblemDefinition> {
        self.problems.get(id)
    }

    fn problems(&self) -> Vec<&ProblemDefinition> {
        self.problems.values().collect()
    }
}

/// Catalog loaded from a directory of `*.toml` problem files.
#[derive(Debug, Clone)]
pub struct DirCatalog {
    inner: MemoryCatalog,
}

impl DirCatalog {
    /// Load every problem file in `dir`. Errors on invalid files or duplicate ids.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("problem catalog {} is not a directory", dir.display());
        }
        let mut problems = Vec::new();
        for entry in
            fs::read_dir(dir).with_context(|| format!("read catalog dir {}", dir.display()))?
        {
            let entry = entry.context("read catalog entry")?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            problems.push(ProblemDefinition::load(&path)?);
        }
        let inner = MemoryCatalog::new(problems)
            .with_context(|| format!("load catalog {}", dir.display()))?;
        debug!(dir = %dir.display(), problems = inner.problems.len(), "catalog loaded");
        Ok(Self { inner })
    }
}

impl ProblemCatalog for DirCatalog {
    fn lookup(&self, id: &str) -> Option<&ProblemDefinition> {
        self.inner.lookup(id)
    }

    fn problems(&self) -> Vec<&ProblemDefinition> {
        self.inner.problems()
    }
}

fn validate_problem_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("problem.id must be non-empty");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("problem.id must use [a-z0-9_-] only");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUM_TWO: &str = r#"
[problem]
id = "sum-two"
title = "Sum of two integers"
image = "python:3.12-alpine"
command = "python3 solution.py"
stdin = "2\n3\n"
expected_output = "5"
"#;

    fn problem(id: &str) -> ProblemDefinition {
        ProblemDefinition {
            id: id.to_string(),
            title: "t".to_string(),
            image: "alpine".to_string(),
            command: "sh solution.sh".to_string(),
            stdin: String::new(),
            expected_output: "ok".to_string(),
        }
    }

    #[test]
    fn parses_valid_problem() {
        let problem = ProblemDefinition::parse_str(SUM_TWO).expect("problem parses");
        assert_eq!(problem.id, "sum-two");
        assert_eq!(problem.stdin, "2\n3\n");
        assert_eq!(problem.expected_output, "5");
    }

    #[test]
    fn stdin_defaults_to_empty() {
        let input = SUM_TWO.replace("stdin = \"2\\n3\\n\"\n", "");
        let problem = ProblemDefinition::parse_str(&input).expect("problem parses");
        assert_eq!(problem.stdin, "");
    }

    #[test]
    fn rejects_invalid_id() {
        let input = SUM_TWO.replace("sum-two", "../sum");
        let err = ProblemDefinition::parse_str(&input).expect_err("invalid id");
        assert!(err.to_string().contains("problem.id"));
    }

    #[test]
    fn rejects_empty_image() {
        let input = SUM_TWO.replace("python:3.12-alpine", " ");
        let err = ProblemDefinition::parse_str(&input).expect_err("invalid image");
        assert!(err.to_string().contains("problem.image"));
    }

    #[test]
    fn memory_catalog_rejects_duplicates() {
        let err = MemoryCatalog::new([problem("a"), problem("a")]).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate problem.id a"));
    }

    #[test]
    fn lookup_of_unknown_id_is_none() {
        let catalog = MemoryCatalog::new([problem("b"), problem("a")]).expect("catalog");
        assert!(catalog.lookup("missing").is_none());
        let ids: Vec<_> = catalog.problems().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn dir_catalog_skips_non_toml_and_rejects_duplicate_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("sum-two.toml"), SUM_TWO).expect("write");
        fs::write(temp.path().join("README.md"), "notes").expect("write");
        let catalog = DirCatalog::load(temp.path()).expect("catalog");
        assert!(catalog.lookup("sum-two").is_some());

        fs::write(temp.path().join("copy.toml"), SUM_TWO).expect("write");
        let err = DirCatalog::load(temp.path()).expect_err("duplicate");
        assert!(format!("{err:#}").contains("duplicate problem.id sum-two"));
    }

    #[test]
    fn missing_catalog_dir_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(DirCatalog::load(&temp.path().join("missing")).is_err());
    }

    #[test]
    fn bundled_problems_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("problems");
        let catalog = DirCatalog::load(&dir).expect("bundled catalog");
        for id in ["hello-name", "sum-to-100", "sum-two"] {
            assert!(catalog.lookup(id).is_some(), "missing bundled problem {id}");
        }
    }
}
