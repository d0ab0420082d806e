//! Judge configuration (`judge.toml`).
//!
//! Relative paths are resolved against the directory holding the config file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use sandbox::core::verdict::LineEndings;
use sandbox::io::config::SandboxConfig;
use serde::{Deserialize, Serialize};

/// Output comparison settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompareConfig {
    pub line_endings: LineEndings,
}

/// Top-level judge configuration (TOML).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JudgeConfig {
    /// Directory of problem files.
    pub catalog_dir: PathBuf,

    /// Characters of captured and expected output kept in a report.
    pub report_limit_chars: usize,

    /// JSONL file receiving one record per accepted submission. Unset disables recording.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_path: Option<PathBuf>,

    pub sandbox: SandboxConfig,

    pub compare: CompareConfig,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            catalog_dir: PathBuf::from("problems"),
            report_limit_chars: 4_000,
            record_path: None,
            sandbox: SandboxConfig::default(),
            compare: CompareConfig::default(),
        }
    }
}

impl JudgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.catalog_dir.as_os_str().is_empty() {
            return Err(anyhow!("catalog_dir must be non-empty"));
        }
        if self.report_limit_chars == 0 {
            return Err(anyhow!("report_limit_chars must be > 0"));
        }
        self.sandbox.validate()
    }

    /// Treat empty optional paths as unset and anchor relative paths at `base`.
    fn resolve_paths(&mut self, base: &Path) {
        self.catalog_dir = anchor(base, &self.catalog_dir);
        self.record_path = non_empty(self.record_path.take()).map(|path| anchor(base, &path));
        self.sandbox.workspace_root =
            non_empty(self.sandbox.workspace_root.take()).map(|path| anchor(base, &path));
    }
}

fn non_empty(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|path| !path.as_os_str().is_empty())
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `JudgeConfig::default()` anchored at the
/// file's directory.
pub fn load_config(path: &Path) -> Result<JudgeConfig> {
    let base = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut cfg = if path.exists() {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
    } else {
        JudgeConfig::default()
    };
    cfg.resolve_paths(base);
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &JudgeConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox::io::config::SelinuxLabel;

    #[test]
    fn load_missing_returns_anchored_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg.catalog_dir, temp.path().join("problems"));
        assert_eq!(cfg.report_limit_chars, 4_000);
        assert_eq!(cfg.record_path, None);
        assert_eq!(cfg.sandbox, SandboxConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("judge.toml");
        let cfg = JudgeConfig {
            catalog_dir: temp.path().join("catalog"),
            record_path: Some(temp.path().join("completions.jsonl")),
            compare: CompareConfig {
                line_endings: LineEndings::Normalize,
            },
            ..JudgeConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn empty_paths_mean_unset_and_relative_paths_are_anchored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("judge.toml");
        fs::write(
            &path,
            r#"
catalog_dir = "catalog"
record_path = ""

[sandbox]
workspace_root = "ws"
selinux_label = "never"

[compare]
line_endings = "normalize"
"#,
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.catalog_dir, temp.path().join("catalog"));
        assert_eq!(cfg.record_path, None);
        assert_eq!(cfg.sandbox.workspace_root, Some(temp.path().join("ws")));
        assert_eq!(cfg.sandbox.selinux_label, SelinuxLabel::Never);
        assert_eq!(cfg.compare.line_endings, LineEndings::Normalize);
    }

    #[test]
    fn invalid_sandbox_section_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("judge.toml");
        fs::write(
            &path,
            "[sandbox]\nexecution_timeout_secs = 600\npull_timeout_secs = 60\n",
        )
        .expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("pull_timeout_secs"));
    }

    #[test]
    fn zero_report_limit_is_rejected() {
        let cfg = JudgeConfig {
            report_limit_chars: 0,
            ..JudgeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
