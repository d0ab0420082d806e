//! Sandbox configuration (the `[sandbox]` table of `judge.toml`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// When to append the SELinux private label (`:Z`) to the workspace bind mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelinuxLabel {
    /// Label only on Linux hosts that expose `/sys/fs/selinux`.
    #[default]
    Auto,
    Always,
    Never,
}

/// Execution engine configuration (TOML).
///
/// Missing fields default to values suitable for a single-host judge talking
/// to a local Docker daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Runtime client binary, looked up on `PATH` (absolute paths accepted).
    pub runtime: String,

    /// Environment variable naming the daemon endpoint, reported in diagnostics.
    pub endpoint_env: String,

    /// Wall-clock budget for the sandboxed run.
    pub execution_timeout_secs: u64,

    /// Budget for an on-demand image pull. Must exceed the execution budget.
    pub pull_timeout_secs: u64,

    /// Budget for each daemon probe and for container removal.
    pub probe_timeout_secs: u64,

    /// Keep at most this many bytes of combined output in memory.
    pub output_limit_bytes: usize,

    /// Copy sandbox output to stderr while it runs.
    pub mirror_output: bool,

    pub selinux_label: SelinuxLabel,

    /// In-container mount point of the workspace; also the working directory.
    pub container_workdir: String,

    /// Parent directory for workspaces. Defaults to the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Name of the staged code file.
    pub code_file: String,

    /// Name of the staged stdin file.
    pub input_file: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            endpoint_env: "DOCKER_HOST".to_string(),
            execution_timeout_secs: 30,
            pull_timeout_secs: 5 * 60,
            probe_timeout_secs: 15,
            output_limit_bytes: 1_000_000,
            mirror_output: true,
            selinux_label: SelinuxLabel::Auto,
            container_workdir: "/app".to_string(),
            workspace_root: None,
            code_file: "solution.py".to_string(),
            input_file: "input.txt".to_string(),
        }
    }
}

impl SandboxConfig {
    pub fn validate(&self) -> Result<()> {
        if self.runtime.trim().is_empty() {
            return Err(anyhow!("sandbox.runtime must be non-empty"));
        }
        if self.execution_timeout_secs == 0 {
            return Err(anyhow!("sandbox.execution_timeout_secs must be > 0"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(anyhow!("sandbox.probe_timeout_secs must be > 0"));
        }
        if self.pull_timeout_secs <= self.execution_timeout_secs {
            return Err(anyhow!(
                "sandbox.pull_timeout_secs ({}) must be greater than sandbox.execution_timeout_secs ({})",
                self.pull_timeout_secs,
                self.execution_timeout_secs
            ));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("sandbox.output_limit_bytes must be > 0"));
        }
        if !self.container_workdir.starts_with('/') {
            return Err(anyhow!("sandbox.container_workdir must be an absolute path"));
        }
        validate_file_name("sandbox.code_file", &self.code_file)?;
        validate_file_name("sandbox.input_file", &self.input_file)?;
        if self.code_file == self.input_file {
            return Err(anyhow!(
                "sandbox.code_file and sandbox.input_file must differ"
            ));
        }
        Ok(())
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Directory under which workspaces are created.
    pub fn workspace_parent(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

fn validate_file_name(field: &str, name: &str) -> Result<()> {
    let path = Path::new(name);
    if name.trim().is_empty() {
        return Err(anyhow!("{field} must be non-empty"));
    }
    if path.components().count() != 1 || path.file_name().is_none() {
        return Err(anyhow!("{field} must be a plain file name"));
    }
    Ok(())
}
