//! Orchestration for a single execution attempt.
//!
//! Steps are strictly sequential: provision the workspace, run the preflight,
//! launch the sandbox, release the workspace. Each request produces exactly one
//! [`ExecutionOutcome`]; no state is shared between concurrent requests.

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::core::outcome::{Diagnostics, ExecutionOutcome, ExecutionRequest, FailureReason};
use crate::io::config::SandboxConfig;
use crate::io::launcher::{LaunchSettings, launch, resolve_selinux_label};
use crate::io::preflight::{PreflightError, PreflightLimits, ensure_ready, resolve_runtime};
use crate::io::workspace::{Workspace, WorkspaceFiles, provision};

/// Abstraction over execution backends.
///
/// Implementations must be safe to call from many threads at once.
pub trait Sandbox: Sync {
    fn run(&self, request: &ExecutionRequest) -> ExecutionOutcome;
}

/// Sandbox backed by a container runtime CLI (Docker-compatible).
#[derive(Debug, Clone)]
pub struct ContainerSandbox {
    config: SandboxConfig,
}

impl ContainerSandbox {
    pub fn new(config: SandboxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run only the preflight for `image`, returning what it observed.
    pub fn preflight(&self, image: &str) -> (Result<(), PreflightError>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let result = resolve_runtime(&self.config.runtime, &self.config.endpoint_env)
            .and_then(|handle| ensure_ready(&handle, image, &self.preflight_limits(), &mut diagnostics));
        (result, diagnostics)
    }

    fn preflight_limits(&self) -> PreflightLimits {
        PreflightLimits {
            probe_timeout: self.config.probe_timeout(),
            pull_timeout: self.config.pull_timeout(),
            output_limit_bytes: self.config.output_limit_bytes,
            mirror: self.config.mirror_output,
        }
    }

    fn run_in(&self, workspace: &Workspace, request: &ExecutionRequest) -> ExecutionOutcome {
        let mut diagnostics = Diagnostics::default();
        let handle = match resolve_runtime(&self.config.runtime, &self.config.endpoint_env) {
            Ok(handle) => handle,
            Err(err) => {
                diagnostics.record("resolve", false, err.to_string());
                return preflight_failure(err, diagnostics);
            }
        };
        if let Err(err) = ensure_ready(
            &handle,
            request.image(),
            &self.preflight_limits(),
            &mut diagnostics,
        ) {
            return preflight_failure(err, diagnostics);
        }

        let settings = LaunchSettings {
            container_dir: &self.config.container_workdir,
            selinux_label: resolve_selinux_label(self.config.selinux_label),
            timeout: self.config.execution_timeout(),
            removal_timeout: self.config.probe_timeout(),
            output_limit_bytes: self.config.output_limit_bytes,
            mirror: self.config.mirror_output,
        };
        launch(
            &handle,
            workspace,
            request.image(),
            request.command(),
            &settings,
            diagnostics,
        )
    }
}

impl Sandbox for ContainerSandbox {
    #[instrument(skip_all, fields(image = %request.image()))]
    fn run(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let files = WorkspaceFiles {
            code_file: &self.config.code_file,
            input_file: &self.config.input_file,
        };
        let workspace = match provision(
            &self.config.workspace_parent(),
            &files,
            request.code(),
            request.stdin(),
        ) {
            Ok(workspace) => workspace,
            Err(err) => {
                warn!(err = %err, "workspace provisioning failed");
                return ExecutionOutcome::InfrastructureFailure {
                    reason: FailureReason::Provisioning,
                    message: err.to_string(),
                    diagnostics: Diagnostics::default(),
                };
            }
        };

        let outcome = self.run_in(&workspace, request);

        if let Err(err) = workspace.release() {
            warn!(err = %err, "workspace removal failed");
        }
        debug!(outcome = ?outcome.kind(), "execution finished");
        outcome
    }
}

fn preflight_failure(err: PreflightError, diagnostics: Diagnostics) -> ExecutionOutcome {
    warn!(reason = %err.reason(), err = %err, "preflight failed");
    ExecutionOutcome::InfrastructureFailure {
        reason: err.reason(),
        message: err.to_string(),
        diagnostics,
    }
}
