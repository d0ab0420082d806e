//! Launches the sandboxed process through the container runtime client.

use std::path::Path;
use std::process::{Command, ExitStatus};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::args::{RunSpec, remove_args, run_args};
use crate::core::outcome::{Diagnostics, ExecutionOutcome, ExitDetails, FailureReason};
use crate::io::config::SelinuxLabel;
use crate::io::preflight::RuntimeHandle;
use crate::io::process::{RunLimits, StdinSource, run_command_with_timeout};
use crate::io::workspace::Workspace;

/// Per-launch settings derived from [`SandboxConfig`](crate::io::config::SandboxConfig).
#[derive(Debug, Clone, Copy)]
pub struct LaunchSettings<'a> {
    /// In-container mount point of the workspace and working directory.
    pub container_dir: &'a str,
    pub selinux_label: bool,
    /// Hard wall-clock deadline for the run.
    pub timeout: Duration,
    /// Budget for force-removing the container after a timeout.
    pub removal_timeout: Duration,
    pub output_limit_bytes: usize,
    pub mirror: bool,
}

/// Decide whether the bind mount gets the SELinux private label.
pub fn resolve_selinux_label(mode: SelinuxLabel) -> bool {
    match mode {
        SelinuxLabel::Always => true,
        SelinuxLabel::Never => false,
        SelinuxLabel::Auto => cfg!(target_os = "linux") && Path::new("/sys/fs/selinux").exists(),
    }
}

/// Run `command` in a fresh auto-removing container with the workspace bound in.
///
/// The workspace's stdin file feeds the process. On deadline expiry the runtime
/// client is killed and the container force-removed; the outcome is then
/// `TimedOut`, never `Completed`, and records whether the removal succeeded.
/// A successful run whose output hit the byte limit is `OutputLimitExceeded`.
///
/// `diagnostics` holds the preflight context and is attached to every
/// non-`Completed` outcome.
#[instrument(skip_all, fields(image = %image, container = tracing::field::Empty))]
pub fn launch(
    handle: &RuntimeHandle,
    workspace: &Workspace,
    image: &str,
    command: &str,
    settings: &LaunchSettings<'_>,
    mut diagnostics: Diagnostics,
) -> ExecutionOutcome {
    let container_name = workspace.container_name();
    tracing::Span::current().record("container", container_name.as_str());

    let args = run_args(&RunSpec {
        container_name: &container_name,
        host_dir: workspace.path(),
        container_dir: settings.container_dir,
        selinux_label: settings.selinux_label,
        image,
        command,
    });
    let mut cmd = Command::new(&handle.path);
    cmd.args(&args);
    let limits = RunLimits {
        timeout: settings.timeout,
        output_limit_bytes: settings.output_limit_bytes,
        mirror: settings.mirror,
    };

    info!(timeout_secs = settings.timeout.as_secs(), "launching sandbox");
    let output = match run_command_with_timeout(
        cmd,
        StdinSource::File(workspace.input_path()),
        &limits,
    ) {
        Ok(output) => output,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "runtime client failed");
            diagnostics.record("run", false, format!("{err:#}"));
            return ExecutionOutcome::InfrastructureFailure {
                reason: FailureReason::Launch,
                message: "could not run the container runtime client".to_string(),
                diagnostics,
            };
        }
    };

    if output.timed_out {
        let captured = output.text() + &output.truncated_notice("sandbox");
        let container_removed =
            remove_container(handle, &container_name, settings, &mut diagnostics);
        warn!(
            timeout_secs = settings.timeout.as_secs(),
            container_removed, "sandbox timed out"
        );
        return ExecutionOutcome::TimedOut {
            after: settings.timeout,
            captured,
            container_removed,
            diagnostics,
        };
    }

    if !output.status.success() {
        let captured = output.text() + &output.truncated_notice("sandbox");
        let exit = exit_details(output.status);
        warn!(
            %exit,
            truncated = output.truncated,
            captured = %captured,
            "sandboxed process failed"
        );
        return ExecutionOutcome::RunFailure {
            exit,
            captured,
            diagnostics,
        };
    }

    if output.truncated > 0 {
        warn!(
            limit_bytes = settings.output_limit_bytes,
            dropped_bytes = output.truncated,
            "sandbox output exceeded capture limit"
        );
        diagnostics.record(
            "output",
            false,
            format!("{} bytes dropped past the capture limit", output.truncated),
        );
        return ExecutionOutcome::OutputLimitExceeded {
            limit_bytes: settings.output_limit_bytes,
            dropped_bytes: output.truncated,
            captured: output.text() + &output.truncated_notice("sandbox"),
            diagnostics,
        };
    }

    debug!(bytes = output.output.len(), "sandbox completed");
    ExecutionOutcome::Completed {
        output: output.text(),
    }
}

/// Force-remove the container so nothing keeps running after a timeout.
///
/// Records a `remove` step and returns whether the runtime confirmed it.
fn remove_container(
    handle: &RuntimeHandle,
    container_name: &str,
    settings: &LaunchSettings<'_>,
    diagnostics: &mut Diagnostics,
) -> bool {
    let mut cmd = Command::new(&handle.path);
    cmd.args(remove_args(container_name));
    let limits = RunLimits {
        timeout: settings.removal_timeout,
        output_limit_bytes: 4_096,
        mirror: false,
    };
    match run_command_with_timeout(cmd, StdinSource::Null, &limits) {
        Ok(output) if output.status.success() && !output.timed_out => {
            debug!(container = container_name, "container removed");
            diagnostics.record("remove", true, container_name);
            true
        }
        Ok(output) => {
            let text = output.text();
            warn!(
                container = container_name,
                timed_out = output.timed_out,
                output = %text,
                "container removal failed"
            );
            let detail = if output.timed_out {
                format!(
                    "rm --force {container_name}: timed out after {}s",
                    settings.removal_timeout.as_secs_f64()
                )
            } else {
                format!("rm --force {container_name}: {}: {}", output.status, text.trim())
            };
            diagnostics.record("remove", false, detail);
            false
        }
        Err(err) => {
            warn!(container = container_name, err = %format!("{err:#}"), "container removal failed");
            diagnostics.record("remove", false, format!("rm --force {container_name}: {err:#}"));
            false
        }
    }
}

fn exit_details(status: ExitStatus) -> ExitDetails {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;
    ExitDetails {
        code: status.code(),
        signal,
    }
}
