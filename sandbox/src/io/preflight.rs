//! Runtime preflight: separate infrastructure faults from code faults.
//!
//! Runtimes report "daemon unreachable" and "image missing" the same way at the
//! `run` call site (a generic non-zero exit), so these checks run before the
//! timed execution window. Each step is recorded in [`Diagnostics`].

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::args::{info_args, inspect_image_args, pull_args, version_args};
use crate::core::outcome::{Diagnostics, FailureReason};
use crate::core::text::tail;
use crate::io::process::{RunLimits, StdinSource, run_command_with_timeout};

/// Bytes of pull/probe output kept in a diagnostic excerpt.
const EXCERPT_BYTES: usize = 4_000;

/// Resolved runtime client and the daemon endpoint it will talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeHandle {
    pub path: PathBuf,
    /// Value of the configured endpoint variable (e.g. `DOCKER_HOST`), if set.
    pub endpoint: Option<String>,
}

/// Why the runtime cannot serve this execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreflightError {
    #[error(
        "container runtime `{runtime}` not found ({cause}); install it or add its directory to PATH"
    )]
    ToolMissing { runtime: String, cause: String },
    #[error(
        "container daemon unreachable: {step} probe failed; ensure the daemon is running and this process may use its socket (group membership, endpoint)"
    )]
    DaemonUnreachable { step: &'static str, detail: String },
    #[error("image `{image}` unavailable: {detail}")]
    ImageUnavailable {
        image: String,
        detail: String,
        timed_out: bool,
    },
}

impl PreflightError {
    pub fn reason(&self) -> FailureReason {
        match self {
            PreflightError::ToolMissing { .. } => FailureReason::ToolMissing,
            PreflightError::DaemonUnreachable { .. } => FailureReason::DaemonUnreachable,
            PreflightError::ImageUnavailable { .. } => FailureReason::ImageUnavailable,
        }
    }
}

/// Deadlines and capture settings for preflight commands.
#[derive(Debug, Clone, Copy)]
pub struct PreflightLimits {
    /// Budget for each connectivity probe; distinct from the execution budget.
    pub probe_timeout: Duration,
    /// Budget for an on-demand pull.
    pub pull_timeout: Duration,
    pub output_limit_bytes: usize,
    pub mirror: bool,
}

/// Resolve the runtime client on the search path.
///
/// Absolute paths are accepted as-is when they point at an executable.
pub fn resolve_runtime(runtime: &str, endpoint_env: &str) -> Result<RuntimeHandle, PreflightError> {
    let path = which::which(runtime).map_err(|err| PreflightError::ToolMissing {
        runtime: runtime.to_string(),
        cause: err.to_string(),
    })?;
    let endpoint = std::env::var(endpoint_env)
        .ok()
        .filter(|value| !value.trim().is_empty());
    debug!(runtime = %path.display(), endpoint = ?endpoint, "runtime resolved");
    Ok(RuntimeHandle { path, endpoint })
}

/// Verify the daemon answers and the image is present, pulling it if needed.
///
/// Steps run strictly in order: version probe, info probe, image inspect, pull.
#[instrument(skip_all, fields(runtime = %handle.path.display(), image = %image))]
pub fn ensure_ready(
    handle: &RuntimeHandle,
    image: &str,
    limits: &PreflightLimits,
    diagnostics: &mut Diagnostics,
) -> Result<(), PreflightError> {
    diagnostics.runtime = Some(handle.path.display().to_string());
    diagnostics.endpoint = handle.endpoint.clone();

    check_daemon(handle, limits, diagnostics)?;
    ensure_image(handle, image, limits, diagnostics)
}

fn check_daemon(
    handle: &RuntimeHandle,
    limits: &PreflightLimits,
    diagnostics: &mut Diagnostics,
) -> Result<(), PreflightError> {
    let version = run_probe(handle, version_args(), limits.probe_timeout, limits);
    if !version.ok {
        warn!(detail = %version.detail, "daemon version probe failed");
        diagnostics.record("version", false, version.detail.clone());
        return Err(PreflightError::DaemonUnreachable {
            step: "version",
            detail: version.detail,
        });
    }
    let server_version = version.text.trim().to_string();
    diagnostics.record("version", true, server_version.clone());
    diagnostics.server_version = Some(server_version);

    let info = run_probe(handle, info_args(), limits.probe_timeout, limits);
    if !info.ok {
        warn!(detail = %info.detail, "daemon info probe failed");
        diagnostics.record("info", false, info.detail.clone());
        return Err(PreflightError::DaemonUnreachable {
            step: "info",
            detail: info.detail,
        });
    }
    diagnostics.record("info", true, info.text.trim());
    Ok(())
}

fn ensure_image(
    handle: &RuntimeHandle,
    image: &str,
    limits: &PreflightLimits,
    diagnostics: &mut Diagnostics,
) -> Result<(), PreflightError> {
    let inspect = run_probe(handle, inspect_image_args(image), limits.probe_timeout, limits);
    if inspect.ok {
        diagnostics.record("image_inspect", true, "present");
        return Ok(());
    }
    diagnostics.record("image_inspect", false, inspect.detail);

    info!(image, pull_timeout_secs = limits.pull_timeout.as_secs(), "image missing locally, pulling");
    let pull = run_probe(handle, pull_args(image), limits.pull_timeout, limits);
    if pull.ok {
        diagnostics.record("pull", true, "pulled");
        return Ok(());
    }

    warn!(image, timed_out = pull.timed_out, "image pull failed");
    diagnostics.record("pull", false, pull.detail.clone());
    diagnostics.log_excerpt = Some(tail(&pull.text, EXCERPT_BYTES).to_string());
    let detail = if pull.timed_out {
        format!("pull timed out after {}s", limits.pull_timeout.as_secs_f64())
    } else {
        format!("pull failed: {}", pull.detail)
    };
    Err(PreflightError::ImageUnavailable {
        image: image.to_string(),
        detail,
        timed_out: pull.timed_out,
    })
}

struct ProbeRun {
    ok: bool,
    timed_out: bool,
    /// Captured output (empty when the command never ran).
    text: String,
    /// One-line failure description for diagnostics.
    detail: String,
}

fn run_probe(
    handle: &RuntimeHandle,
    args: Vec<OsString>,
    timeout: Duration,
    limits: &PreflightLimits,
) -> ProbeRun {
    let mut cmd = Command::new(&handle.path);
    cmd.args(&args);
    let label = args
        .iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    let run_limits = RunLimits {
        timeout,
        output_limit_bytes: limits.output_limit_bytes,
        mirror: limits.mirror,
    };

    match run_command_with_timeout(cmd, StdinSource::Null, &run_limits) {
        Err(err) => ProbeRun {
            ok: false,
            timed_out: false,
            text: String::new(),
            detail: format!("{label}: {err:#}"),
        },
        Ok(output) => {
            let text = output.text();
            if output.timed_out {
                ProbeRun {
                    ok: false,
                    timed_out: true,
                    detail: format!("{label}: timed out after {}s", timeout.as_secs_f64()),
                    text,
                }
            } else if !output.status.success() {
                ProbeRun {
                    ok: false,
                    timed_out: false,
                    detail: format!(
                        "{label}: {}: {}",
                        output.status,
                        tail(text.trim(), EXCERPT_BYTES)
                    ),
                    text,
                }
            } else {
                ProbeRun {
                    ok: true,
                    timed_out: false,
                    detail: String::new(),
                    text,
                }
            }
        }
    }
}
