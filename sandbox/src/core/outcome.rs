//! Execution requests, outcomes, and the diagnostics that travel with them.
//!
//! These types define the contract between the engine and its callers. An
//! outcome is produced exactly once per request and is never partially filled.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A request that cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("image must be non-empty")]
    EmptyImage,
    #[error("command must be non-empty")]
    EmptyCommand,
}

/// One execution attempt: which image, which command, and the bytes to stage.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    image: String,
    command: String,
    code: Vec<u8>,
    stdin: Vec<u8>,
}

impl ExecutionRequest {
    pub fn new(
        image: impl Into<String>,
        command: impl Into<String>,
        code: impl Into<Vec<u8>>,
        stdin: impl Into<Vec<u8>>,
    ) -> Result<Self, RequestError> {
        let image = image.into();
        let command = command.into();
        if image.trim().is_empty() {
            return Err(RequestError::EmptyImage);
        }
        if command.trim().is_empty() {
            return Err(RequestError::EmptyCommand);
        }
        Ok(Self {
            image,
            command,
            code: code.into(),
            stdin: stdin.into(),
        })
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn stdin(&self) -> &[u8] {
        &self.stdin
    }
}

/// Why the engine could not evaluate the submission at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Staging directory could not be created or written.
    Provisioning,
    /// Runtime binary not found on the search path.
    ToolMissing,
    /// Runtime daemon did not answer the version or info probe.
    DaemonUnreachable,
    /// Image absent locally and could not be pulled in time.
    ImageUnavailable,
    /// Runtime client could not be spawned or waited on.
    Launch,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Provisioning => "provisioning",
            FailureReason::ToolMissing => "tool_missing",
            FailureReason::DaemonUnreachable => "daemon_unreachable",
            FailureReason::ImageUnavailable => "image_unavailable",
            FailureReason::Launch => "launch",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exit details of a sandboxed process that finished unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitDetails {
    pub code: Option<i32>,
    /// Terminating signal, when the client was killed by one (unix only).
    pub signal: Option<i32>,
}

impl fmt::Display for ExitDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// Result of one probe against the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub step: String,
    pub ok: bool,
    pub detail: String,
}

/// Context gathered while talking to the runtime.
///
/// Carries enough state for an operator to tell "daemon down" from
/// "permission denied" without re-running anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Resolved runtime executable.
    pub runtime: Option<String>,
    /// Daemon endpoint from the environment (`None` means the runtime default).
    pub endpoint: Option<String>,
    pub server_version: Option<String>,
    pub probes: Vec<ProbeRecord>,
    /// Tail of the pull log or run output relevant to the failure.
    pub log_excerpt: Option<String>,
}

impl Diagnostics {
    pub fn record(&mut self, step: &str, ok: bool, detail: impl Into<String>) {
        self.probes.push(ProbeRecord {
            step: step.to_string(),
            ok,
            detail: detail.into(),
        });
    }

    pub fn probe(&self, step: &str) -> Option<&ProbeRecord> {
        self.probes.iter().find(|probe| probe.step == step)
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "diagnostics:")?;
        writeln!(f, "runtime={}", self.runtime.as_deref().unwrap_or("<unresolved>"))?;
        writeln!(f, "endpoint={}", self.endpoint.as_deref().unwrap_or("<default>"))?;
        if let Some(version) = &self.server_version {
            writeln!(f, "server_version={version}")?;
        }
        for probe in &self.probes {
            if probe.ok {
                writeln!(f, "{}=ok", probe.step)?;
            } else {
                writeln!(f, "{}_error={}", probe.step, probe.detail.trim())?;
            }
        }
        if let Some(excerpt) = &self.log_excerpt {
            writeln!(f, "log:")?;
            writeln!(f, "{}", excerpt.trim_end())?;
        }
        Ok(())
    }
}

/// Stable, serializable name of an outcome variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Completed,
    TimedOut,
    InfrastructureFailure,
    RunFailure,
    OutputLimitExceeded,
}

/// What happened to one execution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exit code 0. `output` is the raw combined output, untrimmed.
    Completed { output: String },
    /// The deadline fired and the runtime client was killed.
    ///
    /// `container_removed` is false when the forced removal could not be
    /// confirmed; the container may then still be running.
    TimedOut {
        after: Duration,
        captured: String,
        container_removed: bool,
        diagnostics: Diagnostics,
    },
    /// The runtime environment failed before or while launching.
    InfrastructureFailure {
        reason: FailureReason,
        message: String,
        diagnostics: Diagnostics,
    },
    /// Non-zero exit without deadline expiry.
    RunFailure {
        exit: ExitDetails,
        captured: String,
        diagnostics: Diagnostics,
    },
    /// Exit code 0, but the capture limit dropped part of the output, so the
    /// output cannot be judged.
    OutputLimitExceeded {
        limit_bytes: usize,
        dropped_bytes: usize,
        captured: String,
        diagnostics: Diagnostics,
    },
}

impl ExecutionOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ExecutionOutcome::Completed { .. } => OutcomeKind::Completed,
            ExecutionOutcome::TimedOut { .. } => OutcomeKind::TimedOut,
            ExecutionOutcome::InfrastructureFailure { .. } => OutcomeKind::InfrastructureFailure,
            ExecutionOutcome::RunFailure { .. } => OutcomeKind::RunFailure,
            ExecutionOutcome::OutputLimitExceeded { .. } => OutcomeKind::OutputLimitExceeded,
        }
    }

    /// Whatever the sandboxed process printed, if it got that far.
    pub fn captured(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Completed { output } => Some(output),
            ExecutionOutcome::TimedOut { captured, .. }
            | ExecutionOutcome::RunFailure { captured, .. }
            | ExecutionOutcome::OutputLimitExceeded { captured, .. } => Some(captured),
            ExecutionOutcome::InfrastructureFailure { .. } => None,
        }
    }

    /// Runtime context gathered for this request; `None` for `Completed`.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            ExecutionOutcome::Completed { .. } => None,
            ExecutionOutcome::TimedOut { diagnostics, .. }
            | ExecutionOutcome::InfrastructureFailure { diagnostics, .. }
            | ExecutionOutcome::RunFailure { diagnostics, .. }
            | ExecutionOutcome::OutputLimitExceeded { diagnostics, .. } => Some(diagnostics),
        }
    }

    /// Human-readable failure classification; `None` for `Completed`.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            ExecutionOutcome::Completed { .. } => None,
            ExecutionOutcome::TimedOut {
                after,
                container_removed,
                diagnostics,
                ..
            } => {
                let removal = if *container_removed {
                    "container removed"
                } else {
                    "container removal NOT confirmed, it may still be running"
                };
                Some(format!(
                    "timed_out: execution exceeded {}s deadline; {removal}\n{diagnostics}",
                    after.as_secs_f64()
                ))
            }
            ExecutionOutcome::InfrastructureFailure {
                reason,
                message,
                diagnostics,
            } => Some(format!("{reason}: {message}\n{diagnostics}")),
            ExecutionOutcome::RunFailure {
                exit, diagnostics, ..
            } => Some(format!(
                "run_failure: sandboxed process failed with {exit}\n{diagnostics}"
            )),
            ExecutionOutcome::OutputLimitExceeded {
                limit_bytes,
                dropped_bytes,
                diagnostics,
                ..
            } => Some(format!(
                "output_limit_exceeded: output passed the {limit_bytes} byte capture limit ({dropped_bytes} bytes dropped) and cannot be judged\n{diagnostics}"
            )),
        }
    }
}
