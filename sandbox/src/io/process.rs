//! Helpers for running child processes with timeouts and bounded output.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Where the child's standard input comes from.
#[derive(Debug, Clone, Copy)]
pub enum StdinSource<'a> {
    Null,
    /// Stream the file's contents as stdin.
    File(&'a Path),
}

/// Limits applied to one child process.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Kill the child once this much wall-clock time has passed.
    pub timeout: Duration,
    /// Bytes of combined output kept in memory; the rest is drained and counted.
    pub output_limit_bytes: usize,
    /// Copy output to this process's stderr as it arrives.
    pub mirror: bool,
}

/// Captured child process output.
///
/// stdout and stderr share one buffer in arrival order.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub output: Vec<u8>,
    pub truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Output as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn truncated_notice(&self, label: &str) -> String {
        if self.truncated > 0 {
            format!("\n[{label} output truncated {} bytes]\n", self.truncated)
        } else {
            String::new()
        }
    }
}

#[derive(Debug, Default)]
struct Collected {
    buf: Vec<u8>,
    truncated: usize,
}

/// Run a command with a timeout and capture combined stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. On timeout the child is
/// killed (not merely abandoned) and reaped before returning.
#[instrument(skip_all, fields(timeout_secs = limits.timeout.as_secs(), output_limit_bytes = limits.output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: StdinSource<'_>,
    limits: &RunLimits,
) -> Result<CommandOutput> {
    match stdin {
        StdinSource::Null => {
            cmd.stdin(Stdio::null());
        }
        StdinSource::File(path) => {
            let file =
                File::open(path).with_context(|| format!("open stdin {}", path.display()))?;
            cmd.stdin(Stdio::from(file));
        }
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let collected = Arc::new(Mutex::new(Collected::default()));
    let limit = limits.output_limit_bytes;
    let mirror = limits.mirror;
    let stdout_handle = {
        let collected = Arc::clone(&collected);
        thread::spawn(move || read_stream_combined(stdout, limit, mirror, &collected))
    };
    let stderr_handle = {
        let collected = Arc::clone(&collected);
        thread::spawn(move || read_stream_combined(stderr, limit, mirror, &collected))
    };

    let mut timed_out = false;
    let status = match child.wait_timeout(limits.timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = limits.timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    join_reader(stdout_handle).context("join stdout")?;
    join_reader(stderr_handle).context("join stderr")?;

    let collected = std::mem::take(
        &mut *collected
            .lock()
            .map_err(|_| anyhow!("output buffer lock poisoned"))?,
    );
    if collected.truncated > 0 {
        warn!(truncated = collected.truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        output: collected.buf,
        truncated: collected.truncated,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_combined<R: Read>(
    mut reader: R,
    limit: usize,
    mirror: bool,
    collected: &Mutex<Collected>,
) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }

        if mirror {
            let mut operator = std::io::stderr().lock();
            if let Err(e) = operator.write_all(&chunk[..n]) {
                warn!(err = %e, "failed to mirror output");
            }
        }

        let mut collected = collected
            .lock()
            .map_err(|_| anyhow!("output buffer lock poisoned"))?;
        let remaining = limit.saturating_sub(collected.buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            collected.buf.extend_from_slice(&chunk[..keep]);
            collected.truncated += n.saturating_sub(keep);
        } else {
            collected.truncated += n;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn limits(timeout: Duration, output_limit_bytes: usize) -> RunLimits {
        RunLimits {
            timeout,
            output_limit_bytes,
            mirror: false,
        }
    }

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_stderr_in_one_buffer() {
        let output = run_command_with_timeout(
            sh("printf out; printf err >&2"),
            StdinSource::Null,
            &limits(Duration::from_secs(5), 1024),
        )
        .expect("run");
        assert!(output.status.success());
        assert!(!output.timed_out);
        let text = output.text();
        assert!(text.contains("out"));
        assert!(text.contains("err"));
        assert_eq!(text.len(), 6);
    }

    #[test]
    fn feeds_stdin_from_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let input = temp.path().join("input.txt");
        std::fs::write(&input, "2\n3\n").expect("write input");
        let output = run_command_with_timeout(
            sh("read a; read b; echo $((a + b))"),
            StdinSource::File(&input),
            &limits(Duration::from_secs(5), 1024),
        )
        .expect("run");
        assert_eq!(output.text(), "5\n");
    }

    #[test]
    fn timeout_kills_child() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("printf partial; exec sleep 10"),
            StdinSource::Null,
            &limits(Duration::from_millis(300), 1024),
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
        assert_eq!(output.text(), "partial");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn output_is_truncated_at_limit() {
        let output = run_command_with_timeout(
            sh("printf abcdef"),
            StdinSource::Null,
            &limits(Duration::from_secs(5), 4),
        )
        .expect("run");
        assert_eq!(output.output, b"abcd");
        assert_eq!(output.truncated, 2);
        assert!(output.truncated_notice("run").contains("truncated 2 bytes"));
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let err = run_command_with_timeout(
            Command::new("/nonexistent/definitely-not-a-runtime"),
            StdinSource::Null,
            &limits(Duration::from_secs(1), 16),
        )
        .expect_err("spawn fails");
        assert!(format!("{err:#}").contains("spawn command"));
    }
}
