//! Investigation tests against a real Docker daemon.
//!
//! Ignored by default: they need the `docker` CLI on `PATH`, a running daemon,
//! and network access to pull `alpine`.
//!
//! Run with:
//!
//! ```bash
//! cargo test -p sandbox --test investigation_docker -- --ignored
//! ```

use sandbox::core::outcome::{ExecutionOutcome, ExecutionRequest};
use sandbox::engine::{ContainerSandbox, Sandbox};
use sandbox::io::config::SandboxConfig;

fn sandbox() -> ContainerSandbox {
    ContainerSandbox::new(SandboxConfig {
        execution_timeout_secs: 5,
        code_file: "solution.sh".to_string(),
        ..SandboxConfig::default()
    })
    .expect("sandbox")
}

#[test]
#[ignore = "requires a running Docker daemon"]
fn alpine_reads_stdin_from_workspace() {
    let request =
        ExecutionRequest::new("alpine:3.20", "sh solution.sh", "read x; echo \"got $x\"\n", "42\n")
            .expect("request");
    let outcome = sandbox().run(&request);
    assert_eq!(
        outcome,
        ExecutionOutcome::Completed {
            output: "got 42\n".to_string()
        }
    );
}

#[test]
#[ignore = "requires a running Docker daemon"]
fn alpine_sleep_times_out_and_container_is_gone() {
    let request = ExecutionRequest::new("alpine:3.20", "sleep 60", "", "").expect("request");
    let outcome = sandbox().run(&request);
    assert!(matches!(outcome, ExecutionOutcome::TimedOut { .. }), "{outcome:?}");

    let ps = std::process::Command::new("docker")
        .args(["ps", "--all", "--filter", "name=judge-", "--format", "{{.Names}}"])
        .output()
        .expect("docker ps");
    assert!(
        String::from_utf8_lossy(&ps.stdout).trim().is_empty(),
        "containers left behind"
    );
}
