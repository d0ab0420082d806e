//! Argument vectors for the container runtime CLI.
//!
//! Every runtime invocation the engine makes is spelled out here so the exact
//! command lines can be asserted without spawning anything.

use std::ffi::OsString;
use std::path::Path;

/// Shell used inside the container to interpret the problem command.
pub const SHELL: &str = "sh";

/// Label suffix that asks the runtime to relabel a bind mount for SELinux.
pub const SELINUX_PRIVATE_LABEL: &str = "Z";

/// Inputs for a single `run` invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunSpec<'a> {
    /// Unique container name, used to force-remove the container on timeout.
    pub container_name: &'a str,
    /// Host directory bound into the container.
    pub host_dir: &'a Path,
    /// Absolute in-container path of the bind mount; also the working directory.
    pub container_dir: &'a str,
    /// Append the SELinux private label to the bind mount.
    pub selinux_label: bool,
    pub image: &'a str,
    /// Full shell command line, passed to the shell as one argument.
    pub command: &'a str,
}

/// `-v` value: `host:container[:Z]`.
pub fn mount_spec(host_dir: &Path, container_dir: &str, selinux_label: bool) -> OsString {
    let mut spec = host_dir.as_os_str().to_os_string();
    spec.push(":");
    spec.push(container_dir);
    if selinux_label {
        spec.push(":");
        spec.push(SELINUX_PRIVATE_LABEL);
    }
    spec
}

/// `run --rm -i --name <name> -v <mount> -w <dir> <image> sh -c <command>`.
///
/// The command is never split: shell redirection and pipes in it are
/// interpreted by the in-container shell.
pub fn run_args(spec: &RunSpec<'_>) -> Vec<OsString> {
    vec![
        "run".into(),
        "--rm".into(),
        "-i".into(),
        "--name".into(),
        spec.container_name.into(),
        "-v".into(),
        mount_spec(spec.host_dir, spec.container_dir, spec.selinux_label),
        "-w".into(),
        spec.container_dir.into(),
        spec.image.into(),
        SHELL.into(),
        "-c".into(),
        spec.command.into(),
    ]
}

/// Force-remove a container, killing it if it is still running.
pub fn remove_args(container_name: &str) -> Vec<OsString> {
    vec!["rm".into(), "--force".into(), container_name.into()]
}

/// Daemon server version probe.
pub fn version_args() -> Vec<OsString> {
    vec!["version".into(), "--format".into(), "{{.Server.Version}}".into()]
}

/// Daemon info probe; prints `OK` when the daemon answers.
pub fn info_args() -> Vec<OsString> {
    vec!["info".into(), "--format".into(), "OK".into()]
}

pub fn inspect_image_args(image: &str) -> Vec<OsString> {
    vec!["image".into(), "inspect".into(), image.into()]
}

pub fn pull_args(image: &str) -> Vec<OsString> {
    vec!["pull".into(), image.into()]
}
