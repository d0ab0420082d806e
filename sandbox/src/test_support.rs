//! Test-only stand-in for a Docker-compatible runtime CLI.
//!
//! [`FakeRuntime`] writes a POSIX shell script that answers the commands the
//! engine issues (`version`, `info`, `image inspect`, `pull`, `run`, `rm`).
//! Flag files in its state directory switch individual commands into failure
//! or hang modes.
//! `run` executes the command on the host inside the workspace directory, with
//! the in-container mount path rewritten to the host path, so whole executions
//! can be tested without a daemon.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
# Fake container runtime generated for tests.
[ $# -eq 0 ] && exit 0
STATE='__STATE__'
printf '%s\n' "$*" >> "$STATE/calls.log"

image_key() {
  printf '%s' "$1" | tr '/:' '__'
}

case "$1" in
  version)
    if [ -f "$STATE/version_hangs" ]; then
      exec sleep 30
    fi
    if [ -f "$STATE/daemon_down" ]; then
      echo "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?" >&2
      exit 1
    fi
    echo "24.0.7-fake"
    ;;
  info)
    if [ -f "$STATE/daemon_down" ] || [ -f "$STATE/info_denied" ]; then
      echo "permission denied while trying to connect to the Docker daemon socket" >&2
      exit 1
    fi
    echo "OK"
    ;;
  image)
    if [ -f "$STATE/images/$(image_key "$3")" ]; then
      echo "[]"
      exit 0
    fi
    echo "Error: No such image: $3" >&2
    exit 1
    ;;
  pull)
    if [ -f "$STATE/pull_hangs" ]; then
      exec sleep 30
    fi
    if [ -f "$STATE/pull_fails" ]; then
      echo "Error response from daemon: pull access denied for $2" >&2
      exit 1
    fi
    : > "$STATE/images/$(image_key "$2")"
    echo "Status: Downloaded newer image for $2"
    ;;
  rm)
    NAME="$3"
    if [ -f "$STATE/rm_fails" ]; then
      echo "Error response from daemon: cannot remove container $NAME: device or resource busy" >&2
      exit 1
    fi
    if [ -f "$STATE/containers/$NAME.pid" ]; then
      kill -9 "$(cat "$STATE/containers/$NAME.pid")" 2>/dev/null
    fi
    echo "$NAME"
    ;;
  run)
    shift
    NAME=""
    HOST=""
    MOUNT=""
    while [ $# -gt 0 ]; do
      case "$1" in
        --rm|-i) shift ;;
        --name) NAME="$2"; shift 2 ;;
        -v) HOST="${2%%:*}"; REST="${2#*:}"; MOUNT="${REST%%:*}"; shift 2 ;;
        -w) shift 2 ;;
        *) break ;;
      esac
    done
    IMAGE="$1"
    if [ ! -f "$STATE/images/$(image_key "$IMAGE")" ]; then
      echo "Unable to find image '$IMAGE' locally" >&2
      exit 125
    fi
    CMD="$4"
    echo $$ > "$STATE/containers/$NAME.pid"
    cd "$HOST" || exit 125
    CMD=$(printf '%s' "$CMD" | sed "s#$MOUNT#$HOST#g")
    exec sh -c "$CMD"
    ;;
  *)
    echo "fake runtime: unknown command $1" >&2
    exit 1
    ;;
esac
"#;

/// Linux `ETXTBSY`: the script is still open for writing in a forked child.
const TEXT_FILE_BUSY: i32 = 26;

/// Scriptable fake container runtime living in its own temp directory.
pub struct FakeRuntime {
    dir: TempDir,
    path: PathBuf,
}

impl FakeRuntime {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("fake-runtime-")
            .tempdir()
            .context("create fake runtime dir")?;
        let state = dir.path().join("state");
        fs::create_dir_all(state.join("images")).context("create images dir")?;
        fs::create_dir_all(state.join("containers")).context("create containers dir")?;
        fs::write(state.join("calls.log"), "").context("create call log")?;

        let path = dir.path().join("docker");
        let script = SCRIPT.replace("__STATE__", &state.to_string_lossy());
        fs::write(&path, script).with_context(|| format!("write {}", path.display()))?;
        make_executable(&path)?;
        wait_until_executable(&path)?;

        Ok(Self { dir, path })
    }

    /// Absolute path of the fake runtime binary.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn state(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    fn flag(self, name: &str) -> Self {
        fs::write(self.state().join(name), "").expect("write fake runtime flag");
        self
    }

    /// Mark `image` as present locally.
    pub fn with_image(self, image: &str) -> Self {
        let key = image.replace(['/', ':'], "_");
        fs::write(self.state().join("images").join(key), "").expect("write fake image");
        self
    }

    /// Every command fails as if the daemon socket were closed.
    pub fn daemon_down(self) -> Self {
        self.flag("daemon_down")
    }

    /// `version` never answers, like a daemon stuck behind a dead socket.
    pub fn version_hangs(self) -> Self {
        self.flag("version_hangs")
    }

    /// `version` answers but `info` is refused.
    pub fn info_denied(self) -> Self {
        self.flag("info_denied")
    }

    pub fn pull_fails(self) -> Self {
        self.flag("pull_fails")
    }

    /// `pull` never finishes on its own.
    pub fn pull_hangs(self) -> Self {
        self.flag("pull_hangs")
    }

    /// `rm --force` is refused by the daemon.
    pub fn rm_fails(self) -> Self {
        self.flag("rm_fails")
    }

    /// Argument lines of every invocation, in order.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.state().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Pid recorded by `run` for the named container.
    pub fn container_pid(&self, name: &str) -> Option<u32> {
        fs::read_to_string(self.state().join("containers").join(format!("{name}.pid")))
            .ok()
            .and_then(|pid| pid.trim().parse().ok())
    }

    /// Names of every container `run` started.
    pub fn containers(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.state().join("containers"))
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| {
                        entry
                            .file_name()
                            .to_string_lossy()
                            .strip_suffix(".pid")
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    bail!("fake runtime requires a unix host")
}

/// Retry a no-op exec until no forked child still holds the script open for writing.
fn wait_until_executable(path: &Path) -> Result<()> {
    for _ in 0..100 {
        match Command::new(path).status() {
            Ok(_) => return Ok(()),
            Err(err) if err.raw_os_error() == Some(TEXT_FILE_BUSY) => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(err) => {
                return Err(err).with_context(|| format!("exec {}", path.display()));
            }
        }
    }
    bail!("fake runtime {} stayed busy", path.display())
}
