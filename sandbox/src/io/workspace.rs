//! Per-execution staging directories.
//!
//! A [`Workspace`] holds exactly two files, the submitted code and the stdin
//! payload, and is bound into the container. The directory is removed when the
//! workspace is released or dropped, so every exit path of the caller
//! (including early returns and panics) tears it down.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};
use thiserror::Error;
use tracing::{debug, instrument};

const WORKSPACE_PREFIX: &str = "judge-";
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Staging area could not be created or populated.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("create workspace under {}: {cause}", parent.display())]
    Create { parent: PathBuf, cause: io::Error },
    #[error("set permissions on {}: {cause}", path.display())]
    Permissions { path: PathBuf, cause: io::Error },
    #[error("write {}: {cause}", path.display())]
    Write { path: PathBuf, cause: io::Error },
}

/// Fixed file names inside every workspace.
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceFiles<'a> {
    pub code_file: &'a str,
    pub input_file: &'a str,
}

/// Exclusively owned staging directory.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    code_path: PathBuf,
    input_path: PathBuf,
}

impl Workspace {
    /// Host path of the staging directory (the bind-mount source).
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn code_path(&self) -> &Path {
        &self.code_path
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Container name unique to this workspace.
    ///
    /// Derived from the directory name, restricted to characters every
    /// runtime accepts in a container name.
    pub fn container_name(&self) -> String {
        let name = self
            .dir
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix: String = name
            .trim_start_matches(WORKSPACE_PREFIX)
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
            .collect();
        format!("{WORKSPACE_PREFIX}{suffix}")
    }

    /// Remove the directory tree now, reporting removal errors.
    pub fn release(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "workspace released");
        Ok(())
    }
}

/// Create a uniquely named workspace under `parent` and stage both files.
///
/// Directory mode is `0755` and file mode `0644` so a sandboxed process running
/// under a different UID can read them.
#[instrument(skip_all, fields(parent = %parent.display(), code_bytes = code.len(), stdin_bytes = stdin.len()))]
pub fn provision(
    parent: &Path,
    files: &WorkspaceFiles<'_>,
    code: &[u8],
    stdin: &[u8],
) -> Result<Workspace, ProvisionError> {
    fs::create_dir_all(parent).map_err(|cause| ProvisionError::Create {
        parent: parent.to_path_buf(),
        cause,
    })?;
    let dir = Builder::new()
        .prefix(WORKSPACE_PREFIX)
        .rand_bytes(10)
        .tempdir_in(parent)
        .map_err(|cause| ProvisionError::Create {
            parent: parent.to_path_buf(),
            cause,
        })?;
    set_mode(dir.path(), DirOrFile::Dir)?;

    let code_path = dir.path().join(files.code_file);
    write_file(&code_path, code)?;
    let input_path = dir.path().join(files.input_file);
    write_file(&input_path, stdin)?;

    debug!(path = %dir.path().display(), "workspace provisioned");
    Ok(Workspace {
        dir,
        code_path,
        input_path,
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ProvisionError> {
    fs::write(path, contents).map_err(|cause| ProvisionError::Write {
        path: path.to_path_buf(),
        cause,
    })?;
    set_mode(path, DirOrFile::File)
}

#[derive(Clone, Copy)]
enum DirOrFile {
    Dir,
    File,
}

#[cfg(unix)]
fn set_mode(path: &Path, kind: DirOrFile) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = match kind {
        DirOrFile::Dir => DIR_MODE,
        DirOrFile::File => FILE_MODE,
    };
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|cause| {
        ProvisionError::Permissions {
            path: path.to_path_buf(),
            cause,
        }
    })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _kind: DirOrFile) -> Result<(), ProvisionError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    const FILES: WorkspaceFiles<'static> = WorkspaceFiles {
        code_file: "solution.py",
        input_file: "input.txt",
    };

    #[test]
    fn stages_code_and_input() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = provision(temp.path(), &FILES, b"print(1)", b"alice").expect("provision");

        assert_eq!(fs::read(ws.code_path()).expect("code"), b"print(1)");
        assert_eq!(fs::read(ws.input_path()).expect("input"), b"alice");
        assert_eq!(ws.code_path(), ws.path().join("solution.py"));
        let entries = fs::read_dir(ws.path()).expect("read dir").count();
        assert_eq!(entries, 2);
    }

    #[cfg(unix)]
    #[test]
    fn workspace_is_readable_by_other_users() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let ws = provision(temp.path(), &FILES, b"", b"").expect("provision");
        let dir_mode = fs::metadata(ws.path()).expect("meta").permissions().mode();
        let file_mode = fs::metadata(ws.code_path())
            .expect("meta")
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o777, 0o755);
        assert_eq!(file_mode & 0o777, 0o644);
    }

    #[test]
    fn release_removes_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = provision(temp.path(), &FILES, b"x", b"y").expect("provision");
        let path = ws.path().to_path_buf();
        ws.release().expect("release");
        assert!(!path.exists());
    }

    #[test]
    fn panic_still_removes_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut seen = None;
        let result = catch_unwind(AssertUnwindSafe(|| {
            let ws = provision(temp.path(), &FILES, b"x", b"y").expect("provision");
            seen = Some(ws.path().to_path_buf());
            panic!("launcher blew up");
        }));
        assert!(result.is_err());
        let path = seen.expect("workspace path");
        assert!(!path.exists());
    }

    #[test]
    fn names_are_unique_across_threads() {
        let temp = tempfile::tempdir().expect("tempdir");
        let names: Vec<(PathBuf, String)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    scope.spawn(|| {
                        let ws = provision(temp.path(), &FILES, b"", b"").expect("provision");
                        (ws.path().to_path_buf(), ws.container_name())
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("join"))
                .collect()
        });
        let paths: HashSet<_> = names.iter().map(|(path, _)| path.clone()).collect();
        let containers: HashSet<_> = names.iter().map(|(_, name)| name.clone()).collect();
        assert_eq!(paths.len(), 16);
        assert_eq!(containers.len(), 16);
        assert_eq!(fs::read_dir(temp.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn container_name_uses_workspace_suffix() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = provision(temp.path(), &FILES, b"", b"").expect("provision");
        let name = ws.container_name();
        let dir_name = ws
            .path()
            .file_name()
            .expect("file name")
            .to_string_lossy()
            .into_owned();
        assert_eq!(name, dir_name);
        assert!(name.starts_with("judge-"));
    }

    #[test]
    fn missing_parent_is_created() {
        let temp = tempfile::tempdir().expect("tempdir");
        let parent = temp.path().join("nested").join("workspaces");
        let ws = provision(&parent, &FILES, b"", b"").expect("provision");
        assert!(ws.path().starts_with(&parent));
    }

    #[test]
    fn unwritable_parent_is_a_create_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("file");
        fs::write(&blocker, "not a dir").expect("write");
        let err = provision(&blocker, &FILES, b"", b"").expect_err("provision fails");
        assert!(matches!(err, ProvisionError::Create { .. }));
    }
}
