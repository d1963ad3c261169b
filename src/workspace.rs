//! Ephemeral tmpfs workspace that isolates each test case.
//!
//! Every test case gets a freshly mounted, size-bounded tmpfs at the same
//! path. Mounting over the path hides (and unmounting destroys) whatever the
//! previous case left behind.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{BenchError, Result};

/// What an unmount attempt found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountOutcome {
    Unmounted,
    NotMounted,
}

/// The OS mount facility.
pub trait MountFacility {
    fn mount_tmpfs(&self, path: &Path, size: &str) -> Result<()>;
    fn unmount(&self, path: &Path) -> Result<UnmountOutcome>;
}

/// Shells out to `mount(8)` and `umount(8)`. Needs root.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMount;

impl MountFacility for SystemMount {
    fn mount_tmpfs(&self, path: &Path, size: &str) -> Result<()> {
        let output = mount_command(path, size)
            .output()
            .map_err(|source| BenchError::Spawn {
                program: "mount".into(),
                source,
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(BenchError::Mount {
                path: path.to_path_buf(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn unmount(&self, path: &Path) -> Result<UnmountOutcome> {
        let output = umount_command(path)
            .output()
            .map_err(|source| BenchError::Spawn {
                program: "umount".into(),
                source,
            })?;
        if output.status.success() {
            return Ok(UnmountOutcome::Unmounted);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not mounted") {
            Ok(UnmountOutcome::NotMounted)
        } else {
            Err(BenchError::Unmount {
                path: path.to_path_buf(),
                detail: stderr.trim().to_string(),
            })
        }
    }
}

fn mount_command(path: &Path, size: &str) -> Command {
    let mut cmd = Command::new("mount");
    cmd.args(["-t", "tmpfs", "-o"])
        .arg(format!("size={}", size))
        .arg("tmpfs")
        .arg(path)
        .env("LC_ALL", "C")
        .stdout(Stdio::null());
    cmd
}

/// `unmount` matches English stderr, so the message locale is pinned.
fn umount_command(path: &Path) -> Command {
    let mut cmd = Command::new("umount");
    cmd.arg(path).env("LC_ALL", "C").stdout(Stdio::null());
    cmd
}

/// How to treat an unmount failure while clearing a crashed prior run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Log and carry on; the following mount reports any real problem.
    Tolerate,
    /// Fail the acquire.
    Strict,
}

pub const TOLERATE_TRANSIENT_CLEANUP_FAILURE: CleanupPolicy = CleanupPolicy::Tolerate;

/// A mount point that hosts at most one live tmpfs at a time.
pub struct IsolatedWorkspace<M> {
    mount: M,
    path: PathBuf,
    size: String,
    cleanup: CleanupPolicy,
}

impl<M: MountFacility> IsolatedWorkspace<M> {
    pub fn new(mount: M, path: impl Into<PathBuf>, size: impl Into<String>) -> Self {
        Self {
            mount,
            path: path.into(),
            size: size.into(),
            cleanup: TOLERATE_TRANSIENT_CLEANUP_FAILURE,
        }
    }

    pub fn with_cleanup_policy(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort unmount of anything a previous run left mounted.
    pub fn clear_stale(&self) -> Result<()> {
        match self.mount.unmount(&self.path) {
            Ok(UnmountOutcome::Unmounted) => {
                info!(path = %self.path.display(), "removed stale workspace mount");
                Ok(())
            }
            Ok(UnmountOutcome::NotMounted) => Ok(()),
            Err(e) if self.cleanup == CleanupPolicy::Tolerate => {
                warn!(path = %self.path.display(), error = %e, "ignoring pre-cleanup unmount failure");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Mount a fresh tmpfs. The guard releases it again.
    ///
    /// Taking `&mut self` keeps a second workspace from being acquired while
    /// the first guard is alive.
    pub fn acquire(&mut self) -> Result<WorkspaceGuard<'_, M>> {
        self.clear_stale()?;
        self.mount.mount_tmpfs(&self.path, &self.size)?;
        debug!(path = %self.path.display(), size = %self.size, "workspace mounted");
        Ok(WorkspaceGuard {
            workspace: self,
            released: false,
        })
    }

    /// Unmount the workspace; "not mounted" counts as success.
    pub fn release(&self) -> Result<()> {
        match self.mount.unmount(&self.path)? {
            UnmountOutcome::Unmounted => debug!(path = %self.path.display(), "workspace unmounted"),
            UnmountOutcome::NotMounted => debug!(path = %self.path.display(), "workspace already unmounted"),
        }
        Ok(())
    }
}

/// Live workspace mount.
///
/// Call [`WorkspaceGuard::release`] on the normal path so unmount errors
/// surface. If the guard is dropped unreleased (early return, panic) the
/// unmount still happens and failures are only logged.
pub struct WorkspaceGuard<'a, M: MountFacility> {
    workspace: &'a IsolatedWorkspace<M>,
    released: bool,
}

impl<M: MountFacility> WorkspaceGuard<'_, M> {
    pub fn path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.workspace.release()
    }
}

impl<M: MountFacility> Drop for WorkspaceGuard<'_, M> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.workspace.release() {
            warn!(path = %self.workspace.path().display(), error = %e, "workspace release on unwind failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn locale(cmd: &Command) -> Option<&OsStr> {
        cmd.get_envs()
            .find(|(key, _)| *key == "LC_ALL")
            .and_then(|(_, value)| value)
    }

    #[test]
    fn mount_commands_run_in_the_c_locale() {
        let path = Path::new("/var/lib/rkt");
        assert_eq!(locale(&umount_command(path)), Some(OsStr::new("C")));
        assert_eq!(locale(&mount_command(path, "20G")), Some(OsStr::new("C")));
    }

    #[test]
    fn mount_command_bounds_the_tmpfs_size() {
        let cmd = mount_command(Path::new("/var/lib/rkt"), "20G");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["-t", "tmpfs", "-o", "size=20G", "tmpfs", "/var/lib/rkt"]);
    }
}
