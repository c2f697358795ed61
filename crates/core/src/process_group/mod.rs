//! Process group lifecycle management.
//!
//! A process spawned through [`configure`] heads its own process group (a new
//! process group on Unix, `CREATE_NEW_PROCESS_GROUP` on Windows). Killing the
//! [`ProcessGroup`] then reaches every descendant, not just the direct child.
//!
//! The platform variant is picked at build time; nothing outside this module
//! looks at the target platform.
//!
//! # Example
//!
//! ```rust,ignore
//! use hlsvod_core::process_group::{self, ProcessGroup};
//! use tokio::process::Command;
//!
//! let mut cmd = Command::new("ffmpeg");
//! process_group::configure(&mut cmd);
//! let child = cmd.spawn()?;
//!
//! let group = ProcessGroup::from_child(&child);
//! group.kill()?;
//! group.kill()?; // no-op
//! ```

mod error;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as platform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as platform;

pub use error::KillError;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::{Child, Command};

/// Makes the command head its own process group once started.
///
/// Call this before spawning.
pub fn configure(cmd: &mut Command) {
    platform::configure(cmd);
}

/// How far a delivered kill reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KillScope {
    /// Every member of the group, or the whole tree.
    Group,
    /// Only the direct process; descendants may still be alive.
    Process,
}

#[derive(Debug, Default)]
struct GroupState {
    pid: Option<u32>,
    exited: AtomicBool,
    killed: AtomicBool,
}

/// Handle to a spawned process and all of its descendants.
///
/// Cloning is cheap; every clone refers to the same group. The handle only
/// holds the identifying pid, so [`ProcessGroup::kill`] can run while another
/// task is waiting on the child.
#[derive(Debug, Clone, Default)]
pub struct ProcessGroup {
    state: Arc<GroupState>,
}

impl ProcessGroup {
    /// A group for a process that was never started. Killing it does nothing.
    pub fn unstarted() -> Self {
        Self::default()
    }

    /// Tracks a child spawned from a [`configure`]d command.
    pub fn from_child(child: &Child) -> Self {
        Self::from_pid(child.id())
    }

    pub(crate) fn from_pid(pid: Option<u32>) -> Self {
        Self {
            state: Arc::new(GroupState {
                pid,
                ..Default::default()
            }),
        }
    }

    /// Pid of the group leader, if it was started.
    pub fn pid(&self) -> Option<u32> {
        self.state.pid
    }

    /// Records that the leader has been reaped.
    pub fn mark_exited(&self) {
        self.state.exited.store(true, Ordering::SeqCst);
    }

    pub fn has_exited(&self) -> bool {
        self.state.exited.load(Ordering::SeqCst)
    }

    /// Whether a kill has already reached the whole group.
    pub fn was_killed(&self) -> bool {
        self.state.killed.load(Ordering::SeqCst)
    }

    /// Kills the whole process tree.
    ///
    /// Safe to call repeatedly, before the process started, or after it
    /// exited; those cases return `Ok(())`.
    pub fn kill(&self) -> Result<(), KillError> {
        let Some(pid) = self.state.pid else {
            return Ok(());
        };

        if self.state.killed.swap(true, Ordering::SeqCst) {
            tracing::debug!(pid, "Process group already killed");
            return Ok(());
        }

        match platform::kill(pid, self.has_exited()) {
            Ok(KillScope::Group) => Ok(()),
            Ok(KillScope::Process) => {
                // Leave the group open to a later sweep
                self.state.killed.store(false, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.state.killed.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_unstarted_is_noop() {
        let group = ProcessGroup::unstarted();
        assert!(group.pid().is_none());
        assert!(group.kill().is_ok());
        assert!(group.kill().is_ok());
        assert!(!group.was_killed());
    }

    #[test]
    fn test_clones_share_state() {
        let group = ProcessGroup::from_pid(None);
        let clone = group.clone();
        clone.mark_exited();
        assert!(group.has_exited());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_twice_is_ok() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        configure(&mut cmd);
        let mut child = cmd.spawn().unwrap();
        let group = ProcessGroup::from_child(&child);

        assert!(group.kill().is_ok());
        assert!(group.was_killed());
        assert!(group.kill().is_ok());

        let status = child.wait().await.unwrap();
        assert!(!status.success());
        group.mark_exited();
        assert!(group.kill().is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_only_kill_leaves_group_sweepable() {
        // Without configure() the child shares this process's group
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let group = ProcessGroup::from_child(&child);

        assert!(group.kill().is_ok());
        assert!(!group.was_killed());
        assert!(!child.wait().await.unwrap().success());

        // A later sweep still runs instead of short-circuiting
        group.mark_exited();
        assert!(group.kill().is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_after_natural_exit() {
        let mut cmd = Command::new("true");
        configure(&mut cmd);
        let mut child = cmd.spawn().unwrap();
        let group = ProcessGroup::from_child(&child);

        assert!(child.wait().await.unwrap().success());
        group.mark_exited();

        assert!(group.kill().is_ok());
        assert!(group.kill().is_ok());
    }
}
