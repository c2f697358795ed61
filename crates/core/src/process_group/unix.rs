use std::io;
use tokio::process::Command;

use super::{KillError, KillScope};

pub(super) fn configure(cmd: &mut Command) {
    // pgid == pid of the spawned process
    cmd.process_group(0);
}

pub(super) fn kill(pid: u32, exited: bool) -> Result<KillScope, KillError> {
    let raw_pid = pid as libc::pid_t;

    // SAFETY: getpgid only reads kernel state for the given pid.
    let pgid = unsafe { libc::getpgid(raw_pid) };

    if pgid < 0 {
        let err = io::Error::last_os_error();

        if exited {
            // The leader is reaped but the group it created may still have
            // members. A pid is never reused while its group exists.
            tracing::debug!(pid, "Leader already reaped, sweeping its process group");
            return signal_group(pid, raw_pid).map(|_| KillScope::Group);
        }

        tracing::warn!(pid, error = %err, "Could not get process group id, killing process only");
        return signal_process(pid, raw_pid).map(|_| KillScope::Process);
    }

    if pgid != raw_pid {
        // Not a group leader: signalling its group could hit unrelated
        // processes, including this one.
        tracing::warn!(pid, pgid, "Process does not lead its group, killing process only");
        return signal_process(pid, raw_pid).map(|_| KillScope::Process);
    }

    signal_group(pid, pgid).map(|_| KillScope::Group)
}

fn signal_group(pid: u32, pgid: libc::pid_t) -> Result<(), KillError> {
    tracing::debug!(pid, pgid, "Killing process group");
    // SAFETY: plain syscall, a negated pid addresses the whole group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    check(pid, rc)
}

fn signal_process(pid: u32, raw_pid: libc::pid_t) -> Result<(), KillError> {
    // SAFETY: plain syscall on a single pid.
    let rc = unsafe { libc::kill(raw_pid, libc::SIGKILL) };
    check(pid, rc)
}

fn check(pid: u32, rc: libc::c_int) -> Result<(), KillError> {
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        // Already gone
        return Ok(());
    }

    Err(KillError::Signal { pid, source: err })
}
