use std::os::windows::process::CommandExt;
use tokio::process::Command;

use super::{KillError, KillScope};

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// taskkill exit code when the pid does not exist.
const TASKKILL_NOT_FOUND: i32 = 128;

pub(super) fn configure(cmd: &mut Command) {
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

pub(super) fn kill(pid: u32, exited: bool) -> Result<KillScope, KillError> {
    if exited {
        // taskkill walks the tree from a live parent; nothing left to target.
        return Ok(KillScope::Group);
    }

    tracing::debug!(pid, "Killing process tree with taskkill");

    let output = std::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .creation_flags(CREATE_NO_WINDOW)
        .output()
        .map_err(|e| KillError::TreeKill {
            pid,
            reason: e.to_string(),
        })?;

    if output.status.success() || output.status.code() == Some(TASKKILL_NOT_FOUND) {
        return Ok(KillScope::Group);
    }

    Err(KillError::TreeKill {
        pid,
        reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
