//! Error types for process group termination.

use thiserror::Error;

/// Errors from killing a process group.
///
/// Failing to resolve the group id is not one of these: that case falls back
/// to killing the direct process and is only logged.
#[derive(Debug, Error)]
pub enum KillError {
    /// Delivering the kill signal failed.
    #[error("Failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// The tree kill utility could not be run or reported failure.
    #[error("Failed to kill process tree of {pid}: {reason}")]
    TreeKill { pid: u32, reason: String },
}
