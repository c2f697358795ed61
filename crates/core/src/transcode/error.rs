//! Error types for the transcode module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned synchronously when starting a segmented transcode.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The request violates an invariant. No process was started.
    #[error("Invalid transcode config: {reason}")]
    InvalidConfig { reason: String },

    /// Encoder binary not found.
    #[error("Encoder not found at path: {path}")]
    EncoderNotFound { path: PathBuf },

    /// The encoder could not be started.
    #[error("Failed to start encoder {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output pipe was not available after spawning.
    #[error("Encoder {stream} pipe was not captured")]
    PipeUnavailable { stream: &'static str },

    /// Cancelled before the encoder was started.
    #[error("Transcode cancelled")]
    Cancelled,
}

impl TranscodeError {
    /// Creates a new invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Maps a spawn failure, singling out a missing binary.
    pub fn spawn(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::EncoderNotFound { path }
        } else {
            Self::Spawn { path, source }
        }
    }
}

/// Errors from inspecting the input media. These never abort a transcode.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    ProberNotFound { path: PathBuf },

    /// I/O error running the prober.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The prober exited unsuccessfully.
    #[error("ffprobe failed with code {code:?}: {stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },

    /// Output did not match the expected schema.
    #[error("Failed to parse ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),

    /// No video stream in the input.
    #[error("no video streams found")]
    NoVideoStream,

    /// Cancelled while probing.
    #[error("Probe cancelled")]
    Cancelled,
}
