//! Configuration for the segmenter.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::probe::ffprobe_for;

/// Settings for the ffmpeg-based segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary. Derived from `ffmpeg_path` when unset.
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// x264 preset.
    #[serde(default = "default_video_preset")]
    pub video_preset: String,

    /// Capacity of the segment notification channel.
    #[serde(default = "default_segment_buffer")]
    pub segment_buffer: usize,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_log_level() -> String {
    "warning".to_string()
}

fn default_video_preset() -> String {
    "faster".to_string()
}

fn default_segment_buffer() -> usize {
    8
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: None,
            log_level: default_log_level(),
            video_preset: default_video_preset(),
            segment_buffer: default_segment_buffer(),
        }
    }
}

impl EncoderConfig {
    /// Creates a config for the given ffmpeg binary.
    pub fn with_ffmpeg(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ..Default::default()
        }
    }

    /// Sets an explicit ffprobe binary.
    pub fn with_ffprobe(mut self, ffprobe_path: impl Into<PathBuf>) -> Self {
        self.ffprobe_path = Some(ffprobe_path.into());
        self
    }

    /// Sets the notification channel capacity.
    pub fn with_segment_buffer(mut self, capacity: usize) -> Self {
        self.segment_buffer = capacity;
        self
    }

    /// The ffprobe binary to use.
    pub fn resolved_ffprobe_path(&self) -> PathBuf {
        self.ffprobe_path
            .clone()
            .unwrap_or_else(|| ffprobe_for(&self.ffmpeg_path))
    }
}
