//! Types for segmented transcoding.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::TranscodeError;

static SEGMENT_INDEX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"-(\d+)\.ts$").ok());

/// One segmented transcode request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Media file to transcode.
    pub input_path: PathBuf,
    /// Directory segments are written into.
    pub output_dir: PathBuf,
    /// Segment file name prefix, e.g. `seg` for `seg-00001.ts`.
    pub segment_prefix: String,
    /// Number given to the first produced segment.
    #[serde(default)]
    pub segment_offset: u32,
    /// Ordered segment boundaries in seconds. The first is the start of the
    /// segment set and the last is its end.
    pub segment_times: Vec<f64>,
    /// Target video encoding, if video should be encoded.
    #[serde(default)]
    pub video: Option<VideoProfile>,
    /// Target audio encoding, if audio should be encoded.
    #[serde(default)]
    pub audio: Option<AudioProfile>,
}

impl TranscodeConfig {
    /// Creates a config with no video or audio profile.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        segment_prefix: impl Into<String>,
        segment_times: Vec<f64>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            segment_prefix: segment_prefix.into(),
            segment_offset: 0,
            segment_times,
            video: None,
            audio: None,
        }
    }

    /// Sets the starting segment index.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.segment_offset = offset;
        self
    }

    /// Sets the video profile.
    pub fn with_video(mut self, video: VideoProfile) -> Self {
        self.video = Some(video);
        self
    }

    /// Sets the audio profile.
    pub fn with_audio(mut self, audio: AudioProfile) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Checks the request invariants and derives the boundary plan.
    pub fn boundaries(&self) -> Result<SegmentBoundarySet, TranscodeError> {
        if let Some(video) = &self.video {
            video.validate()?;
        }
        if let Some(audio) = &self.audio {
            audio.validate()?;
        }
        SegmentBoundarySet::from_times(&self.segment_times)
    }

    /// Output pattern handed to the encoder, e.g. `/out/seg-%05d.ts`.
    pub fn output_pattern(&self) -> PathBuf {
        self.output_dir.join(format!("{}-%05d.ts", self.segment_prefix))
    }
}

/// Target video encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
}

impl VideoProfile {
    pub fn new(width: u32, height: u32, bitrate_kbps: u32) -> Self {
        Self {
            width,
            height,
            bitrate_kbps,
        }
    }

    /// Scale filter that pins the larger requested dimension and lets the
    /// encoder derive the other one, rounded to an even value.
    pub fn scale_filter(&self) -> String {
        if self.width >= self.height {
            format!("scale=-2:{}", self.height)
        } else {
            format!("scale={}:-2", self.width)
        }
    }

    fn validate(&self) -> Result<(), TranscodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(TranscodeError::invalid_config(format!(
                "video dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.bitrate_kbps == 0 {
            return Err(TranscodeError::invalid_config(
                "video bitrate must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Target audio encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProfile {
    pub bitrate_kbps: u32,
}

impl AudioProfile {
    pub fn new(bitrate_kbps: u32) -> Self {
        Self { bitrate_kbps }
    }

    fn validate(&self) -> Result<(), TranscodeError> {
        if self.bitrate_kbps == 0 {
            return Err(TranscodeError::invalid_config(
                "audio bitrate must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Formats a time value the way the encoder expects it.
pub fn format_time(secs: f64) -> String {
    format!("{:.6}", secs)
}

/// Timing plan derived from the boundary list.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBoundarySet {
    /// First boundary, where encoding starts.
    pub start: f64,
    /// Last boundary, where encoding stops.
    pub end: f64,
    /// Every boundary except the first, comma-joined. Used for both keyframe
    /// forcing and segment splitting.
    pub split_points: String,
}

impl SegmentBoundarySet {
    /// Builds the plan from an ordered boundary list.
    pub fn from_times(times: &[f64]) -> Result<Self, TranscodeError> {
        if times.len() < 2 {
            return Err(TranscodeError::invalid_config(format!(
                "minimum 2 segment times needed, got {}",
                times.len()
            )));
        }

        if let Some(bad) = times.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(TranscodeError::invalid_config(format!(
                "segment times must be finite and non-negative, got {}",
                bad
            )));
        }

        if let Some(pair) = times.windows(2).find(|w| w[1] < w[0]) {
            return Err(TranscodeError::invalid_config(format!(
                "segment times must be non-decreasing, {} follows {}",
                pair[1], pair[0]
            )));
        }

        let split_points = times[1..]
            .iter()
            .map(|t| format_time(*t))
            .collect::<Vec<_>>()
            .join(",");

        Ok(Self {
            start: times[0],
            end: times[times.len() - 1],
            split_points,
        })
    }

    /// Whether the encoder needs an explicit seek. Seeking to exactly zero is
    /// left out because the encoder can reject the adjusted timestamp.
    pub fn needs_seek(&self) -> bool {
        self.start > 0.0
    }
}

/// Pixel format reported by the prober. Empty means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelFormat(String);

impl PixelFormat {
    pub fn new(format: impl Into<String>) -> Self {
        Self(format.into())
    }

    /// The "unknown" descriptor, which selects the default profile.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("unknown")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// One completed output segment as reported by the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentNotification {
    /// Segment name exactly as the encoder reported it.
    pub file_name: String,
    /// The name joined onto the output directory.
    pub path: PathBuf,
}

impl SegmentNotification {
    pub fn new(file_name: impl Into<String>, output_dir: &Path) -> Self {
        let file_name = file_name.into();
        let path = output_dir.join(&file_name);
        Self { file_name, path }
    }

    /// Numeric index parsed from a `<prefix>-<digits>.ts` name.
    pub fn index(&self) -> Option<u32> {
        let re = SEGMENT_INDEX.as_ref()?;
        re.captures(&self.file_name)?.get(1)?.as_str().parse().ok()
    }
}

impl fmt::Display for SegmentNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// Lifecycle of one segmented transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeState {
    Idle,
    Starting,
    Running,
    /// The encoder has exited and the output readers are finishing.
    Draining,
    Completed,
    /// The encoder exited unsuccessfully. `code` is `None` when it was
    /// terminated by a signal.
    Failed { code: Option<i32> },
    Killed,
}

impl TranscodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranscodeState::Completed | TranscodeState::Failed { .. } | TranscodeState::Killed
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TranscodeState::Completed)
    }
}

impl fmt::Display for TranscodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeState::Idle => f.write_str("idle"),
            TranscodeState::Starting => f.write_str("starting"),
            TranscodeState::Running => f.write_str("running"),
            TranscodeState::Draining => f.write_str("draining"),
            TranscodeState::Completed => f.write_str("completed"),
            TranscodeState::Failed { code: Some(code) } => write!(f, "failed (exit code {})", code),
            TranscodeState::Failed { code: None } => f.write_str("failed (terminated by signal)"),
            TranscodeState::Killed => f.write_str("killed"),
        }
    }
}
