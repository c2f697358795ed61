//! Segmented transcoding for adaptive streaming.
//!
//! Drives ffmpeg's segment muxer so that every segment starts on a forced
//! keyframe at a caller-supplied boundary, and streams the names of completed
//! segments while the encoder is still running.
//!
//! # Features
//!
//! - Frame-accurate boundaries (keyframes and split points share one list)
//! - 4:2:2 inputs detected with ffprobe and encoded with the `high422` profile
//! - Aspect-preserving scaling anchored on the larger requested dimension
//! - Process-group teardown on cancellation, so no encoder child outlives
//!   the transcode
//!
//! # Example
//!
//! ```ignore
//! use hlsvod_core::transcode::{transcode_segments, TranscodeConfig, VideoProfile};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = TranscodeConfig::new("/media/in.mkv", "/var/hls", "seg", vec![0.0, 4.0, 8.0])
//!     .with_video(VideoProfile::new(1280, 720, 3000));
//!
//! let mut segments = transcode_segments(CancellationToken::new(), "ffmpeg", config).await?;
//! while let Some(segment) = segments.next_segment().await {
//!     println!("ready: {}", segment.path.display());
//! }
//! println!("transcode {}", segments.finished().await);
//! ```

mod args;
mod config;
mod error;
mod probe;
mod profile;
mod segmenter;
mod sink;
mod traits;
mod types;

pub use args::{build_args, select_profile};
pub use config::EncoderConfig;
pub use error::{ProbeError, TranscodeError};
pub use probe::{ffprobe_for, FfprobeProber};
pub use profile::{is_high_chroma, H264Profile};
pub use segmenter::{transcode_segments, FfmpegSegmenter, SegmentStream};
pub use sink::TracingSink;
pub use traits::{DiagnosticSink, FormatProber, Transcoder};
pub use types::{
    format_time, AudioProfile, PixelFormat, SegmentBoundarySet, SegmentNotification,
    TranscodeConfig, TranscodeState, VideoProfile,
};
