//! Encoder command line construction.

use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::config::EncoderConfig;
use super::error::TranscodeError;
use super::profile::H264Profile;
use super::traits::FormatProber;
use super::types::{format_time, TranscodeConfig};

/// Tolerance, in seconds, when matching split points to keyframes.
const SEGMENT_TIME_DELTA: &str = "0.2";

/// H.264 level for every video rendition.
const H264_LEVEL: &str = "4.0";

/// Builds the ffmpeg arguments for one segmented transcode.
///
/// Keyframes are forced at exactly the same timestamps the segment muxer
/// splits on, otherwise segments would not start on a keyframe.
pub fn build_args(
    settings: &EncoderConfig,
    config: &TranscodeConfig,
    profile: H264Profile,
) -> Result<Vec<String>, TranscodeError> {
    let boundaries = config.boundaries()?;

    let mut args = vec!["-loglevel".to_string(), settings.log_level.clone()];

    if boundaries.needs_seek() {
        args.extend(["-ss".to_string(), format_time(boundaries.start)]);
    }

    // Input specs. -copyts keeps -to relative to the original timestamps.
    args.extend([
        "-i".to_string(),
        config.input_path.to_string_lossy().to_string(),
        "-to".to_string(),
        format_time(boundaries.end),
        "-copyts".to_string(),
        "-force_key_frames".to_string(),
        boundaries.split_points.clone(),
        "-sn".to_string(),
    ]);

    if let Some(video) = &config.video {
        args.extend([
            "-vf".to_string(),
            video.scale_filter(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            settings.video_preset.clone(),
            "-profile:v".to_string(),
            profile.as_str().to_string(),
            "-level:v".to_string(),
            H264_LEVEL.to_string(),
            "-b:v".to_string(),
            format!("{}k", video.bitrate_kbps),
        ]);
    }

    if let Some(audio) = &config.audio {
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", audio.bitrate_kbps),
        ]);
    }

    // Completed segment names go to stdout, one per line.
    args.extend([
        "-f".to_string(),
        "segment".to_string(),
        "-segment_time_delta".to_string(),
        SEGMENT_TIME_DELTA.to_string(),
        "-segment_format".to_string(),
        "mpegts".to_string(),
        "-segment_times".to_string(),
        boundaries.split_points,
        "-segment_start_number".to_string(),
        config.segment_offset.to_string(),
        "-segment_list_type".to_string(),
        "flat".to_string(),
        "-segment_list".to_string(),
        "pipe:1".to_string(),
        config.output_pattern().to_string_lossy().to_string(),
    ]);

    Ok(args)
}

/// Picks the H.264 profile for the input. Probe failures fall back to the
/// default profile; they never stop the transcode.
pub async fn select_profile(
    prober: &dyn FormatProber,
    cancel: &CancellationToken,
    input: &Path,
) -> H264Profile {
    match prober.pixel_format(cancel, input).await {
        Ok(pix_fmt) => {
            let profile = H264Profile::for_format(&pix_fmt);
            tracing::info!(
                input = %input.display(),
                pix_fmt = %pix_fmt,
                profile = profile.as_str(),
                "Detected pixel format"
            );
            profile
        }
        Err(e) => {
            tracing::warn!(
                input = %input.display(),
                "Could not detect video format, using default profile: {}",
                e
            );
            H264Profile::default()
        }
    }
}
