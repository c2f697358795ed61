//! FFprobe-based pixel format detection.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::error::ProbeError;
use super::traits::FormatProber;
use super::types::PixelFormat;

/// Probes the first video stream with ffprobe.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe_path
    }

    /// Arguments for the probe call, restricted to the first video stream.
    pub fn probe_args(input: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_streams".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            input.to_string_lossy().to_string(),
        ]
    }

    /// Extracts the pixel format from ffprobe JSON output.
    pub fn parse_probe_output(output: &str) -> Result<PixelFormat, ProbeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            #[serde(default)]
            pix_fmt: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output)?;

        let stream = probe.streams.into_iter().next().ok_or(ProbeError::NoVideoStream)?;

        Ok(stream.pix_fmt.map(PixelFormat::new).unwrap_or_default())
    }
}

#[async_trait]
impl FormatProber for FfprobeProber {
    async fn pixel_format(
        &self,
        cancel: &CancellationToken,
        input: &Path,
    ) -> Result<PixelFormat, ProbeError> {
        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.args(Self::probe_args(input))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::select! {
            result = cmd.output() => result.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::ProberNotFound {
                        path: self.ffprobe_path.clone(),
                    }
                } else {
                    ProbeError::Io(e)
                }
            })?,
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
        };

        if !output.status.success() {
            return Err(ProbeError::ToolFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(&stdout)
    }
}

/// Derives the ffprobe path that sits next to an ffmpeg binary.
pub fn ffprobe_for(ffmpeg_path: &Path) -> PathBuf {
    match ffmpeg_path.file_name().and_then(|n| n.to_str()) {
        Some(name) if name.contains("ffmpeg") => {
            ffmpeg_path.with_file_name(name.replacen("ffmpeg", "ffprobe", 1))
        }
        _ => ffmpeg_path.with_file_name("ffprobe"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_args() {
        let args = FfprobeProber::probe_args(Path::new("/media/in.mov"));
        assert_eq!(
            args,
            vec![
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "v:0",
                "/media/in.mov"
            ]
        );
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {
                    "index": 0,
                    "codec_name": "prores",
                    "codec_type": "video",
                    "pix_fmt": "yuv422p10le",
                    "width": 1920,
                    "height": 1080
                }
            ]
        }"#;

        let fmt = FfprobeProber::parse_probe_output(json).unwrap();
        assert_eq!(fmt.as_str(), "yuv422p10le");
    }

    #[test]
    fn test_parse_probe_output_no_streams() {
        let err = FfprobeProber::parse_probe_output(r#"{"streams": []}"#).unwrap_err();
        assert!(matches!(err, ProbeError::NoVideoStream));
    }

    #[test]
    fn test_parse_probe_output_missing_pix_fmt() {
        let fmt = FfprobeProber::parse_probe_output(r#"{"streams": [{"codec_type": "video"}]}"#)
            .unwrap();
        assert!(fmt.is_unknown());
    }

    #[test]
    fn test_parse_probe_output_invalid() {
        let err = FfprobeProber::parse_probe_output("not json").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));

        let err = FfprobeProber::parse_probe_output("{}").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }

    #[test]
    fn test_ffprobe_for() {
        assert_eq!(
            ffprobe_for(Path::new("/usr/local/bin/ffmpeg")),
            PathBuf::from("/usr/local/bin/ffprobe")
        );
        assert_eq!(ffprobe_for(Path::new("ffmpeg")), PathBuf::from("ffprobe"));
        assert_eq!(
            ffprobe_for(Path::new("/opt/ffmpeg-6/bin/ffmpeg.exe")),
            PathBuf::from("/opt/ffmpeg-6/bin/ffprobe.exe")
        );
        assert_eq!(
            ffprobe_for(Path::new("/opt/bin/encoder")),
            PathBuf::from("/opt/bin/ffprobe")
        );
    }

    #[tokio::test]
    async fn test_missing_prober() {
        let prober = FfprobeProber::new("/nonexistent/dir/ffprobe");
        let err = prober
            .pixel_format(&CancellationToken::new(), Path::new("/in.mkv"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::ProberNotFound { .. }));
    }
}
