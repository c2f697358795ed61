//! Trait definitions for the transcode module.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::error::{ProbeError, TranscodeError};
use super::segmenter::SegmentStream;
use super::types::{PixelFormat, TranscodeConfig};

/// Read-only inspection of input media.
#[async_trait]
pub trait FormatProber: Send + Sync {
    /// Returns the pixel format of the first video stream.
    async fn pixel_format(
        &self,
        cancel: &CancellationToken,
        input: &Path,
    ) -> Result<PixelFormat, ProbeError>;
}

/// Receives the encoder's diagnostic output, one line at a time.
pub trait DiagnosticSink: Send + Sync {
    fn line(&self, line: &str);
}

/// Something that can start a segmented transcode.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Starts encoding and hands back the segment stream as soon as the
    /// encoder is running. Only configuration and start-up failures are
    /// returned here; the outcome of the run is read from the stream.
    async fn transcode(
        &self,
        cancel: CancellationToken,
        config: TranscodeConfig,
    ) -> Result<SegmentStream, TranscodeError>;
}
