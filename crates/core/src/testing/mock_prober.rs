//! Mock format prober for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::transcode::{FormatProber, PixelFormat, ProbeError};

/// Mock implementation of the FormatProber trait.
///
/// Provides controllable behavior for testing:
/// - Per-path or default pixel formats
/// - Simulated probe failures
/// - Call recording for assertions
///
/// # Example
///
/// ```rust,ignore
/// use hlsvod_core::testing::MockProber;
///
/// let prober = MockProber::new();
/// prober.set_pixel_format(PixelFormat::new("yuv422p")).await;
///
/// let segmenter = FfmpegSegmenter::with_defaults().with_prober(Arc::new(prober.clone()));
/// ```
#[derive(Debug, Clone)]
pub struct MockProber {
    /// Paths that were probed, in order.
    probed: Arc<RwLock<Vec<PathBuf>>>,
    /// Pre-configured formats by path.
    formats: Arc<RwLock<HashMap<PathBuf, PixelFormat>>>,
    /// Format returned for paths without a specific entry.
    default_format: Arc<RwLock<PixelFormat>>,
    /// If set, the next probe will fail with this error.
    next_error: Arc<RwLock<Option<ProbeError>>>,
}

impl Default for MockProber {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProber {
    /// Create a new mock prober reporting `yuv420p`.
    pub fn new() -> Self {
        Self {
            probed: Arc::new(RwLock::new(Vec::new())),
            formats: Arc::new(RwLock::new(HashMap::new())),
            default_format: Arc::new(RwLock::new(PixelFormat::new("yuv420p"))),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the format reported for any path.
    pub async fn set_pixel_format(&self, format: PixelFormat) {
        *self.default_format.write().await = format;
    }

    /// Set the format reported for a specific path.
    pub async fn set_pixel_format_for(&self, path: impl AsRef<Path>, format: PixelFormat) {
        self.formats
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), format);
    }

    /// Configure the next probe to fail with the given error.
    pub async fn set_next_error(&self, error: ProbeError) {
        *self.next_error.write().await = Some(error);
    }

    /// Number of probes performed.
    pub async fn probe_count(&self) -> usize {
        self.probed.read().await.len()
    }

    /// Paths probed so far.
    pub async fn probed_paths(&self) -> Vec<PathBuf> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl FormatProber for MockProber {
    async fn pixel_format(
        &self,
        cancel: &CancellationToken,
        input: &Path,
    ) -> Result<PixelFormat, ProbeError> {
        self.probed.write().await.push(input.to_path_buf());

        if cancel.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        if let Some(format) = self.formats.read().await.get(input) {
            return Ok(format.clone());
        }

        Ok(self.default_format.read().await.clone())
    }
}
