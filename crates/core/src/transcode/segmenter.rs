//! FFmpeg segment muxer driver.

use async_trait::async_trait;
use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::args::{build_args, select_profile};
use super::config::EncoderConfig;
use super::error::TranscodeError;
use super::probe::FfprobeProber;
use super::profile::H264Profile;
use super::sink::TracingSink;
use super::traits::{DiagnosticSink, FormatProber, Transcoder};
use super::types::{SegmentNotification, TranscodeConfig, TranscodeState};
use crate::process_group::{self, ProcessGroup};

/// Runs ffmpeg's segment muxer and streams completed segment names.
pub struct FfmpegSegmenter {
    config: EncoderConfig,
    prober: Arc<dyn FormatProber>,
    sink: Arc<dyn DiagnosticSink>,
}

impl FfmpegSegmenter {
    /// Creates a segmenter that probes with ffprobe and logs diagnostics
    /// through tracing.
    pub fn new(config: EncoderConfig) -> Self {
        let prober = Arc::new(FfprobeProber::new(config.resolved_ffprobe_path()));
        Self {
            config,
            prober,
            sink: Arc::new(TracingSink),
        }
    }

    /// Creates a segmenter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    /// Replaces the format prober.
    pub fn with_prober(mut self, prober: Arc<dyn FormatProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Replaces the sink that receives encoder diagnostics.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Builds the full encoder argument list, probing the input when a video
    /// profile is requested.
    pub async fn build_invocation(
        &self,
        cancel: &CancellationToken,
        config: &TranscodeConfig,
    ) -> Result<Vec<String>, TranscodeError> {
        // Reject bad requests before running the prober
        config.boundaries()?;

        let profile = match config.video {
            Some(_) => select_profile(self.prober.as_ref(), cancel, &config.input_path).await,
            None => H264Profile::default(),
        };

        build_args(&self.config, config, profile)
    }

    async fn start(
        &self,
        cancel: CancellationToken,
        config: TranscodeConfig,
    ) -> Result<SegmentStream, TranscodeError> {
        let (state_tx, state_rx) = watch::channel(TranscodeState::Idle);
        let cancel = cancel.child_token();

        state_tx.send_replace(TranscodeState::Starting);
        let args = self.build_invocation(&cancel, &config).await?;

        if cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }

        tracing::info!(
            encoder = %self.config.ffmpeg_path.display(),
            "Starting FFmpeg process with args {}",
            args.join(" ")
        );

        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process_group::configure(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| TranscodeError::spawn(&self.config.ffmpeg_path, e))?;
        let group = ProcessGroup::from_child(&child);

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            (stdout, _) => {
                if let Err(e) = group.kill() {
                    tracing::warn!(pid = ?group.pid(), "Failed to kill encoder after pipe error: {}", e);
                }
                let stream = if stdout.is_none() { "stdout" } else { "stderr" };
                return Err(TranscodeError::PipeUnavailable { stream });
            }
        };

        tracing::debug!(pid = ?group.pid(), "FFmpeg process started");

        let (segment_tx, segment_rx) = mpsc::channel(self.config.segment_buffer.max(1));
        state_tx.send_replace(TranscodeState::Running);

        let stdout_task = tokio::spawn(drain_segments(
            stdout,
            segment_tx,
            config.output_dir.clone(),
            cancel.clone(),
        ));
        let stderr_task = tokio::spawn(drain_diagnostics(stderr, Arc::clone(&self.sink)));

        tokio::spawn(supervise(
            child,
            group.clone(),
            cancel.clone(),
            state_tx,
            stdout_task,
            stderr_task,
        ));

        Ok(SegmentStream {
            segments: segment_rx,
            state: state_rx,
            group,
            cancel,
        })
    }
}

#[async_trait]
impl Transcoder for FfmpegSegmenter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn transcode(
        &self,
        cancel: CancellationToken,
        config: TranscodeConfig,
    ) -> Result<SegmentStream, TranscodeError> {
        self.start(cancel, config).await
    }
}

/// Starts a segmented transcode with the given ffmpeg binary.
///
/// Returns as soon as the encoder is running. Segment names arrive on the
/// returned stream in the order the encoder reports them, and the stream ends
/// once the encoder has exited and its output has been drained. Whether the
/// run succeeded is read from [`SegmentStream::finished`]: a stream that ends
/// without error is not proof of success.
///
/// Cancelling `cancel` kills the encoder together with all of its children.
pub async fn transcode_segments(
    cancel: CancellationToken,
    ffmpeg_path: impl Into<PathBuf>,
    config: TranscodeConfig,
) -> Result<SegmentStream, TranscodeError> {
    FfmpegSegmenter::new(EncoderConfig::with_ffmpeg(ffmpeg_path))
        .transcode(cancel, config)
        .await
}

/// Forwards each stdout line as a segment notification.
///
/// Hands the sender back so the supervisor decides when the channel closes.
async fn drain_segments(
    stdout: ChildStdout,
    tx: mpsc::Sender<SegmentNotification>,
    output_dir: PathBuf,
    cancel: CancellationToken,
) -> mpsc::Sender<SegmentNotification> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut discarding = false;

    loop {
        let line = match next_line_lossy(&mut reader, &mut buf).await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Error while reading FFmpeg stdout: {}", e);
                break;
            }
        };

        let name = line.trim();
        if name.is_empty() || discarding {
            continue;
        }

        let notification = SegmentNotification::new(name, &output_dir);
        tracing::debug!(segment = %notification, "Segment completed");

        // Keep reading after the consumer goes away so the encoder never
        // blocks on a full pipe.
        tokio::select! {
            biased;
            sent = tx.send(notification) => {
                if sent.is_err() {
                    tracing::debug!("Segment receiver dropped, discarding further segments");
                    discarding = true;
                }
            }
            _ = cancel.cancelled() => {
                discarding = true;
            }
        }
    }

    tx
}

/// Forwards each stderr line to the diagnostic sink.
async fn drain_diagnostics(stderr: ChildStderr, sink: Arc<dyn DiagnosticSink>) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();

    loop {
        match next_line_lossy(&mut reader, &mut buf).await {
            Ok(Some(line)) => sink.line(&line),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Error while reading FFmpeg stderr: {}", e);
                break;
            }
        }
    }
}

/// Reads one line without requiring UTF-8.
///
/// Invalid bytes become U+FFFD so a stray metadata byte never stops the
/// drain. The trailing `\n` or `\r\n` is stripped.
async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    Ok(Some(String::from_utf8_lossy(&buf[..]).into_owned()))
}

/// Waits for the encoder to exit or be cancelled, then closes the segment
/// channel once both output readers are done.
async fn supervise(
    mut child: Child,
    group: ProcessGroup,
    cancel: CancellationToken,
    state_tx: watch::Sender<TranscodeState>,
    stdout_task: JoinHandle<mpsc::Sender<SegmentNotification>>,
    stderr_task: JoinHandle<()>,
) {
    let pid = group.pid();

    let final_state = tokio::select! {
        status = child.wait() => {
            group.mark_exited();
            match status {
                Ok(status) if status.success() => {
                    tracing::info!(pid = ?pid, "FFmpeg process successfully finished.");
                    TranscodeState::Completed
                }
                Ok(status) => {
                    tracing::error!(pid = ?pid, "FFmpeg process exited with error: {}", status);
                    TranscodeState::Failed { code: status.code() }
                }
                Err(e) => {
                    tracing::error!(pid = ?pid, "Failed to wait for FFmpeg process: {}", e);
                    TranscodeState::Failed { code: None }
                }
            }
        }
        _ = cancel.cancelled() => {
            tracing::info!(pid = ?pid, "Transcode cancelled, killing FFmpeg process group");
            if let Err(e) = group.kill() {
                tracing::error!(pid = ?pid, "Failed to kill FFmpeg process group: {}", e);
            }
            // Direct child, in case the group kill fell short
            if let Err(e) = child.start_kill() {
                tracing::debug!(pid = ?pid, "Direct kill of FFmpeg process failed: {}", e);
            }
            if let Err(e) = child.wait().await {
                tracing::warn!(pid = ?pid, "Failed to reap FFmpeg process: {}", e);
            }
            group.mark_exited();
            TranscodeState::Killed
        }
    };

    state_tx.send_replace(TranscodeState::Draining);

    // Descendants left behind would hold the pipes open
    if let Err(e) = group.kill() {
        tracing::warn!(pid = ?pid, "Failed to sweep FFmpeg process group: {}", e);
    }

    if let Err(e) = stderr_task.await {
        tracing::error!("FFmpeg stderr reader failed: {}", e);
    }

    let sender = match stdout_task.await {
        Ok(sender) => Some(sender),
        Err(e) => {
            tracing::error!("FFmpeg stdout reader failed: {}", e);
            None
        }
    };

    state_tx.send_replace(final_state);
    drop(sender);
}

/// Completed segments of a running transcode.
///
/// Ends when the encoder has exited and all of its output was read. Dropping
/// the stream does not stop the encoder; call [`SegmentStream::cancel`] for
/// that.
#[derive(Debug)]
pub struct SegmentStream {
    segments: mpsc::Receiver<SegmentNotification>,
    state: watch::Receiver<TranscodeState>,
    group: ProcessGroup,
    cancel: CancellationToken,
}

impl SegmentStream {
    /// Next completed segment, or `None` once the transcode is over.
    pub async fn next_segment(&mut self) -> Option<SegmentNotification> {
        self.segments.recv().await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TranscodeState {
        *self.state.borrow()
    }

    /// Waits for the transcode to reach a terminal state.
    pub async fn finished(&mut self) -> TranscodeState {
        if let Ok(state) = self.state.wait_for(TranscodeState::is_terminal).await {
            return *state;
        }
        *self.state.borrow()
    }

    /// Stops the encoder and everything it spawned.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The encoder's process group.
    pub fn process_group(&self) -> &ProcessGroup {
        &self.group
    }

    /// Reads every remaining segment and returns them with the final state.
    pub async fn collect_all(mut self) -> (Vec<SegmentNotification>, TranscodeState) {
        let mut segments = Vec::new();
        while let Some(segment) = self.next_segment().await {
            segments.push(segment);
        }
        let state = self.finished().await;
        (segments, state)
    }
}

impl Stream for SegmentStream {
    type Item = SegmentNotification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.segments.poll_recv(cx)
    }
}
