//! Segmenter lifecycle integration tests.
//!
//! These tests run the segmenter against small shell scripts standing in for
//! ffmpeg:
//! - Segment delivery order and channel close
//! - Failure reported through the final state, not the segment stream
//! - Diagnostic lines forwarded to the sink, including non-UTF-8 ones
//! - Cancellation tearing down the whole process tree

#![cfg(unix)]

use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tempfile::TempDir;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use hlsvod_core::testing::{CollectingSink, MockProber};
use hlsvod_core::transcode::{
    transcode_segments, EncoderConfig, FfmpegSegmenter, PixelFormat, SegmentStream,
    TranscodeConfig, TranscodeError, TranscodeState, Transcoder, VideoProfile,
};

const GRACE: Duration = Duration::from_secs(10);

/// ETXTBSY: a script written moments ago can still be open in a process
/// another test thread is forking.
const TEXT_FILE_BUSY: i32 = 26;

/// Starts a transcode, retrying while the fake encoder is busy.
async fn start<F, Fut>(mut start: F) -> SegmentStream
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<SegmentStream, TranscodeError>>,
{
    for _ in 0..50 {
        match start().await {
            Err(TranscodeError::Spawn { source, .. })
                if source.raw_os_error() == Some(TEXT_FILE_BUSY) =>
            {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            result => return result.expect("Failed to start transcode"),
        }
    }
    panic!("fake encoder stayed busy");
}

/// Test helper holding a scratch directory with a fake encoder in it.
struct TestHarness {
    dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Writes an executable shell script and returns its path.
    fn encoder(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn output_dir(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self, times: Vec<f64>) -> TranscodeConfig {
        TranscodeConfig::new("/media/in.mkv", self.output_dir(), "seg", times)
    }
}

#[tokio::test]
async fn test_segments_delivered_in_order() {
    let harness = TestHarness::new();
    let encoder = harness.encoder(
        "ffmpeg",
        r#"echo seg-00000.ts
echo seg-00001.ts
echo seg-00002.ts"#,
    );

    let segments = start(|| {
        transcode_segments(
            CancellationToken::new(),
            &encoder,
            harness.config(vec![0.0, 2.0, 4.0, 6.0]),
        )
    })
    .await;

    let (segments, state) = timeout(GRACE, segments.collect_all()).await.unwrap();

    let names: Vec<_> = segments.iter().map(|s| s.file_name.as_str()).collect();
    assert_eq!(names, vec!["seg-00000.ts", "seg-00001.ts", "seg-00002.ts"]);
    assert_eq!(segments[2].path, harness.output_dir().join("seg-00002.ts"));
    assert_eq!(segments[1].index(), Some(1));
    assert_eq!(state, TranscodeState::Completed);
}

#[tokio::test]
async fn test_encoder_receives_built_arguments() {
    let harness = TestHarness::new();
    let args_file = harness.output_dir().join("args.txt");
    let encoder = harness.encoder(
        "ffmpeg",
        &format!(r#"for a in "$@"; do echo "$a" >> "{}"; done"#, args_file.display()),
    );

    let segments = start(|| {
        transcode_segments(
            CancellationToken::new(),
            &encoder,
            harness.config(vec![0.0, 2.0, 4.0, 6.0]).with_offset(5),
        )
    })
    .await;
    let (_, state) = timeout(GRACE, segments.collect_all()).await.unwrap();
    assert!(state.is_success());

    let args = std::fs::read_to_string(&args_file).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert!(!args.contains(&"-ss"));
    assert!(args.windows(2).any(|w| w == ["-to", "6.000000"]));
    assert!(args
        .windows(2)
        .any(|w| w == ["-force_key_frames", "2.000000,4.000000,6.000000"]));
    assert!(args
        .windows(2)
        .any(|w| w == ["-segment_times", "2.000000,4.000000,6.000000"]));
    assert!(args.windows(2).any(|w| w == ["-segment_start_number", "5"]));
    assert_eq!(
        args.last().copied(),
        Some(harness.output_dir().join("seg-%05d.ts").to_str().unwrap())
    );
}

#[tokio::test]
async fn test_failure_reported_through_state() {
    let harness = TestHarness::new();
    let encoder = harness.encoder(
        "ffmpeg",
        r#"echo seg-00000.ts
echo "Conversion failed!" >&2
exit 3"#,
    );
    let sink = Arc::new(CollectingSink::new());

    let segmenter =
        FfmpegSegmenter::new(EncoderConfig::with_ffmpeg(&encoder)).with_sink(sink.clone());
    let segments =
        start(|| segmenter.transcode(CancellationToken::new(), harness.config(vec![0.0, 2.0]))).await;

    let (segments, state) = timeout(GRACE, segments.collect_all()).await.unwrap();

    // Already-delivered segments are untouched by the failure
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].file_name, "seg-00000.ts");
    assert_eq!(state, TranscodeState::Failed { code: Some(3) });
    assert_eq!(sink.lines(), vec!["Conversion failed!".to_string()]);
}

#[tokio::test]
async fn test_diagnostics_do_not_mix_with_segments() {
    let harness = TestHarness::new();
    let encoder = harness.encoder(
        "ffmpeg",
        r#"echo "warning one" >&2
echo seg-00000.ts

echo "warning two" >&2
echo seg-00001.ts"#,
    );
    let sink = Arc::new(CollectingSink::new());

    let segmenter =
        FfmpegSegmenter::new(EncoderConfig::with_ffmpeg(&encoder)).with_sink(sink.clone());
    let segments =
        start(|| segmenter.transcode(CancellationToken::new(), harness.config(vec![0.0, 2.0, 4.0]))).await;

    // Consume through the Stream impl
    let names: Vec<String> = timeout(GRACE, segments.map(|s| s.file_name).collect())
        .await
        .unwrap();

    assert_eq!(names, vec!["seg-00000.ts", "seg-00001.ts"]);
    assert_eq!(sink.lines(), vec!["warning one", "warning two"]);
}

#[tokio::test]
async fn test_non_utf8_diagnostics_keep_stderr_draining() {
    let harness = TestHarness::new();
    // Enough stderr after the bad line to fill the pipe if nobody reads it
    let encoder = harness.encoder(
        "ffmpeg",
        r#"printf 'title: \377\376 latin1\n' >&2
i=0
while [ $i -lt 4000 ]; do
  echo "frame=$i fps=25.0 q=28.0 size=N/A" >&2
  i=$((i+1))
done
echo seg-00000.ts"#,
    );
    let sink = Arc::new(CollectingSink::new());

    let segmenter =
        FfmpegSegmenter::new(EncoderConfig::with_ffmpeg(&encoder)).with_sink(sink.clone());
    let segments =
        start(|| segmenter.transcode(CancellationToken::new(), harness.config(vec![0.0, 2.0]))).await;

    let (segments, state) = timeout(GRACE, segments.collect_all()).await.unwrap();

    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].file_name, "seg-00000.ts");
    assert_eq!(state, TranscodeState::Completed);

    let lines = sink.lines();
    assert_eq!(lines.len(), 4001);
    assert_eq!(lines[0], "title: \u{fffd}\u{fffd} latin1");
    assert_eq!(lines[4000], "frame=3999 fps=25.0 q=28.0 size=N/A");
}

#[tokio::test]
async fn test_small_buffer_does_not_lose_segments() {
    let harness = TestHarness::new();
    let encoder = harness.encoder(
        "ffmpeg",
        r#"i=0
while [ $i -lt 50 ]; do
  printf 'seg-%05d.ts\n' $i
  i=$((i+1))
done"#,
    );

    let segmenter = FfmpegSegmenter::new(EncoderConfig::with_ffmpeg(&encoder).with_segment_buffer(1));
    let mut segments =
        start(|| segmenter.transcode(CancellationToken::new(), harness.config(vec![0.0, 2.0]))).await;

    let mut indexes = Vec::new();
    while let Some(segment) = timeout(GRACE, segments.next_segment()).await.unwrap() {
        // Slow consumer
        tokio::time::sleep(Duration::from_millis(1)).await;
        indexes.push(segment.index().unwrap());
    }

    assert_eq!(indexes, (0..50).collect::<Vec<u32>>());
    assert_eq!(segments.finished().await, TranscodeState::Completed);
}

#[tokio::test]
async fn test_cancel_kills_whole_tree() {
    let harness = TestHarness::new();
    // The background sleep inherits stdout, so the stream can only end once
    // the grandchild is dead too.
    let encoder = harness.encoder(
        "ffmpeg",
        r#"sleep 300 &
echo seg-00000.ts
wait"#,
    );

    let cancel = CancellationToken::new();
    let mut segments = start(|| {
        transcode_segments(cancel.clone(), &encoder, harness.config(vec![0.0, 2.0]))
    })
    .await;

    let first = timeout(GRACE, segments.next_segment()).await.unwrap();
    assert_eq!(first.unwrap().file_name, "seg-00000.ts");
    assert_eq!(segments.state(), TranscodeState::Running);

    cancel.cancel();

    let rest = timeout(GRACE, async {
        let mut rest = Vec::new();
        while let Some(segment) = segments.next_segment().await {
            rest.push(segment);
        }
        rest
    })
    .await
    .expect("segment stream did not close after cancellation");

    assert!(rest.is_empty());
    assert_eq!(segments.finished().await, TranscodeState::Killed);
    assert!(segments.process_group().was_killed());

    // A second kill is a no-op
    assert!(segments.process_group().kill().is_ok());
}

#[tokio::test]
async fn test_stream_cancel_leaves_parent_token() {
    let harness = TestHarness::new();
    let encoder = harness.encoder("ffmpeg", "exec sleep 300");

    let parent = CancellationToken::new();
    let mut segments = start(|| {
        transcode_segments(parent.clone(), &encoder, harness.config(vec![0.0, 2.0]))
    })
    .await;

    segments.cancel();

    assert_eq!(
        timeout(GRACE, segments.finished()).await.unwrap(),
        TranscodeState::Killed
    );
    assert!(!parent.is_cancelled());
}

#[tokio::test]
async fn test_natural_exit_sweeps_leftover_children() {
    let harness = TestHarness::new();
    // The encoder exits but leaves a child holding stdout open.
    let encoder = harness.encoder(
        "ffmpeg",
        r#"sleep 300 &
echo seg-00000.ts"#,
    );

    let segments = start(|| {
        transcode_segments(
            CancellationToken::new(),
            &encoder,
            harness.config(vec![0.0, 2.0]),
        )
    })
    .await;

    let (segments, state) = timeout(GRACE, segments.collect_all())
        .await
        .expect("leftover child kept the stream open");

    assert_eq!(segments.len(), 1);
    assert_eq!(state, TranscodeState::Completed);
}

#[tokio::test]
async fn test_probe_selects_high422_profile() {
    let harness = TestHarness::new();
    let args_file = harness.output_dir().join("args.txt");
    let encoder = harness.encoder(
        "ffmpeg",
        &format!(r#"for a in "$@"; do echo "$a" >> "{}"; done"#, args_file.display()),
    );

    let prober = Arc::new(MockProber::new());
    prober.set_pixel_format(PixelFormat::new("yuv422p")).await;

    let segmenter = FfmpegSegmenter::new(EncoderConfig::with_ffmpeg(&encoder))
        .with_prober(prober.clone());
    let config = harness
        .config(vec![0.0, 2.0])
        .with_video(VideoProfile::new(1920, 1080, 6000));

    let segments = start(|| segmenter.transcode(CancellationToken::new(), config.clone())).await;
    let (_, state) = timeout(GRACE, segments.collect_all()).await.unwrap();
    assert!(state.is_success());

    let args = std::fs::read_to_string(&args_file).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert!(args.windows(2).any(|w| w == ["-profile:v", "high422"]));
    assert!(args.windows(2).any(|w| w == ["-vf", "scale=-2:1080"]));
    assert_eq!(prober.probed_paths().await, vec![PathBuf::from("/media/in.mkv")]);
}

#[tokio::test]
async fn test_missing_prober_falls_back_to_default_profile() {
    let harness = TestHarness::new();
    let args_file = harness.output_dir().join("args.txt");
    let encoder = harness.encoder(
        "ffmpeg",
        &format!(r#"for a in "$@"; do echo "$a" >> "{}"; done"#, args_file.display()),
    );

    let segmenter = FfmpegSegmenter::new(
        EncoderConfig::with_ffmpeg(&encoder).with_ffprobe("/nonexistent/ffprobe"),
    );
    let config = harness
        .config(vec![0.0, 2.0])
        .with_video(VideoProfile::new(1280, 720, 3000));

    let segments = start(|| segmenter.transcode(CancellationToken::new(), config.clone())).await;
    let (_, state) = timeout(GRACE, segments.collect_all()).await.unwrap();
    assert!(state.is_success());

    let args = std::fs::read_to_string(&args_file).unwrap();
    assert!(args.lines().collect::<Vec<_>>().windows(2).any(|w| w == ["-profile:v", "high"]));
}
