use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hlsvod_core::{load_config, validate_config, FfmpegSegmenter, Transcoder};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("HLSVOD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("hlsvod.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Encoder: {:?}", config.encoder.ffmpeg_path);
    info!("Input: {:?}", config.job.input_path);
    info!("Output directory: {:?}", config.job.output_dir);

    tokio::fs::create_dir_all(&config.job.output_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", config.job.output_dir))?;

    let cancel = CancellationToken::new();
    let segmenter = FfmpegSegmenter::new(config.encoder.clone());

    let mut segments = segmenter
        .transcode(cancel.clone(), config.job.clone())
        .await
        .context("Failed to start transcode")?;

    // Cancel the transcode on Ctrl+C / SIGTERM
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping encoder");
        signal_cancel.cancel();
    });

    let mut count = 0usize;
    while let Some(segment) = segments.next_segment().await {
        count += 1;
        println!("{}", segment.path.display());
    }

    let state = segments.finished().await;
    info!("Transcode {} after {} segment(s)", state, count);

    if !state.is_success() {
        bail!("transcode {}", state);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
