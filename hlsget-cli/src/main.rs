use std::{sync::Arc, time::Duration};

use clap::Parser;
use error::AppError;
use hlsget_engine::{AcquisitionTask, DownloaderConfig, HlsConfig, HlsDownloader};
use indicatif::MultiProgress;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;
mod error;
mod utils;

use cli::CliArgs;
use utils::progress::ProgressManager;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("hlsget.log")?;

    let multi_writer = MakeWriterExt::and(std::io::stdout, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!("hlsget {} - HLS video-on-demand downloader", env!("CARGO_PKG_VERSION"));
    info!("==================================================================");

    if args.url.trim().is_empty() {
        return Err(AppError::InvalidInput("playlist URL is empty".to_string()));
    }

    info!(
        "HTTP timeout configuration: overall={}s, connect={}s",
        args.timeout, args.connect_timeout
    );

    let download_config = DownloaderConfig::builder()
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_headers(utils::parse_headers(&args.headers))
        .build();

    let mut hls_config = HlsConfig {
        base: download_config,
        ..Default::default()
    };
    hls_config.scheduler_config.max_segment_attempts = args.max_attempts;

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(utils::default_output_dir);
    tokio::fs::create_dir_all(&output_dir).await?;

    let task = AcquisitionTask::new(args.url.trim(), output_dir)
        .with_output_name(args.name.clone())
        .with_concurrency(args.concurrency);

    info!(
        url = %task.url,
        output = %task.output_path().display(),
        concurrency = task.concurrency,
        "Starting download"
    );

    // Create a progress manager based on the no_progress flag
    let multi = MultiProgress::new();
    let progress_manager = if args.no_progress {
        ProgressManager::new_disabled(multi)
    } else {
        ProgressManager::new(multi)
    };
    let on_progress = progress_manager.clone();

    let downloader = HlsDownloader::new(hls_config)?.with_progress(Arc::new(move |event| {
        on_progress.handle_event(event);
    }));

    let result = downloader.download(&task).await;
    progress_manager.finish_all();
    let summary = result?;

    if !summary.abandoned.is_empty() {
        warn!(
            "{} segment(s) could not be downloaded: {:?}",
            summary.abandoned.len(),
            summary.abandoned
        );
    }
    if !summary.is_complete() {
        warn!(
            "Output contains {}/{} segments",
            summary.merged, summary.total
        );
    }

    info!(
        "Saved {} ({} segments) in {:.2?}",
        summary.output_path.display(),
        summary.merged,
        summary.elapsed
    );
    Ok(())
}
