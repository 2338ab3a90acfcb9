use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::hls::config::{HlsConfig, HlsOutputConfig};
use crate::hls::output::SegmentMerger;
use crate::hls::playlist::ResolvedPlaylist;
use crate::hls::processor::SegmentProcessor;
use crate::hls::resolver::ManifestResolver;
use crate::hls::scheduler::SegmentScheduler;
use crate::hls::segment_utils::{segment_file_name, segments_dir_name};
use crate::{DownloadError, Fetcher, HttpFetcher, OnProgress};

pub const DEFAULT_OUTPUT_NAME: &str = "output";
pub const DEFAULT_OUTPUT_EXTENSION: &str = "mp4";
pub const DEFAULT_CONCURRENCY: usize = 100;

/// What to download and where to put it.
#[derive(Debug, Clone)]
pub struct AcquisitionTask {
    pub url: String,
    pub output_dir: PathBuf,
    pub output_name: String,
    /// Maximum number of segments in flight
    pub concurrency: usize,
}

impl AcquisitionTask {
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Output file name, with `.mp4` appended when the given name has no extension.
    ///
    /// The file holds concatenated MPEG-TS segments whatever the extension says.
    pub fn output_file_name(&self) -> String {
        let name = self.output_name.trim();
        let name = if name.is_empty() {
            DEFAULT_OUTPUT_NAME
        } else {
            name
        };
        if Path::new(name).extension().is_some() {
            name.to_string()
        } else {
            format!("{name}.{DEFAULT_OUTPUT_EXTENSION}")
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(self.output_file_name())
    }

    fn validate(&self) -> Result<(), DownloadError> {
        if self.url.trim().is_empty() {
            return Err(DownloadError::UrlError("playlist URL is empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(DownloadError::ConfigError(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything scoped to one run, shared by the processor and the merger.
#[derive(Debug)]
pub struct RunContext {
    pub playlist: ResolvedPlaylist,
    /// Directory holding `<index>.<ext>` segment files
    pub segments_dir: PathBuf,
    pub output_path: PathBuf,
    output_config: HlsOutputConfig,
}

impl RunContext {
    pub fn new(
        playlist: ResolvedPlaylist,
        segments_dir: PathBuf,
        output_path: PathBuf,
        output_config: HlsOutputConfig,
    ) -> Self {
        Self {
            playlist,
            segments_dir,
            output_path,
            output_config,
        }
    }

    pub fn total(&self) -> usize {
        self.playlist.segment_count()
    }

    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.segments_dir
            .join(segment_file_name(index, &self.output_config.segment_extension))
    }

    pub fn temp_segment_path(&self, index: usize) -> PathBuf {
        let mut name = segment_file_name(index, &self.output_config.segment_extension);
        name.push_str(&self.output_config.temp_suffix);
        self.segments_dir.join(name)
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub output_path: PathBuf,
    pub total: usize,
    /// Segments that reached disk, including ones kept from an earlier run
    pub downloaded: usize,
    pub abandoned: Vec<usize>,
    pub merged: usize,
    pub missing: Vec<usize>,
    pub elapsed: Duration,
}

impl DownloadSummary {
    pub fn is_complete(&self) -> bool {
        self.merged == self.total
    }
}

pub struct HlsDownloader {
    config: HlsConfig,
    fetcher: Arc<dyn Fetcher>,
    on_progress: Option<OnProgress>,
}

impl HlsDownloader {
    pub fn new(config: HlsConfig) -> Result<Self, DownloadError> {
        let fetcher = HttpFetcher::new(&config.base)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create a downloader that retrieves everything through `fetcher`.
    pub fn with_fetcher(config: HlsConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: OnProgress) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Resolve the playlist, acquire every segment and merge them into
    /// `task.output_path()`.
    ///
    /// Succeeds even if some segments could not be acquired; inspect the
    /// returned summary for partial results.
    pub async fn download(&self, task: &AcquisitionTask) -> Result<DownloadSummary, DownloadError> {
        let start_time = Instant::now();
        task.validate()?;

        let resolver =
            ManifestResolver::new(self.fetcher.clone(), self.config.playlist_config.clone());
        let playlist = resolver.resolve(&task.url).await?;

        let output_config = &self.config.output_config;
        let segments_dir = task
            .output_dir
            .join(segments_dir_name(&output_config.segments_dir_prefix, &task.url));
        tokio::fs::create_dir_all(&segments_dir).await?;
        debug!(dir = %segments_dir.display(), "Using segment directory");

        let context = Arc::new(RunContext::new(
            playlist,
            segments_dir,
            task.output_path(),
            output_config.clone(),
        ));

        let processor = Arc::new(SegmentProcessor::new(self.fetcher.clone(), context.clone()));
        let mut scheduler = SegmentScheduler::new(self.config.scheduler_config.clone());
        let mut merger = SegmentMerger::new();
        if let Some(on_progress) = &self.on_progress {
            scheduler = scheduler.with_progress(on_progress.clone());
            merger = merger.with_progress(on_progress.clone());
        }

        let acquisition = scheduler
            .run(context.total(), task.concurrency, processor)
            .await?;
        if !acquisition.abandoned.is_empty() {
            warn!(
                abandoned = ?acquisition.abandoned,
                "Some segments could not be downloaded"
            );
        }

        let merge = merger.merge(&context).await?;

        let summary = DownloadSummary {
            output_path: context.output_path.clone(),
            total: acquisition.total,
            downloaded: acquisition.completed,
            abandoned: acquisition.abandoned,
            merged: merge.merged,
            missing: merge.missing,
            elapsed: start_time.elapsed(),
        };
        info!(
            output = %summary.output_path.display(),
            merged = summary.merged,
            total = summary.total,
            "Download finished"
        );
        Ok(summary)
    }
}
