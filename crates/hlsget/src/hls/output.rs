// HLS Output: concatenates the stored segments, in index order, into the final file.

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::hls::HlsDownloaderError;
use crate::hls::hls_downloader::RunContext;
use crate::progress::{OnProgress, ProgressEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub total: usize,
    pub merged: usize,
    /// Indices with no segment file when the merge started, ascending
    pub missing: Vec<usize>,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.merged == self.total
    }
}

#[derive(Default)]
pub struct SegmentMerger {
    on_progress: Option<OnProgress>,
}

impl SegmentMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, on_progress: OnProgress) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Append every present segment to the output file and remove the
    /// segment directory.
    ///
    /// Missing or unreadable segments are skipped with a warning; only
    /// failing to create or write the output file is an error.
    pub async fn merge(&self, context: &RunContext) -> Result<MergeReport, HlsDownloaderError> {
        let total = context.total();

        let mut missing = Vec::new();
        for index in 0..total {
            if !tokio::fs::try_exists(context.segment_path(index))
                .await
                .unwrap_or(false)
            {
                missing.push(index);
            }
        }
        if !missing.is_empty() {
            warn!(
                count = missing.len(),
                indices = ?missing,
                "Segment files missing, merging what is available"
            );
        }

        info!(output = %context.output_path.display(), total, "Merging segments");
        let file = File::create(&context.output_path).await?;
        let mut writer = BufWriter::new(file);
        let mut merged = 0usize;

        for index in 0..total {
            let path = context.segment_path(index);
            let data = match tokio::fs::read(&path).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(index, path = %path.display(), error = %e, "Skipping unreadable segment");
                    continue;
                }
            };
            writer.write_all(&data).await?;
            merged += 1;
            if let Some(on_progress) = &self.on_progress {
                on_progress(ProgressEvent::Merging { merged, total });
            }
        }
        writer.flush().await?;

        match tokio::fs::remove_dir_all(&context.segments_dir).await {
            Ok(()) => debug!(dir = %context.segments_dir.display(), "Removed segment directory"),
            Err(e) => warn!(
                dir = %context.segments_dir.display(),
                error = %e,
                "Failed to remove segment directory"
            ),
        }

        if merged != total {
            warn!(merged, total, "Output is missing segments");
        }

        Ok(MergeReport {
            total,
            merged,
            missing,
        })
    }
}
