// HLS Segment Scheduler: drives every segment index to a terminal state with
// at most `concurrency` attempts in flight.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::{debug, info, warn};

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsSchedulerConfig;
use crate::hls::processor::{SegmentHandler, SegmentOutcome};
use crate::progress::{OnProgress, ProgressEvent};

/// Final state of an acquisition run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub total: usize,
    pub completed: usize,
    /// Indices that ran out of attempts, ascending
    pub abandoned: Vec<usize>,
}

impl AcquisitionReport {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

pub struct SegmentScheduler {
    config: HlsSchedulerConfig,
    on_progress: Option<OnProgress>,
}

impl SegmentScheduler {
    pub fn new(config: HlsSchedulerConfig) -> Self {
        Self {
            config,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: OnProgress) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// One attempt at `index`, run on its own task. A failed attempt keeps its
    /// slot for `backoff` before reporting back.
    async fn perform_attempt(
        handler: Arc<dyn SegmentHandler>,
        index: usize,
        backoff: Duration,
    ) -> (usize, Result<SegmentOutcome, HlsDownloaderError>) {
        let task = tokio::spawn(async move {
            let result = handler.process(index).await;
            if result.is_err() && !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            result
        });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(HlsDownloaderError::Worker(e.to_string())),
        };
        (index, result)
    }

    /// Process indices `0..total` through `handler`.
    ///
    /// Individual segment failures never fail the run: the index goes back to
    /// the tail of the queue until its attempts are exhausted, after which it
    /// is reported as abandoned.
    pub async fn run(
        &self,
        total: usize,
        concurrency: usize,
        handler: Arc<dyn SegmentHandler>,
    ) -> Result<AcquisitionReport, HlsDownloaderError> {
        if concurrency == 0 {
            return Err(HlsDownloaderError::ConfigError(
                "concurrency must be at least 1".to_string(),
            ));
        }

        info!(total, concurrency, "Segment acquisition started");

        let mut pending: VecDeque<usize> = (0..total).collect();
        let mut attempts = vec![0u32; total];
        let mut completed = 0usize;
        let mut abandoned = Vec::new();
        let mut in_flight = FuturesUnordered::new();

        loop {
            // Fill free slots from the head of the queue
            while in_flight.len() < concurrency {
                let Some(index) = pending.pop_front() else {
                    break;
                };
                attempts[index] += 1;
                let attempt = attempts[index];
                let backoff = if self.config.is_exhausted(attempt) {
                    Duration::ZERO
                } else {
                    self.config.retry_delay(attempt)
                };
                in_flight.push(Self::perform_attempt(handler.clone(), index, backoff));
            }

            // Nothing queued and nothing running: every index is terminal
            let Some((index, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(outcome) => {
                    completed += 1;
                    debug!(index, ?outcome, completed, total, "Segment complete");
                    if let Some(on_progress) = &self.on_progress {
                        on_progress(ProgressEvent::Downloading { completed, total });
                    }
                }
                Err(e) if self.config.is_exhausted(attempts[index]) => {
                    warn!(
                        index,
                        attempts = attempts[index],
                        error = %e,
                        "Segment abandoned after exhausting its attempts"
                    );
                    abandoned.push(index);
                }
                Err(e) => {
                    warn!(index, attempt = attempts[index], error = %e, "Segment failed, requeueing");
                    pending.push_back(index);
                }
            }
        }

        abandoned.sort_unstable();
        info!(
            completed,
            abandoned = abandoned.len(),
            "Segment acquisition finished"
        );

        Ok(AcquisitionReport {
            total,
            completed,
            abandoned,
        })
    }
}
