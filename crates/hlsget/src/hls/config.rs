use std::time::Duration;

use crate::DownloaderConfig;

// --- Top-Level Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsConfig {
    /// Base downloader configuration
    pub base: DownloaderConfig,
    pub playlist_config: HlsPlaylistConfig,
    pub scheduler_config: HlsSchedulerConfig,
    pub output_config: HlsOutputConfig,
}

// --- Playlist Configuration ---
#[derive(Debug, Clone)]
pub struct HlsPlaylistConfig {
    /// How many master playlists may be followed before giving up
    pub max_resolve_depth: usize,
}

impl Default for HlsPlaylistConfig {
    fn default() -> Self {
        Self {
            max_resolve_depth: 5,
        }
    }
}

// --- Scheduler Configuration ---
#[derive(Debug, Clone)]
pub struct HlsSchedulerConfig {
    /// Attempts per segment before it is abandoned; 0 retries forever
    pub max_segment_attempts: u32,
    pub retry_delay_base: Duration, // Base for exponential backoff
    pub max_retry_delay: Duration,
}

impl Default for HlsSchedulerConfig {
    fn default() -> Self {
        Self {
            max_segment_attempts: 10,
            retry_delay_base: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(10),
        }
    }
}

impl HlsSchedulerConfig {
    /// Delay applied after the given (1-based) failed attempt.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        if self.retry_delay_base.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_delay_base
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_segment_attempts != 0 && attempts >= self.max_segment_attempts
    }
}

// --- Output Configuration ---
#[derive(Debug, Clone)]
pub struct HlsOutputConfig {
    /// Prefix of the per-run segment directory created inside the output directory
    pub segments_dir_prefix: String,
    pub segment_extension: String,
    /// Suffix of the in-progress file a segment is written to before rename
    pub temp_suffix: String,
}

impl Default for HlsOutputConfig {
    fn default() -> Self {
        Self {
            segments_dir_prefix: ".hlsget-".to_string(),
            segment_extension: "ts".to_string(),
            temp_suffix: ".part".to_string(),
        }
    }
}
