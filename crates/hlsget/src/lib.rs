//! # hlsget
//!
//! A library for downloading HLS video-on-demand streams into a single file.
//!
//! ## Features
//!
//! - Line-oriented M3U8 parser with master → media playlist resolution
//! - AES-128-CBC segment decryption
//! - Bounded-concurrency segment acquisition with requeue on failure
//! - Crash-safe per-segment persistence and resumable re-runs
//! - Ordered merge of all segments into the final artifact

pub mod builder;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod hls;
pub mod progress;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::DownloaderConfigBuilder;
pub use config::DownloaderConfig;
pub use error::DownloadError;
pub use fetcher::{Fetcher, FetchError, HttpFetcher, create_client};
pub use progress::{OnProgress, ProgressEvent};

// Re-export the HLS pipeline entry points
pub use hls::{AcquisitionTask, DownloadSummary, HlsConfig, HlsDownloader, HlsDownloaderError};
