// HLS video-on-demand pipeline: resolve → acquire → merge

pub mod config;
pub mod decryption;
pub mod error;
pub mod hls_downloader;
pub mod output;
pub mod parser;
pub mod playlist;
pub mod processor;
pub mod resolver;
pub mod scheduler;
pub(crate) mod segment_utils;

// Re-exports for easier access
pub use config::HlsConfig;
pub use error::{CryptoError, HlsDownloaderError, ManifestError};
pub use hls_downloader::{AcquisitionTask, DownloadSummary, HlsDownloader, RunContext};
pub use output::{MergeReport, SegmentMerger};
pub use parser::parse_playlist;
pub use playlist::{
    ByteRange, Document, EncryptionKey, KeyMethod, PlaylistType, ResolvedPlaylist, Segment,
    VariantReference,
};
pub use processor::{SegmentHandler, SegmentOutcome, SegmentProcessor};
pub use resolver::ManifestResolver;
pub use scheduler::{AcquisitionReport, SegmentScheduler};
