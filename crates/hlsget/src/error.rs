use crate::fetcher::FetchError;
use crate::hls::HlsDownloaderError;

// Top-level error type for a download run
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid URL: {0}")]
    UrlError(String),

    #[error("HTTP client error: {0}")]
    ClientError(#[from] FetchError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HLS error: {0}")]
    HlsError(#[from] HlsDownloaderError),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
