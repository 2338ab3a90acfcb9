use crate::fetcher::FetchError;

/// Errors raised while turning playlist text into a [`Document`](super::Document).
///
/// Line numbers are 1-based.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ManifestError {
    #[error("invalid m3u8, missing #EXTM3U in line 1")]
    MissingHeader,

    #[error("duplicate {tag}: {text}, line: {line}")]
    DuplicateTag {
        tag: &'static str,
        text: String,
        line: usize,
    },

    #[error("invalid {tag} value: {value}, line: {line}")]
    InvalidValue {
        tag: &'static str,
        value: String,
        line: usize,
    },

    #[error("malformed number in {tag}: {value}, line: {line}")]
    InvalidNumber {
        tag: &'static str,
        value: String,
        line: usize,
    },

    #[error("missing attributes in {tag}, line: {line}")]
    EmptyAttributes { tag: &'static str, line: usize },

    #[error("invalid EXT-X-STREAM-INF URI, line: {line}")]
    MissingVariantUri { line: usize },

    #[error("invalid line: {text}, line: {line}")]
    InvalidLine { text: String, line: usize },

    #[error("invalid EXT-X-KEY method: {method}, line: {line}")]
    UnsupportedKeyMethod { method: String, line: usize },

    #[error("EXT-X-KEY with method {method} has no URI, line: {line}")]
    MissingKeyUri { method: String, line: usize },
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key length must be 16 bytes for AES-128, got {0}")]
    InvalidKeyLength(usize),

    #[error("IV length must equal block size 16, got {0}")]
    InvalidIvLength(usize),

    #[error("ciphertext length {0} is not a multiple of the block size")]
    UnalignedInput(usize),

    #[error("invalid padding")]
    InvalidPadding,
}

#[derive(Debug, thiserror::Error)]
pub enum HlsDownloaderError {
    #[error("Playlist error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Decryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no TS file description found in the M3U8 file: {0}")]
    NoSegments(String),

    #[error("master playlist chain deeper than {0} levels")]
    ResolutionDepthExceeded(usize),

    #[error("Segment index {0} is out of range")]
    SegmentOutOfRange(usize),

    #[error("Segment worker failed: {0}")]
    Worker(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
