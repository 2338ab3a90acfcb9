// Playlist data model: the parsed document and its resolved, key-bearing companion.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use url::Url;

use crate::hls::HlsDownloaderError;
use crate::hls::segment_utils::resolve_url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaylistType {
    #[default]
    Unset,
    Vod,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMethod {
    None,
    Aes128,
}

impl KeyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMethod::None => "NONE",
            KeyMethod::Aes128 => "AES-128",
        }
    }
}

/// `#EXT-X-BYTERANGE:length[@offset]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub length: u64,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub uri: String,
    pub title: Option<String>,
    pub duration: f64,
    /// 0 means unencrypted, otherwise an index into [`Document::keys`]
    pub key_index: usize,
    pub byte_range: Option<ByteRange>,
}

/// `#EXT-X-KEY:METHOD=...,URI="...",IV=...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    pub method: KeyMethod,
    pub uri: Option<String>,
    /// IV exactly as written in the playlist
    pub iv: Option<String>,
}

/// One `#EXT-X-STREAM-INF` entry of a master playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantReference {
    pub uri: String,
    pub bandwidth: u64,
    pub resolution: Option<String>,
    pub codecs: Option<String>,
    pub program_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub version: u8,
    pub media_sequence: u64,
    pub target_duration: f64,
    pub playlist_type: PlaylistType,
    pub end_list: bool,
    /// Order defines the 0-based segment index used by every later stage
    pub segments: Vec<Segment>,
    /// Keyed by 1-based declaration order
    pub keys: BTreeMap<usize, EncryptionKey>,
    pub variants: Vec<VariantReference>,
}

impl Document {
    pub fn is_master(&self) -> bool {
        !self.variants.is_empty()
    }

    /// `(offset, length)` to request for the segment at `index`, if it is a sub-range.
    ///
    /// A range without an explicit offset starts where the previous segment's
    /// range on the same URI ended, or at 0.
    pub fn effective_byte_range(&self, index: usize) -> Option<(u64, u64)> {
        self.segments.get(index)?.byte_range?;

        let mut previous: Option<(&str, u64)> = None;
        let mut current = None;
        for segment in &self.segments[..=index] {
            let Some(range) = segment.byte_range else {
                previous = None;
                continue;
            };
            let offset = match (range.offset, previous) {
                (Some(offset), _) => offset,
                (None, Some((uri, end))) if uri == segment.uri => end,
                (None, _) => 0,
            };
            current = Some((offset, range.length));
            // An end past u64::MAX is kept unreachable so the fetch rejects it
            previous = Some((segment.uri.as_str(), offset.saturating_add(range.length)));
        }
        current
    }
}

/// A media playlist bound to the URL it was fetched from, plus fetched key bytes.
#[derive(Debug, Clone)]
pub struct ResolvedPlaylist {
    pub document: Document,
    pub url: Url,
    key_material: HashMap<usize, Bytes>,
}

impl ResolvedPlaylist {
    pub fn new(document: Document, url: Url) -> Self {
        Self {
            document,
            url,
            key_material: HashMap::new(),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.document.segments.len()
    }

    pub fn segment(&self, index: usize) -> Result<&Segment, HlsDownloaderError> {
        self.document
            .segments
            .get(index)
            .ok_or(HlsDownloaderError::SegmentOutOfRange(index))
    }

    pub fn segment_url(&self, index: usize) -> Result<Url, HlsDownloaderError> {
        let segment = self.segment(index)?;
        resolve_url(&self.url, &segment.uri)
    }

    pub fn set_key_material(&mut self, key_index: usize, key: Bytes) {
        self.key_material.insert(key_index, key);
    }

    /// Key bytes for `key_index`; `None` means the segment is stored in the clear.
    pub fn key_material(&self, key_index: usize) -> Option<&Bytes> {
        if key_index == 0 {
            return None;
        }
        self.key_material.get(&key_index).filter(|key| !key.is_empty())
    }
}
