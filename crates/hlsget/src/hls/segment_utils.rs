use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::warn;
use url::Url;

use crate::hls::HlsDownloaderError;

/// MPEG-TS packet sync byte
pub const TS_SYNC_BYTE: u8 = 0x47;

/// Resolve a playlist reference (segment, variant or key URI) against the
/// URL of the playlist that declared it.
///
/// Absolute URLs pass through, `/path` is resolved against the origin and
/// anything else against the playlist's directory. A leading `//` is a path
/// on the base origin, never a different host.
pub fn resolve_url(base: &Url, reference: &str) -> Result<Url, HlsDownloaderError> {
    let reference = reference.trim();
    let joined = match reference.strip_prefix('/') {
        Some(path) => base.join(&format!("/{}", path.trim_start_matches('/'))),
        None => base.join(reference),
    };
    joined.map_err(|e| HlsDownloaderError::InvalidUrl {
        url: reference.to_string(),
        reason: format!("cannot resolve against {base}: {e}"),
    })
}

/// Drop everything before the first sync byte. Buffers without one are returned as-is.
pub fn trim_to_sync_byte(data: Bytes) -> Bytes {
    match memchr::memchr(TS_SYNC_BYTE, &data) {
        Some(0) | None => data,
        Some(pos) => data.slice(pos..),
    }
}

/// IV for a segment: a `0x`-prefixed hex literal is decoded, any other declared
/// value is used verbatim, and a missing IV falls back to the media sequence
/// number as a big-endian 128-bit integer.
///
/// Short hex literals are left-padded to 128 bits.
pub fn resolve_iv(declared: Option<&str>, media_sequence: u64) -> Vec<u8> {
    let Some(iv) = declared else {
        return sequence_iv(media_sequence).to_vec();
    };
    let Some(hex_digits) = iv.strip_prefix("0x").or_else(|| iv.strip_prefix("0X")) else {
        return iv.as_bytes().to_vec();
    };
    match hex::decode(format!("{hex_digits:0>32}")) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(iv, error = %e, "IV is not valid hex, using it verbatim");
            iv.as_bytes().to_vec()
        }
    }
}

fn sequence_iv(val: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[8..].copy_from_slice(&val.to_be_bytes());
    iv
}

pub fn segment_file_name(index: usize, extension: &str) -> String {
    format!("{index}.{extension}")
}

/// Per-run directory name, stable for a given playlist URL so that a re-run
/// picks up the segments a previous run already stored.
pub fn segments_dir_name(prefix: &str, playlist_url: &str) -> String {
    let digest = Sha256::digest(playlist_url.as_bytes());
    let hash = hex::encode(digest);
    format!("{prefix}{}", &hash[..12])
}
