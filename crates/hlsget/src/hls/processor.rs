// HLS Segment Processor: fetches one segment, decrypts it, trims it to the
// first TS sync byte and persists it under its final name.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace};

use crate::fetcher::Fetcher;
use crate::hls::HlsDownloaderError;
use crate::hls::decryption;
use crate::hls::hls_downloader::RunContext;
use crate::hls::segment_utils::{resolve_iv, trim_to_sync_byte};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Fetched and written during this attempt
    Downloaded,
    /// Already on disk from an earlier run, nothing fetched
    AlreadyPresent,
}

/// Unit of work the scheduler runs once per attempt of a segment index.
#[async_trait]
pub trait SegmentHandler: Send + Sync {
    async fn process(&self, index: usize) -> Result<SegmentOutcome, HlsDownloaderError>;
}

pub struct SegmentProcessor {
    fetcher: Arc<dyn Fetcher>,
    context: Arc<RunContext>,
}

impl SegmentProcessor {
    pub fn new(fetcher: Arc<dyn Fetcher>, context: Arc<RunContext>) -> Self {
        Self { fetcher, context }
    }

    async fn fetch(&self, index: usize) -> Result<Bytes, HlsDownloaderError> {
        let playlist = &self.context.playlist;
        let url = playlist.segment_url(index)?;
        let data = match playlist.document.effective_byte_range(index) {
            Some((offset, length)) => {
                trace!(index, offset, length, "Fetching segment range");
                self.fetcher.get_range(&url, offset, length).await?
            }
            None => self.fetcher.get(&url).await?,
        };
        debug!(index, url = %url, len = data.len(), "Fetched segment");
        Ok(data)
    }

    fn decrypt(&self, index: usize, data: Bytes) -> Result<Bytes, HlsDownloaderError> {
        let playlist = &self.context.playlist;
        let key_index = playlist.segment(index)?.key_index;
        let Some(key) = playlist.key_material(key_index) else {
            return Ok(data);
        };

        let declared_iv = playlist
            .document
            .keys
            .get(&key_index)
            .and_then(|key| key.iv.as_deref());
        // Sequence-number IVs wrap with the sequence counter
        let sequence = playlist.document.media_sequence.wrapping_add(index as u64);
        let iv = resolve_iv(declared_iv, sequence);

        let plaintext = decryption::decrypt(&data, key, &iv)?;
        Ok(Bytes::from(plaintext))
    }
}

#[async_trait]
impl SegmentHandler for SegmentProcessor {
    async fn process(&self, index: usize) -> Result<SegmentOutcome, HlsDownloaderError> {
        let destination = self.context.segment_path(index);
        if tokio::fs::try_exists(&destination).await? {
            debug!(index, "Segment already on disk, skipping");
            return Ok(SegmentOutcome::AlreadyPresent);
        }

        let data = self.fetch(index).await?;
        let data = self.decrypt(index, data)?;
        let data = trim_to_sync_byte(data);

        // Written under a temporary name so a partial file never looks complete
        let temp_path = self.context.temp_segment_path(index);
        tokio::fs::write(&temp_path, &data).await?;
        tokio::fs::rename(&temp_path, &destination).await?;

        Ok(SegmentOutcome::Downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::config::HlsOutputConfig;
    use crate::hls::parser::parse_playlist;
    use crate::hls::playlist::ResolvedPlaylist;
    use crate::hls::{CryptoError, decryption::encrypt};
    use crate::test_utils::MockFetcher;
    use std::path::Path;
    use url::Url;

    const KEY: &[u8; 16] = b"0123456789abcdef";

    fn context(playlist_text: &str, dir: &Path) -> Arc<RunContext> {
        let document = parse_playlist(playlist_text).unwrap();
        let url = Url::parse("https://cdn.test/vod/index.m3u8").unwrap();
        let mut playlist = ResolvedPlaylist::new(document, url);
        playlist.set_key_material(1, Bytes::from_static(KEY));
        Arc::new(RunContext::new(
            playlist,
            dir.to_path_buf(),
            dir.join("output.mp4"),
            HlsOutputConfig::default(),
        ))
    }

    fn plain_playlist(count: usize) -> String {
        let mut text = String::from("#EXTM3U\n");
        for i in 0..count {
            text.push_str(&format!("#EXTINF:4,\nseg{i}.ts\n"));
        }
        text.push_str("#EXT-X-ENDLIST\n");
        text
    }

    #[tokio::test]
    async fn test_existing_segment_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let context = context(&plain_playlist(4), dir.path());
        tokio::fs::write(context.segment_path(2), b"already here")
            .await
            .unwrap();

        let processor = SegmentProcessor::new(fetcher.clone(), context.clone());
        let outcome = processor.process(2).await.unwrap();

        assert_eq!(outcome, SegmentOutcome::AlreadyPresent);
        assert_eq!(fetcher.request_count(), 0);
        assert_eq!(
            tokio::fs::read(context.segment_path(2)).await.unwrap(),
            b"already here"
        );
    }

    #[tokio::test]
    async fn test_plain_segment_is_trimmed_and_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().with("https://cdn.test/vod/seg0.ts", vec![0x00u8, 0x00, 0x47, 0x01, 0x02]),
        );
        let context = context(&plain_playlist(1), dir.path());

        let processor = SegmentProcessor::new(fetcher, context.clone());
        let outcome = processor.process(0).await.unwrap();

        assert_eq!(outcome, SegmentOutcome::Downloaded);
        assert_eq!(
            tokio::fs::read(context.segment_path(0)).await.unwrap(),
            vec![0x47, 0x01, 0x02]
        );
        assert!(!context.temp_segment_path(0).exists());
        assert!(dir.path().join("0.ts").exists());
    }

    #[tokio::test]
    async fn test_encrypted_segment_uses_declared_iv() {
        let iv = [0x11u8; 16];
        let playlist = format!(
            "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"k.bin\",IV=0x{}\n#EXTINF:4,\nseg0.ts\n",
            hex_iv(&iv)
        );
        let payload = [0x47u8, 0x40, 0x00, 0x10, 0xFF];
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new().with(
            "https://cdn.test/vod/seg0.ts",
            encrypt(&payload, KEY, &iv).unwrap(),
        ));
        let context = context(&playlist, dir.path());

        SegmentProcessor::new(fetcher, context.clone())
            .process(0)
            .await
            .unwrap();

        assert_eq!(
            tokio::fs::read(context.segment_path(0)).await.unwrap(),
            payload.to_vec()
        );
    }

    #[tokio::test]
    async fn test_encrypted_segment_derives_iv_from_sequence() {
        let playlist = "#EXTM3U\n#EXT-X-MEDIA-SEQUENCE:7\n#EXT-X-KEY:METHOD=AES-128,URI=\"k.bin\"\n#EXTINF:4,\nseg0.ts\n#EXTINF:4,\nseg1.ts\n";
        let mut iv = [0u8; 16];
        iv[15] = 8;
        let payload = vec![0x47u8; 188];
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new().with(
            "https://cdn.test/vod/seg1.ts",
            encrypt(&payload, KEY, &iv).unwrap(),
        ));
        let context = context(playlist, dir.path());

        SegmentProcessor::new(fetcher, context.clone())
            .process(1)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(context.segment_path(1)).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_sequence_iv_wraps_at_counter_limit() {
        let playlist = "#EXTM3U\n#EXT-X-MEDIA-SEQUENCE:18446744073709551615\n#EXT-X-KEY:METHOD=AES-128,URI=\"k.bin\"\n#EXTINF:4,\nseg0.ts\n#EXTINF:4,\nseg1.ts\n";
        let iv = [0u8; 16];
        let payload = vec![0x47u8; 188];
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new().with(
            "https://cdn.test/vod/seg1.ts",
            encrypt(&payload, KEY, &iv).unwrap(),
        ));
        let context = context(playlist, dir.path());

        let outcome = SegmentProcessor::new(fetcher, context.clone())
            .process(1)
            .await
            .unwrap();

        assert_eq!(outcome, SegmentOutcome::Downloaded);
        assert_eq!(tokio::fs::read(context.segment_path(1)).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_failures_leave_no_segment_file() {
        let playlist = "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"k.bin\"\n#EXTINF:4,\nseg0.ts\n#EXTINF:4,\nseg1.ts\n";
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().with("https://cdn.test/vod/seg0.ts", &b"not block aligned"[..]),
        );
        let context = context(playlist, dir.path());
        let processor = SegmentProcessor::new(fetcher, context.clone());

        let err = processor.process(0).await.unwrap_err();
        assert!(matches!(
            err,
            HlsDownloaderError::Crypto(CryptoError::UnalignedInput(17))
        ));
        assert!(!context.segment_path(0).exists());

        let err = processor.process(1).await.unwrap_err();
        assert!(matches!(err, HlsDownloaderError::Fetch(_)));
        assert!(!context.segment_path(1).exists());
    }

    #[tokio::test]
    async fn test_byte_range_segments_slice_shared_resource() {
        let playlist = "#EXTM3U\n#EXTINF:4,\n#EXT-X-BYTERANGE:3@0\nall.ts\n#EXTINF:4,\n#EXT-X-BYTERANGE:2\nall.ts\n";
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().with("https://cdn.test/vod/all.ts", vec![0x47u8, 1, 2, 0x47, 4]),
        );
        let context = context(playlist, dir.path());
        let processor = SegmentProcessor::new(fetcher, context.clone());

        processor.process(0).await.unwrap();
        processor.process(1).await.unwrap();

        assert_eq!(
            tokio::fs::read(context.segment_path(0)).await.unwrap(),
            vec![0x47, 1, 2]
        );
        assert_eq!(
            tokio::fs::read(context.segment_path(1)).await.unwrap(),
            vec![0x47, 4]
        );
    }

    fn hex_iv(iv: &[u8]) -> String {
        iv.iter().map(|b| format!("{b:02x}")).collect()
    }
}
