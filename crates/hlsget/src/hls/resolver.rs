// Manifest resolver: follows master playlists down to a media playlist and
// fetches the key material it references.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::fetcher::Fetcher;
use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsPlaylistConfig;
use crate::hls::parser::parse_playlist;
use crate::hls::playlist::{Document, KeyMethod, ResolvedPlaylist};
use crate::hls::segment_utils::resolve_url;

pub struct ManifestResolver {
    fetcher: Arc<dyn Fetcher>,
    config: HlsPlaylistConfig,
}

impl ManifestResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: HlsPlaylistConfig) -> Self {
        Self { fetcher, config }
    }

    /// Resolve `url` to a media playlist with all AES-128 keys fetched.
    ///
    /// A master playlist is replaced by its first variant, level by level, up
    /// to `max_resolve_depth` hops.
    pub async fn resolve(&self, url: &str) -> Result<ResolvedPlaylist, HlsDownloaderError> {
        let mut current = Url::parse(url).map_err(|e| HlsDownloaderError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut depth = 0;

        let document = loop {
            let document = self.load(&current).await?;

            if let Some(variant) = document.variants.first() {
                if depth >= self.config.max_resolve_depth {
                    return Err(HlsDownloaderError::ResolutionDepthExceeded(
                        self.config.max_resolve_depth,
                    ));
                }
                depth += 1;
                let next = resolve_url(&current, &variant.uri)?;
                debug!(
                    "Master playlist {current} lists {} variants, following {next}",
                    document.variants.len()
                );
                current = next;
                continue;
            }

            if document.segments.is_empty() {
                return Err(HlsDownloaderError::NoSegments(current.to_string()));
            }
            break document;
        };

        info!(
            url = %current,
            segments = document.segments.len(),
            keys = document.keys.len(),
            "Resolved media playlist"
        );

        let mut resolved = ResolvedPlaylist::new(document, current);
        self.fetch_keys(&mut resolved).await?;
        Ok(resolved)
    }

    async fn load(&self, url: &Url) -> Result<Document, HlsDownloaderError> {
        debug!("Fetching playlist {url}");
        let body = self.fetcher.get(url).await?;
        let text = String::from_utf8_lossy(&body);
        Ok(parse_playlist(&text)?)
    }

    async fn fetch_keys(&self, resolved: &mut ResolvedPlaylist) -> Result<(), HlsDownloaderError> {
        let keys: Vec<_> = resolved
            .document
            .keys
            .iter()
            .filter(|(_, key)| key.method == KeyMethod::Aes128)
            .filter_map(|(index, key)| Some((*index, key.uri.clone()?)))
            .collect();

        for (key_index, uri) in keys {
            let key_url = resolve_url(&resolved.url, &uri)?;
            let key = self.fetcher.get(&key_url).await?;
            if key.len() != 16 {
                warn!(
                    key_index,
                    url = %key_url,
                    len = key.len(),
                    "Key is not 16 bytes, segments using it will fail to decrypt"
                );
            }
            debug!(key_index, url = %key_url, "Fetched key");
            resolved.set_key_material(key_index, key);
        }
        Ok(())
    }
}
