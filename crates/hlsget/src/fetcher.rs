// Fetcher: the single seam through which playlists, keys and segments are retrieved.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::{debug, trace};
use url::Url;

use crate::DownloaderConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned status {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("Byte range {offset}+{length} exceeds the {available} bytes returned by {url}")]
    RangeOutOfBounds {
        url: String,
        offset: u64,
        length: u64,
        available: u64,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Retrieves whole resources or byte ranges of them.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Bytes, FetchError>;

    /// Fetches `length` bytes starting at `offset`. The default implementation
    /// downloads the whole resource and slices it.
    async fn get_range(&self, url: &Url, offset: u64, length: u64) -> Result<Bytes, FetchError> {
        let body = self.get(url).await?;
        slice_range(url, body, offset, length)
    }
}

pub(crate) fn slice_range(
    url: &Url,
    body: Bytes,
    offset: u64,
    length: u64,
) -> Result<Bytes, FetchError> {
    let available = body.len() as u64;
    match offset.checked_add(length) {
        Some(end) if end <= available => Ok(body.slice(offset as usize..end as usize)),
        _ => Err(FetchError::RangeOutOfBounds {
            url: url.to_string(),
            offset,
            length,
            available,
        }),
    }
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<Client, FetchError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(16)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder.build().map_err(FetchError::Client)
}

/// [`Fetcher`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &DownloaderConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    async fn send(&self, url: &Url, range: Option<(u64, u64)>) -> Result<Bytes, FetchError> {
        let mut request_builder = self.client.get(url.clone());
        if let Some((offset, length)) = range {
            let last = offset
                .checked_add(length)
                .map(|end| end - 1)
                .ok_or_else(|| FetchError::RangeOutOfBounds {
                    url: url.to_string(),
                    offset,
                    length,
                    available: 0,
                })?;
            let range_str = format!("bytes={offset}-{last}");
            request_builder = request_builder.header(reqwest::header::RANGE, range_str);
        }

        let response = request_builder
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;
        trace!(url = %url, status = %status, len = body.len(), "Fetched resource");

        match range {
            // Server ignored the Range header and sent the full resource
            Some((offset, length)) if status != StatusCode::PARTIAL_CONTENT => {
                debug!(url = %url, "Range not honoured by server, slicing locally");
                slice_range(url, body, offset, length)
            }
            _ => Ok(body),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<Bytes, FetchError> {
        self.send(url, None).await
    }

    async fn get_range(&self, url: &Url, offset: u64, length: u64) -> Result<Bytes, FetchError> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        self.send(url, Some((offset, length))).await
    }
}
