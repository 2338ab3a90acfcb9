// In-memory fetcher shared by the pipeline tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::StatusCode;
use url::Url;

use crate::fetcher::{FetchError, Fetcher};

/// Serves registered bodies by exact URL; anything else is a 404.
#[derive(Default)]
pub(crate) struct MockFetcher {
    responses: Mutex<HashMap<String, Bytes>>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, url: &str, body: impl Into<Bytes>) -> Self {
        self.responses.lock().insert(url.to_string(), body.into());
        self
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn get(&self, url: &Url) -> Result<Bytes, FetchError> {
        self.requests.lock().push(url.to_string());
        self.responses
            .lock()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND,
            })
    }
}
