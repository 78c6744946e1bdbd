//! Fetching images from their recorded URL during reupload.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::Duration;

/// Why a remote fetch failed. The message ends up as a per-record reason.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch failed: HTTP {status}")]
    Status { status: String },

    #[error("fetch failed: {0}")]
    Request(String),

    #[error("fetch failed: body exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Bytes retrieved from a URL.
#[derive(Clone, Debug)]
pub struct FetchedImage {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Retrieves the bytes behind a URL.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpFetcher {
    /// Build a fetcher. Without a timeout a hanging remote delays the whole batch.
    pub fn new(timeout: Option<Duration>, max_bytes: u64) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("galleryd/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.to_string(),
            });
        }

        if let Some(len) = response.content_length()
            && len > self.max_bytes
        {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut data = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?
        {
            if (data.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            data.extend_from_slice(&chunk);
        }

        Ok(FetchedImage {
            data: data.freeze(),
            content_type,
        })
    }
}
