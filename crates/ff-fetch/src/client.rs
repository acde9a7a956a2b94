//! Shared HTTP client for page and media fetches.
//!
//! Pages an extractor inspects are bounded by the page timeout. The media
//! fetch is bounded by a hard wall-clock timeout covering the whole body and
//! reports [`ff_core::Error::Timeout`] when exceeded. Media bodies are read
//! chunk by chunk and abandoned as soon as they pass the size cap.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use ff_core::config::DownloadConfig;
use ff_core::Error;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};

/// Media body plus the response details downloaders care about.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    /// `Content-Type` without parameters, if the server sent one.
    pub content_type: Option<String>,
    /// URL after redirects.
    pub final_url: String,
}

pub struct HttpFetcher {
    client: reqwest::Client,
    no_redirect: reqwest::Client,
    page_timeout: Duration,
    media_timeout: Duration,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &DownloadConfig, max_bytes: u64) -> ff_core::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;
        let no_redirect = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            no_redirect,
            page_timeout: config.page_timeout(),
            media_timeout: config.timeout(),
            max_bytes,
        })
    }

    /// Override both timeouts.
    pub fn with_timeouts(mut self, page: Duration, media: Duration) -> Self {
        self.page_timeout = page;
        self.media_timeout = media;
        self
    }

    fn request(
        &self,
        client: &reqwest::Client,
        url: &str,
        headers: &[(&str, &str)],
    ) -> reqwest::RequestBuilder {
        headers
            .iter()
            .fold(client.get(url), |req, (name, value)| req.header(*name, *value))
    }

    /// Fetch an HTML/JSON page as text.
    pub async fn fetch_page(&self, url: &str, headers: &[(&str, &str)]) -> ff_core::Result<String> {
        let response = self
            .request(&self.client, url, headers)
            .timeout(self.page_timeout)
            .send()
            .await
            .map_err(|e| page_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("page returned HTTP {status}")));
        }

        response.text().await.map_err(|e| page_error(url, e))
    }

    /// Issue a request without following redirects and return the
    /// `Location` header, if any.
    pub async fn redirect_location(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> ff_core::Result<Option<String>> {
        let response = self
            .request(&self.no_redirect, url, headers)
            .timeout(self.page_timeout)
            .send()
            .await
            .map_err(|e| page_error(url, e))?;

        Ok(response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }

    /// Fetch a media resource under the hard media timeout and size cap.
    pub async fn fetch_media(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> ff_core::Result<FetchedMedia> {
        match tokio::time::timeout(self.media_timeout, self.read_media(url, headers)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(url, after = ?self.media_timeout, "Media fetch timed out");
                Err(Error::Timeout {
                    url: url.to_string(),
                    after: self.media_timeout,
                })
            }
        }
    }

    async fn read_media(&self, url: &str, headers: &[(&str, &str)]) -> ff_core::Result<FetchedMedia> {
        let mut response = self
            .request(&self.client, url, headers)
            .send()
            .await
            .map_err(|e| Error::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("media returned HTTP {status}")));
        }

        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len > self.max_bytes) {
            return Err(size_exceeded());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());
        let final_url = response.url().to_string();

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::fetch(url, format!("failed to read body: {e}")))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(size_exceeded());
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(Error::fetch(url, "empty response body"));
        }

        tracing::debug!(url, size = body.len(), "Fetched media");
        Ok(FetchedMedia {
            bytes: body.freeze(),
            content_type,
            final_url,
        })
    }
}

fn page_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::fetch(url, "page request timed out")
    } else {
        Error::fetch(url, e.to_string())
    }
}

fn size_exceeded() -> Error {
    Error::Validation("File size exceeds limit".into())
}
