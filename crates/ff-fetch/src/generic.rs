//! Plain HTTP fetch for URLs no platform extractor claims.

use std::sync::Arc;

use async_trait::async_trait;
use ff_core::{Error, OCTET_STREAM};
use percent_encoding::percent_decode_str;
use reqwest::Url;

use crate::client::HttpFetcher;
use crate::registry::{Download, Downloader};

pub struct GenericDownloader {
    fetcher: Arc<HttpFetcher>,
}

impl GenericDownloader {
    pub fn new(fetcher: Arc<HttpFetcher>) -> Self {
        Self { fetcher }
    }
}

fn parse_http_url(url: &str) -> Option<Url> {
    Url::parse(url)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}

/// The last non-empty path segment, percent-decoded, or `download`.
pub(crate) fn name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .unwrap_or_else(|| "download".to_string())
}

#[async_trait]
impl Downloader for GenericDownloader {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn can_handle(&self, url: &str) -> bool {
        parse_http_url(url).is_some()
    }

    async fn download(&self, url: &str) -> ff_core::Result<Download> {
        let parsed = parse_http_url(url)
            .ok_or_else(|| Error::Validation(format!("Invalid URL: {url}")))?;

        let media = self.fetcher.fetch_media(parsed.as_str(), &[]).await?;
        let name = name_from_url(&parsed);
        let mime = media
            .content_type
            .unwrap_or_else(|| OCTET_STREAM.to_string());

        Ok(Download::new(media.bytes, name, mime))
    }
}
