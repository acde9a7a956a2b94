//! Twitter/X extractor.
//!
//! Tweets are read through a mirror that renders player metadata for link
//! previews when asked with a bot user agent. The video URL comes from the
//! `twitter:video` or `og:video` meta tag, with a scan of the raw markup for
//! `video.twimg.com` links as the fallback.

use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ff_core::Error;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};

use crate::client::HttpFetcher;
use crate::registry::{Download, Downloader};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(www\.)?(twitter\.com|x\.com)").expect("valid twitter url regex")
});

static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"status/(\d+)").expect("valid status regex"));

static TWIMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://video\.twimg\.com/[^"'\s<>]+\.mp4[^"'\s<>]*"#)
        .expect("valid twimg regex")
});

pub const DEFAULT_MIRROR: &str = "https://vxtwitter.com";

const MIRROR_UA: &str = "TelegramBot (like TwitterBot)";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const REFERER: &str = "https://twitter.com/";

pub struct TwitterDownloader {
    fetcher: Arc<HttpFetcher>,
    mirror: String,
}

impl TwitterDownloader {
    pub fn new(fetcher: Arc<HttpFetcher>) -> Self {
        Self::with_mirror(fetcher, DEFAULT_MIRROR)
    }

    /// Use a different mirror origin, e.g. `http://127.0.0.1:8081`.
    pub fn with_mirror(fetcher: Arc<HttpFetcher>, mirror: impl Into<String>) -> Self {
        Self {
            fetcher,
            mirror: mirror.into().trim_end_matches('/').to_string(),
        }
    }

    /// Map a twitter.com or x.com URL onto the mirror, keeping path and query.
    pub(crate) fn mirror_url(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let is_twitter = matches!(
            host,
            "twitter.com" | "www.twitter.com" | "x.com" | "www.x.com"
        );
        if !is_twitter {
            return None;
        }

        let mut mirrored = format!("{}{}", self.mirror, parsed.path());
        if let Some(query) = parsed.query() {
            mirrored.push('?');
            mirrored.push_str(query);
        }
        Some(mirrored)
    }
}

/// The video URL advertised in the page's meta tags, else the first
/// `video.twimg.com` mp4 link in the raw markup.
pub(crate) fn video_url_from_page(html: &str) -> Option<String> {
    let from_meta = {
        let document = Html::parse_document(html);
        ["meta[name=\"twitter:video\"]", "meta[property=\"og:video\"]"]
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .find_map(|selector| {
                document
                    .select(&selector)
                    .filter_map(|el| el.value().attr("content"))
                    .map(str::trim)
                    .find(|content| !content.is_empty())
                    .map(str::to_string)
            })
    };

    from_meta.or_else(|| {
        TWIMG_RE
            .find(html)
            .map(|m| m.as_str().replace("&amp;", "&"))
    })
}

fn status_id(url: &str) -> String {
    STATUS_RE
        .captures(url)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis().to_string())
                .unwrap_or_else(|_| "0".to_string())
        })
}

#[async_trait]
impl Downloader for TwitterDownloader {
    fn name(&self) -> &'static str {
        "twitter"
    }

    fn can_handle(&self, url: &str) -> bool {
        URL_RE.is_match(url)
    }

    async fn download(&self, url: &str) -> ff_core::Result<Download> {
        let mirror_url = self
            .mirror_url(url)
            .ok_or_else(|| Error::extraction("twitter", format!("not a tweet URL: {url}")))?;

        let html = self
            .fetcher
            .fetch_page(&mirror_url, &[("User-Agent", MIRROR_UA)])
            .await?;
        let video_url = video_url_from_page(&html)
            .ok_or_else(|| Error::extraction("twitter", "no video found in this tweet"))?;

        tracing::debug!(url, video_url = %video_url, "Located tweet video");
        let media = self
            .fetcher
            .fetch_media(&video_url, &[("User-Agent", BROWSER_UA), ("Referer", REFERER)])
            .await?;

        Ok(Download::new(
            media.bytes,
            format!("twitter_{}.mp4", status_id(url)),
            "video/mp4",
        ))
    }
}
