//! The downloader contract and the ordered registry that dispatches on URL.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::client::HttpFetcher;
use crate::generic::GenericDownloader;
use crate::tiktok::TikTokDownloader;
use crate::twitter::TwitterDownloader;
use crate::youtube::YouTubeDownloader;

/// Raw bytes resolved from a source URL, with the name and MIME type the
/// downloader declares for them.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Bytes,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
}

impl Download {
    pub fn new(bytes: Bytes, original_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            size: bytes.len() as u64,
            bytes,
            original_name: original_name.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Resolves URLs of one platform to media bytes.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Short platform name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Whether this downloader claims `url`.
    fn can_handle(&self, url: &str) -> bool;

    async fn download(&self, url: &str) -> ff_core::Result<Download>;
}

/// Platform extractors in a fixed order, with a generic fetch behind them.
pub struct DownloaderRegistry {
    platforms: Vec<Arc<dyn Downloader>>,
    fallback: Arc<dyn Downloader>,
}

impl DownloaderRegistry {
    /// TikTok, YouTube and Twitter/X in that order, then the generic fetch.
    pub fn with_defaults(fetcher: Arc<HttpFetcher>) -> Self {
        let youtube = Arc::new(YouTubeDownloader::new(fetcher.clone()));
        Self::with_youtube(fetcher, youtube)
    }

    /// Like [`with_defaults`](Self::with_defaults) but sharing an existing
    /// YouTube downloader, which also serves quality re-downloads.
    pub fn with_youtube(fetcher: Arc<HttpFetcher>, youtube: Arc<YouTubeDownloader>) -> Self {
        Self::from_parts(
            vec![
                Arc::new(TikTokDownloader::new(fetcher.clone())),
                youtube,
                Arc::new(TwitterDownloader::new(fetcher.clone())),
            ],
            Arc::new(GenericDownloader::new(fetcher)),
        )
    }

    pub fn from_parts(platforms: Vec<Arc<dyn Downloader>>, fallback: Arc<dyn Downloader>) -> Self {
        Self {
            platforms,
            fallback,
        }
    }

    /// The first platform downloader claiming `url`, else the generic fetch.
    pub fn for_url(&self, url: &str) -> &dyn Downloader {
        self.platforms
            .iter()
            .find(|d| d.can_handle(url))
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    /// Dispatch `url` and download it.
    pub async fn download(&self, url: &str) -> ff_core::Result<Download> {
        let url = url.trim();
        let downloader = self.for_url(url);
        tracing::info!(url, downloader = downloader.name(), "Downloading remote source");

        let download = downloader.download(url).await.inspect_err(|e| {
            tracing::warn!(url, downloader = downloader.name(), "Download failed: {e}");
        })?;

        tracing::info!(
            url,
            name = %download.original_name,
            size = download.size,
            "Download complete"
        );
        Ok(download)
    }

    pub fn platforms(&self) -> impl Iterator<Item = &Arc<dyn Downloader>> {
        self.platforms.iter()
    }
}

impl std::fmt::Debug for DownloaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.platforms.iter().map(|d| d.name()).collect();
        f.debug_struct("DownloaderRegistry")
            .field("platforms", &names)
            .field("fallback", &self.fallback.name())
            .finish()
    }
}
