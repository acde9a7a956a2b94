//! # ff-fetch
//!
//! Resolve a source URL to raw media bytes.
//!
//! A [`DownloaderRegistry`] holds the platform extractors (TikTok, YouTube,
//! Twitter/X) in a fixed order and falls back to a plain HTTP fetch when no
//! extractor claims the URL. Every downloader shares one [`HttpFetcher`],
//! which applies the page and media timeouts and the size cap.

pub mod client;
pub mod generic;
pub mod registry;
pub mod tiktok;
pub mod twitter;
pub mod youtube;

pub use client::{FetchedMedia, HttpFetcher};
pub use generic::GenericDownloader;
pub use registry::{Download, Downloader, DownloaderRegistry};
pub use tiktok::TikTokDownloader;
pub use twitter::TwitterDownloader;
pub use youtube::{YouTubeDownloader, YouTubeQuality};
