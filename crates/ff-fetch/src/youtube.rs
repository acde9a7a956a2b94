//! YouTube extractor.
//!
//! The watch page carries `ytInitialPlayerResponse`, whose streaming data
//! lists muxed and adaptive formats. Only formats with a direct `url` are
//! usable; ciphered ones are skipped. When the player response is missing
//! or yields nothing, the raw markup is scanned for `googlevideo.com`
//! playback URLs.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use ff_core::Error;
use regex::Regex;
use serde::Deserialize;

use crate::client::HttpFetcher;
use crate::registry::{Download, Downloader};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.)?(youtube\.com/(watch\?v=|embed/|v/)|youtu\.be/|m\.youtube\.com/watch\?v=)",
    )
    .expect("valid youtube url regex")
});

static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[?&]v=|/embed/|/v/|youtu\.be/)([A-Za-z0-9_-]{11})").expect("valid id regex")
});

static NAME_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"youtube_.*_([A-Za-z0-9_-]{11})\.").expect("valid name id regex")
});

static GOOGLEVIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://[^"'\s<>]*googlevideo\.com/videoplayback[^"'\s<>]*"#)
        .expect("valid googlevideo regex")
});

static TITLE_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid title regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

pub const DEFAULT_ORIGIN: &str = "https://www.youtube.com";

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ---------------------------------------------------------------------------
// Player response
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    #[serde(default)]
    playability_status: Option<Playability>,
    #[serde(default)]
    video_details: Option<VideoDetails>,
    #[serde(default)]
    streaming_data: Option<StreamingData>,
}

#[derive(Debug, Deserialize)]
struct Playability {
    #[serde(default)]
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    video_id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
    #[serde(default)]
    formats: Vec<Format>,
    #[serde(default)]
    adaptive_formats: Vec<Format>,
}

/// One entry of the player's format list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    pub itag: u32,
    #[serde(default)]
    pub url: Option<String>,
    /// e.g. `video/mp4; codecs="avc1.42001E, mp4a.40.2"`
    pub mime_type: String,
    #[serde(default)]
    pub bitrate: u64,
    #[serde(default)]
    pub quality_label: Option<String>,
    #[serde(default)]
    pub audio_quality: Option<String>,
}

impl Format {
    pub fn base_mime(&self) -> &str {
        self.mime_type.split(';').next().unwrap_or("").trim()
    }

    pub fn container(&self) -> &str {
        self.base_mime()
            .split('/')
            .nth(1)
            .filter(|s| !s.is_empty())
            .unwrap_or("mp4")
    }

    pub fn has_video(&self) -> bool {
        self.base_mime().starts_with("video/")
    }

    /// Audio-only formats, and muxed video formats (which carry an audio
    /// quality).
    pub fn has_audio(&self) -> bool {
        self.base_mime().starts_with("audio/") || self.audio_quality.is_some()
    }
}

/// What a watch page told us about a video.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    /// Formats with a direct URL, muxed first.
    pub formats: Vec<Format>,
    /// Why the player refused to play, when it did.
    pub unplayable_reason: Option<String>,
}

/// Parse the `ytInitialPlayerResponse` object out of a watch page.
pub(crate) fn parse_player_response(html: &str) -> Option<VideoInfo> {
    let start = html.find("ytInitialPlayerResponse")?;
    let rest = &html[start..];
    let brace = rest.find('{')?;
    let response = serde_json::Deserializer::from_str(&rest[brace..])
        .into_iter::<PlayerResponse>()
        .next()?
        .ok()?;

    let details = response.video_details?;
    let streaming = response.streaming_data.unwrap_or_default();
    let formats = streaming
        .formats
        .into_iter()
        .chain(streaming.adaptive_formats)
        .filter(|f| f.url.as_deref().is_some_and(|u| !u.is_empty()))
        .collect();
    let unplayable_reason = response
        .playability_status
        .filter(|p| p.status != "OK")
        .map(|p| p.reason.unwrap_or(p.status));

    Some(VideoInfo {
        id: details.video_id,
        title: details.title,
        formats,
        unplayable_reason,
    })
}

fn highest_bitrate<'a>(formats: &'a [Format], pred: impl Fn(&Format) -> bool) -> Option<&'a Format> {
    formats.iter().filter(|f| pred(f)).max_by_key(|f| f.bitrate)
}

/// A muxed mp4 if there is one, else any muxed format, else the
/// highest-bitrate video.
pub fn choose_format(formats: &[Format]) -> Option<&Format> {
    highest_bitrate(formats, |f| {
        f.has_video() && f.has_audio() && f.container() == "mp4"
    })
    .or_else(|| highest_bitrate(formats, |f| f.has_video() && f.has_audio()))
    .or_else(|| highest_bitrate(formats, Format::has_video))
}

/// The best match for a requested quality, falling back to the highest
/// video.
pub fn choose_quality(formats: &[Format], quality: YouTubeQuality) -> Option<&Format> {
    if quality == YouTubeQuality::AudioOnly {
        return highest_bitrate(formats, |f| f.has_audio() && !f.has_video());
    }

    let itags = quality.itags();
    formats
        .iter()
        .find(|f| itags.contains(&f.itag))
        .or_else(|| {
            highest_bitrate(formats, |f| {
                f.has_video() && f.quality_label.as_deref() == Some(quality.as_str())
            })
        })
        .or_else(|| highest_bitrate(formats, Format::has_video))
}

/// Playback URLs scraped from the raw markup, for pages without a usable
/// player response.
pub(crate) fn googlevideo_urls(html: &str) -> Vec<String> {
    let unescaped = html
        .replace("\\u0026", "&")
        .replace("\\/", "/")
        .replace("&amp;", "&");
    GOOGLEVIDEO_RE
        .find_iter(&unescaped)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strip punctuation, join words with underscores, cap at 100 chars.
pub fn safe_title(title: &str) -> String {
    let stripped = TITLE_STRIP_RE.replace_all(title, "");
    let joined = WHITESPACE_RE.replace_all(stripped.trim(), "_");
    joined.chars().take(100).collect()
}

/// The video id in a watch, embed, or short link.
pub fn video_id_from_url(url: &str) -> Option<String> {
    ID_RE.captures(url).map(|c| c[1].to_string())
}

/// The video id carried by a downloaded file's name
/// (`youtube_<title>_<id>.<ext>`).
pub fn video_id_from_name(name: &str) -> Option<String> {
    NAME_ID_RE.captures(name).map(|c| c[1].to_string())
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Re-download qualities offered for YouTube jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubeQuality {
    P1080,
    P720,
    P480,
    AudioOnly,
}

impl YouTubeQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::AudioOnly => "audioonly",
        }
    }

    /// itags for mp4, webm, and their 60 fps variants at this height.
    pub fn itags(&self) -> &'static [u32] {
        match self {
            Self::P1080 => &[137, 248, 299, 303],
            Self::P720 => &[136, 247, 298, 302],
            Self::P480 => &[135, 244, 245, 246],
            Self::AudioOnly => &[],
        }
    }
}

impl fmt::Display for YouTubeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YouTubeQuality {
    type Err = Error;

    fn from_str(s: &str) -> ff_core::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1080p" => Ok(Self::P1080),
            "720p" => Ok(Self::P720),
            "480p" => Ok(Self::P480),
            "audioonly" => Ok(Self::AudioOnly),
            other => Err(Error::Validation(format!(
                "unknown quality '{other}'; expected 1080p, 720p, 480p or audioonly"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Downloader
// ---------------------------------------------------------------------------

pub struct YouTubeDownloader {
    fetcher: Arc<HttpFetcher>,
    origin: String,
}

impl YouTubeDownloader {
    pub fn new(fetcher: Arc<HttpFetcher>) -> Self {
        Self::with_origin(fetcher, DEFAULT_ORIGIN)
    }

    /// Fetch watch pages from a different origin.
    pub fn with_origin(fetcher: Arc<HttpFetcher>, origin: impl Into<String>) -> Self {
        Self {
            fetcher,
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    async fn watch_page(&self, video_id: &str) -> ff_core::Result<String> {
        let url = format!("{}/watch?v={video_id}", self.origin);
        self.fetcher
            .fetch_page(
                &url,
                &[
                    ("User-Agent", BROWSER_UA),
                    ("Accept-Language", "en-US,en;q=0.9"),
                    ("Cookie", "CONSENT=YES+cb"),
                ],
            )
            .await
    }

    /// Fetch and parse the watch page for `video_id`.
    pub async fn video_info(&self, video_id: &str) -> ff_core::Result<VideoInfo> {
        let html = self.watch_page(video_id).await?;
        let mut info = parse_player_response(&html).unwrap_or_else(|| VideoInfo {
            id: video_id.to_string(),
            title: String::new(),
            formats: Vec::new(),
            unplayable_reason: None,
        });

        if info.formats.is_empty() {
            info.formats = googlevideo_urls(&html)
                .into_iter()
                .map(|url| Format {
                    itag: 0,
                    url: Some(url),
                    mime_type: "video/mp4".into(),
                    bitrate: 0,
                    quality_label: None,
                    audio_quality: Some("unknown".into()),
                })
                .collect();
        }

        if info.formats.is_empty() {
            let reason = info
                .unplayable_reason
                .unwrap_or_else(|| "no playable formats found".to_string());
            return Err(Error::extraction("youtube", reason));
        }
        Ok(info)
    }

    async fn fetch_format(&self, format: &Format) -> ff_core::Result<bytes::Bytes> {
        let url = format
            .url
            .as_deref()
            .ok_or_else(|| Error::extraction("youtube", "format has no direct URL"))?;
        let referer = format!("{}/", self.origin);
        let media = self
            .fetcher
            .fetch_media(
                url,
                &[
                    ("User-Agent", BROWSER_UA),
                    ("Referer", referer.as_str()),
                    ("Origin", self.origin.as_str()),
                ],
            )
            .await?;
        Ok(media.bytes)
    }

    /// Re-download `video_id` at `quality`.
    pub async fn download_quality(
        &self,
        video_id: &str,
        quality: YouTubeQuality,
    ) -> ff_core::Result<Download> {
        let info = self.video_info(video_id).await?;
        let format = choose_quality(&info.formats, quality)
            .ok_or_else(|| Error::Validation("No suitable format found".into()))?;

        tracing::debug!(video_id, %quality, itag = format.itag, "Selected YouTube format");
        let bytes = self.fetch_format(format).await?;

        let title = safe_title(&info.title);
        let (name, fallback_mime) = match quality {
            YouTubeQuality::AudioOnly => (format!("youtube_{title}_{}.mp3", info.id), "audio/mpeg"),
            _ => (format!("youtube_{title}_{quality}_{}.mp4", info.id), "video/mp4"),
        };
        let mime = match format.base_mime() {
            "" => fallback_mime.to_string(),
            m => m.to_string(),
        };
        Ok(Download::new(bytes, name, mime))
    }
}

#[async_trait]
impl Downloader for YouTubeDownloader {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn can_handle(&self, url: &str) -> bool {
        URL_RE.is_match(url)
    }

    async fn download(&self, url: &str) -> ff_core::Result<Download> {
        let video_id = video_id_from_url(url)
            .ok_or_else(|| Error::extraction("youtube", format!("no video id in {url}")))?;
        let info = self.video_info(&video_id).await?;
        let format = choose_format(&info.formats)
            .ok_or_else(|| Error::extraction("youtube", "no suitable format found"))?;

        tracing::debug!(video_id = %info.id, itag = format.itag, "Selected YouTube format");
        let bytes = self.fetch_format(format).await?;

        let name = format!(
            "youtube_{}_{}.{}",
            safe_title(&info.title),
            info.id,
            format.container()
        );
        Ok(Download::new(bytes, name, format.base_mime().to_string()))
    }
}
