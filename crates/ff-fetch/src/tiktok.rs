//! TikTok extractor.
//!
//! The page embeds the item either as `__NEXT_DATA__` or as `SIGI_STATE`;
//! older or trimmed pages only leave a `playAddr` string in the markup.
//! Items older than the watermark cutover can resolve an unwatermarked copy
//! through the legacy play API; that step is best effort.

use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ff_core::Error;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::client::{FetchedMedia, HttpFetcher};
use crate::registry::{Download, Downloader};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(www\.|vm\.|vt\.)?tiktok\.com").expect("valid tiktok url regex")
});

static PLAY_ADDR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""playAddr":"([^"]+)""#).expect("valid playAddr regex"));

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/video/(\d+)").expect("valid video id regex"));

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/86.0.4240.75 Safari/537.36";
const LEGACY_APP_UA: &str = "com.zhiliaoapp.musically/2021600040 (Linux; U; Android 7.1.2; en_US; \
                             SM-G977N; Build/LMY48Z; Cronet/TTNetVersion:5f9540e5 2021-05-20 \
                             QuicVersion:47946d2a 2020-10-14)";
const REFERER: &str = "https://www.tiktok.com/";

/// 2020-07-27T00:00:00Z; items created before this predate watermarking.
const WATERMARK_CUTOVER: i64 = 1_595_808_000;

pub const LEGACY_PLAY_API: &str = "https://api2-16-h2.musical.ly/aweme/v1/play/";

/// The fields of an item the download needs.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TikTokItem {
    pub id: String,
    pub download_addr: Option<String>,
    pub play_addr: Option<String>,
    pub create_time: Option<i64>,
}

impl TikTokItem {
    fn from_json(value: &Value) -> Option<Self> {
        let id = json_string(&value["id"])?;
        let video = &value["video"];
        let non_empty = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_string);
        Some(Self {
            id,
            download_addr: non_empty(&video["downloadAddr"]),
            play_addr: non_empty(&video["playAddr"]),
            create_time: json_string(&value["createTime"]).and_then(|t| t.parse().ok()),
        })
    }

    fn media_url(&self) -> Option<&str> {
        self.download_addr.as_deref().or(self.play_addr.as_deref())
    }

    fn predates_watermark(&self) -> bool {
        self.create_time.is_some_and(|t| t < WATERMARK_CUTOVER)
    }
}

/// TikTok serializes ids and timestamps as strings or numbers depending on
/// the page generation.
fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn script_json(document: &Html, id: &str) -> Option<Value> {
    let selector = Selector::parse(&format!("script#{id}")).ok()?;
    let script = document.select(&selector).next()?;
    let text: String = script.text().collect();
    serde_json::from_str(text.trim()).ok()
}

fn from_next_data(document: &Html) -> Option<TikTokItem> {
    let data = script_json(document, "__NEXT_DATA__")?;
    let props = &data["props"]["pageProps"];
    let item = [&props["itemInfo"]["itemStruct"], &props["videoData"]]
        .into_iter()
        .find_map(TikTokItem::from_json);
    item
}

fn from_sigi_state(document: &Html) -> Option<TikTokItem> {
    let data = script_json(document, "SIGI_STATE")?;
    data["ItemModule"]
        .as_object()?
        .values()
        .next()
        .and_then(TikTokItem::from_json)
}

fn from_markup(html: &str, page_url: &str) -> Option<TikTokItem> {
    let raw = PLAY_ADDR_RE.captures(html)?.get(1)?.as_str();
    let play_addr = raw.replace("\\u002F", "/").replace("\\/", "/");
    let id = VIDEO_ID_RE
        .captures(page_url)
        .or_else(|| VIDEO_ID_RE.captures(html))
        .map(|c| c[1].to_string())
        .unwrap_or_else(fallback_id);

    Some(TikTokItem {
        id,
        download_addr: None,
        play_addr: Some(play_addr),
        create_time: None,
    })
}

fn fallback_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

/// Locate the item in a page: embedded JSON first, then the raw markup.
pub(crate) fn extract_item(html: &str, page_url: &str) -> Option<TikTokItem> {
    let structured = {
        let document = Html::parse_document(html);
        from_next_data(&document).or_else(|| from_sigi_state(&document))
    };
    structured
        .filter(|item| item.media_url().is_some())
        .or_else(|| from_markup(html, page_url))
}

/// The 32-character `vid:` tag embedded in a watermarked file.
pub(crate) fn embedded_video_id(bytes: &[u8]) -> Option<String> {
    let start = bytes.windows(4).position(|w| w == b"vid:")? + 4;
    let raw = bytes.get(start..start + 32)?;
    let id = std::str::from_utf8(raw).ok()?;
    id.chars()
        .all(|c| c.is_ascii_alphanumeric())
        .then(|| id.to_string())
}

pub struct TikTokDownloader {
    fetcher: Arc<HttpFetcher>,
    play_api: String,
}

impl TikTokDownloader {
    pub fn new(fetcher: Arc<HttpFetcher>) -> Self {
        Self::with_play_api(fetcher, LEGACY_PLAY_API)
    }

    /// Use a different legacy play endpoint, e.g. `http://127.0.0.1:8081/play`.
    pub fn with_play_api(fetcher: Arc<HttpFetcher>, play_api: impl Into<String>) -> Self {
        Self {
            fetcher,
            play_api: play_api.into(),
        }
    }

    async fn fetch_video(&self, url: &str) -> ff_core::Result<FetchedMedia> {
        self.fetcher
            .fetch_media(
                url,
                &[
                    ("User-Agent", BROWSER_UA),
                    ("Referer", REFERER),
                    ("Range", "bytes=0-"),
                ],
            )
            .await
    }

    /// Resolve the unwatermarked URL from the id tagged in a watermarked file.
    async fn unwatermarked_url(&self, watermarked: &FetchedMedia) -> ff_core::Result<Option<String>> {
        let Some(video_id) = embedded_video_id(&watermarked.bytes) else {
            return Ok(None);
        };

        let api = format!(
            "{}?video_id={video_id}&vr_type=0&is_play_url=1\
             &source=PackSourceEnum_PUBLISH&media_type=4",
            self.play_api
        );
        self.fetcher
            .redirect_location(&api, &[("User-Agent", LEGACY_APP_UA)])
            .await
    }

    /// The primary media, swapped for the unwatermarked copy when a
    /// pre-cutover item has one.
    async fn fetch_best(&self, item: &TikTokItem, primary: &str) -> ff_core::Result<FetchedMedia> {
        let watermarked = self.fetch_video(primary).await?;
        if !item.predates_watermark() {
            return Ok(watermarked);
        }

        match self.unwatermarked_url(&watermarked).await {
            Ok(Some(url)) => match self.fetch_video(&url).await {
                Ok(media) => return Ok(media),
                Err(e) => {
                    tracing::debug!(id = %item.id, "Unwatermarked fetch failed, keeping primary media: {e}")
                }
            },
            Ok(None) => tracing::debug!(id = %item.id, "No unwatermarked URL available"),
            Err(e) => tracing::debug!(id = %item.id, "Unwatermarked lookup failed: {e}"),
        }
        Ok(watermarked)
    }
}

#[async_trait]
impl Downloader for TikTokDownloader {
    fn name(&self) -> &'static str {
        "tiktok"
    }

    fn can_handle(&self, url: &str) -> bool {
        URL_RE.is_match(url)
    }

    async fn download(&self, url: &str) -> ff_core::Result<Download> {
        let html = self
            .fetcher
            .fetch_page(url, &[("User-Agent", BROWSER_UA), ("Referer", REFERER)])
            .await?;

        let item = extract_item(&html, url)
            .ok_or_else(|| Error::extraction("tiktok", "no video data found in page"))?;
        let primary = item
            .media_url()
            .ok_or_else(|| Error::extraction("tiktok", "video has no playable address"))?
            .to_string();

        tracing::debug!(id = %item.id, create_time = ?item.create_time, "Located TikTok item");
        let media = self.fetch_best(&item, &primary).await?;

        Ok(Download::new(
            media.bytes,
            format!("tiktok_{}.mp4", item.id),
            "video/mp4",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_core::config::DownloadConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE_URL: &str = "https://www.tiktok.com/@someone/video/7212345678901234567";

    #[test]
    fn next_data_item_struct() {
        let html = r#"<html><body>
            <script id="__NEXT_DATA__" type="application/json" nonce="abc" crossorigin="anonymous">
            {"props":{"pageProps":{"itemInfo":{"itemStruct":{
                "id":"7212345678901234567","createTime":"1680000000",
                "video":{"downloadAddr":"https://v16.tiktokcdn.com/dl.mp4","playAddr":"https://v16.tiktokcdn.com/play.mp4"}
            }}}}}
            </script></body></html>"#;
        let item = extract_item(html, PAGE_URL).unwrap();
        assert_eq!(item.id, "7212345678901234567");
        assert_eq!(item.media_url(), Some("https://v16.tiktokcdn.com/dl.mp4"));
        assert!(!item.predates_watermark());
    }

    #[test]
    fn next_data_video_data() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"videoData":{
                "id":1234,"createTime":1500000000,"video":{"playAddr":"https://cdn/p.mp4"}
            }}}}</script>"#;
        let item = extract_item(html, PAGE_URL).unwrap();
        assert_eq!(item.id, "1234");
        assert_eq!(item.media_url(), Some("https://cdn/p.mp4"));
        assert!(item.predates_watermark());
    }

    #[test]
    fn sigi_state_item_module() {
        let html = r#"<script id="SIGI_STATE" type="application/json">
            {"ItemModule":{"987":{"id":"987","createTime":"1690000000",
                "video":{"playAddr":"https://cdn/sigi.mp4","downloadAddr":""}}}}
            </script>"#;
        let item = extract_item(html, PAGE_URL).unwrap();
        assert_eq!(item.id, "987");
        assert_eq!(item.media_url(), Some("https://cdn/sigi.mp4"));
    }

    #[test]
    fn markup_fallback_unescapes_slashes() {
        let html = r#"<script>window.x = {"playAddr":"https://v19.tiktokcdn.com/video.mp4"}</script>"#;
        let item = extract_item(html, PAGE_URL).unwrap();
        assert_eq!(item.id, "7212345678901234567");
        assert_eq!(item.media_url(), Some("https://v19.tiktokcdn.com/video.mp4"));
    }

    #[test]
    fn structured_item_without_address_falls_back_to_markup() {
        let html = r#"<script id="SIGI_STATE" type="application/json">
            {"ItemModule":{"5":{"id":"5","video":{}}}}</script>
            <div data-x='"playAddr":"https://cdn/raw.mp4"'></div>"#;
        let item = extract_item(html, PAGE_URL).unwrap();
        assert_eq!(item.media_url(), Some("https://cdn/raw.mp4"));
    }

    #[test]
    fn nothing_to_extract() {
        assert!(extract_item("<html><body>login wall</body></html>", PAGE_URL).is_none());
    }

    #[test]
    fn embedded_vid_tag() {
        let mut bytes = b"....ftypmp42 junk vid:".to_vec();
        bytes.extend_from_slice(b"v09044190000bsk9fsl1m3t2ph2jv9b0");
        bytes.extend_from_slice(b"\x00\x01 trailing");
        assert_eq!(
            embedded_video_id(&bytes).as_deref(),
            Some("v09044190000bsk9fsl1m3t2ph2jv9b0")
        );
        assert_eq!(embedded_video_id(b"no tag here"), None);
        assert_eq!(embedded_video_id(b"vid:short"), None);
    }

    const TAGGED_ID: &str = "v09044190000bsk9fsl1m3t2ph2jv9b0";

    fn tagged_media() -> Vec<u8> {
        let mut bytes = b"\x00\x00\x00\x18ftypmp42 vid:".to_vec();
        bytes.extend_from_slice(TAGGED_ID.as_bytes());
        bytes.extend_from_slice(&[0u8; 32]);
        bytes
    }

    /// A pre-cutover page whose item plays from `{server}/media/primary.mp4`.
    async fn mount_legacy_page(server: &MockServer) {
        let page = format!(
            r#"<script id="__NEXT_DATA__" type="application/json">
            {{"props":{{"pageProps":{{"videoData":{{
                "id":"6800000000000000001","createTime":"1580000000",
                "video":{{"playAddr":"{}/media/primary.mp4"}}
            }}}}}}}}</script>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/@someone/video/6800000000000000001"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/primary.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(tagged_media()))
            .expect(1)
            .mount(server)
            .await;
    }

    fn downloader(server: &MockServer) -> TikTokDownloader {
        let fetcher = HttpFetcher::new(&DownloadConfig::default(), 1 << 20).unwrap();
        TikTokDownloader::with_play_api(Arc::new(fetcher), format!("{}/play", server.uri()))
    }

    #[tokio::test]
    async fn failed_play_lookup_keeps_the_primary_media() {
        let server = MockServer::start().await;
        mount_legacy_page(&server).await;
        Mock::given(method("GET"))
            .and(path("/play"))
            .and(query_param("video_id", TAGGED_ID))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let download = downloader(&server)
            .download(&format!("{}/@someone/video/6800000000000000001", server.uri()))
            .await
            .unwrap();
        assert_eq!(download.original_name, "tiktok_6800000000000000001.mp4");
        assert_eq!(download.bytes, tagged_media());
    }

    #[tokio::test]
    async fn failed_unwatermarked_fetch_keeps_the_primary_media() {
        let server = MockServer::start().await;
        mount_legacy_page(&server).await;
        Mock::given(method("GET"))
            .and(path("/play"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/media/clean.mp4", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/clean.mp4"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let download = downloader(&server)
            .download(&format!("{}/@someone/video/6800000000000000001", server.uri()))
            .await
            .unwrap();
        assert_eq!(download.bytes, tagged_media());
    }

    #[tokio::test]
    async fn unwatermarked_copy_replaces_the_primary() {
        let server = MockServer::start().await;
        mount_legacy_page(&server).await;
        Mock::given(method("GET"))
            .and(path("/play"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/media/clean.mp4", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/clean.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"clean video bytes".to_vec()))
            .mount(&server)
            .await;

        let download = downloader(&server)
            .download(&format!("{}/@someone/video/6800000000000000001", server.uri()))
            .await
            .unwrap();
        assert_eq!(&download.bytes[..], b"clean video bytes");
    }

    #[test]
    fn url_pattern() {
        assert!(URL_RE.is_match("https://vm.tiktok.com/ZMabc/"));
        assert!(URL_RE.is_match("http://tiktok.com/@a/video/1"));
        assert!(!URL_RE.is_match("https://tiktok.example.com/x"));
    }
}
