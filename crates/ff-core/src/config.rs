//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, limit, download, tool and conversion sections. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// 100 MiB.
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub downloads: DownloadConfig,
    pub tools: ToolsConfig,
    pub conversion: ConversionConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.limits.max_upload_bytes == 0 {
            warnings.push("limits.max_upload_bytes is 0; every upload will be rejected".into());
        }

        if self.downloads.timeout_secs == 0 {
            warnings.push("downloads.timeout_secs is 0; every media fetch will time out".into());
        }

        if self.downloads.page_timeout_secs > self.downloads.timeout_secs {
            warnings.push(format!(
                "downloads.page_timeout_secs ({}) exceeds downloads.timeout_secs ({})",
                self.downloads.page_timeout_secs, self.downloads.timeout_secs
            ));
        }

        if !(1..=100).contains(&self.conversion.jpeg_quality) {
            warnings.push(format!(
                "conversion.jpeg_quality {} is outside 1..=100; it will be clamped",
                self.conversion.jpeg_quality
            ));
        }

        if self.conversion.video_crf > 51 {
            warnings.push(format!(
                "conversion.video_crf {} is above the encoder maximum of 51",
                self.conversion.video_crf
            ));
        }

        if self.conversion.max_concurrent == 0 {
            warnings.push("conversion.max_concurrent is 0; treating it as 1".into());
        }

        for (name, path) in self.tools.overrides() {
            if !path.exists() {
                warnings.push(format!(
                    "tools.{name}_path {} does not exist; falling back to PATH",
                    path.display()
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Size limits applied to uploads and remote fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_upload_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Remote download behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Hard wall-clock bound for fetching the located media resource.
    pub timeout_secs: u64,
    /// Bound for fetching the HTML page an extractor inspects.
    pub page_timeout_secs: u64,
    /// Browser user agent sent to platform pages.
    pub user_agent: String,
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            page_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .into(),
        }
    }
}

/// Paths to external CLI tools. Unset paths are resolved from `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub pdf2docx_path: Option<PathBuf>,
    pub soffice_path: Option<PathBuf>,
}

impl ToolsConfig {
    /// The configured override for a known tool name.
    pub fn override_for(&self, name: &str) -> Option<&Path> {
        match name {
            "ffmpeg" => self.ffmpeg_path.as_deref(),
            "ffprobe" => self.ffprobe_path.as_deref(),
            "pdf2docx" => self.pdf2docx_path.as_deref(),
            "soffice" => self.soffice_path.as_deref(),
            _ => None,
        }
    }

    fn overrides(&self) -> impl Iterator<Item = (&'static str, &Path)> {
        ["ffmpeg", "ffprobe", "pdf2docx", "soffice"]
            .into_iter()
            .filter_map(|name| self.override_for(name).map(|p| (name, p)))
    }
}

/// Conversion defaults shared by the adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// JPEG quality used by `compress` and by `convert` without a quality.
    pub jpeg_quality: u8,
    /// x264/vp9 CRF used for video conversion and compression.
    pub video_crf: u32,
    /// Audio bitrate passed to ffmpeg for lossy audio targets.
    pub audio_bitrate: String,
    /// Upper bound on concurrently running process/convert tasks.
    pub max_concurrent: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            video_crf: 28,
            audio_bitrate: "128k".into(),
            max_concurrent: 4,
        }
    }
}
