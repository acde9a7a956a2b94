//! Media adapters and the registry that selects one by MIME type.
//!
//! An adapter characterizes a buffer ([`MediaAdapter::process`]) and
//! transforms it ([`MediaAdapter::manipulate`]). The registry holds an
//! ordered list of adapters and returns the first whose
//! [`supports`](MediaAdapter::supports) matches; declared sets do not
//! overlap, so order only matters for speed.

pub mod av;
pub mod document;
pub mod image;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ff_av::ToolRegistry;
use ff_core::config::ConversionConfig;
use ff_core::FileType;
use serde::{Deserialize, Serialize};

pub use self::av::AvAdapter;
pub use self::document::DocumentAdapter;
pub use self::image::ImageAdapter;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// The payload an adapter works on, with its classification.
#[derive(Debug, Clone)]
pub struct MediaInput {
    pub bytes: Bytes,
    pub file_type: FileType,
}

impl MediaInput {
    pub fn new(bytes: impl Into<Bytes>, file_type: FileType) -> Self {
        Self {
            bytes: bytes.into(),
            file_type,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.file_type.mime_type
    }

    pub fn extension(&self) -> &str {
        &self.file_type.extension
    }
}

/// A transformation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum Operation {
    Convert {
        format: String,
        #[serde(default)]
        quality: Option<u8>,
    },
    Resize {
        #[serde(rename = "maxWidth")]
        max_width: u32,
        #[serde(rename = "maxHeight")]
        max_height: u32,
    },
    Rotate {
        angle: i32,
    },
    Compress {
        #[serde(default)]
        quality: Option<u8>,
    },
    Trim {
        start: f64,
        end: f64,
    },
    ExtractAudio,
}

impl Operation {
    /// Shorthand for a plain format conversion.
    pub fn convert(format: impl Into<String>) -> Self {
        Self::Convert {
            format: format.into(),
            quality: None,
        }
    }

    /// Stable name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Convert { .. } => "convert",
            Self::Resize { .. } => "resize",
            Self::Rotate { .. } => "rotate",
            Self::Compress { .. } => "compress",
            Self::Trim { .. } => "trim",
            Self::ExtractAudio => "extract-audio",
        }
    }

    /// The target format of a conversion, else the operation name.
    pub fn target(&self) -> &str {
        match self {
            Self::Convert { format, .. } => format.as_str(),
            other => other.name(),
        }
    }

    /// Check parameters that no adapter could honour.
    pub fn validate(&self) -> ff_core::Result<()> {
        match self {
            Self::Convert { format, .. } if format.trim().is_empty() => {
                Err(ff_core::Error::Validation("format is required".into()))
            }
            Self::Resize {
                max_width,
                max_height,
            } if *max_width == 0 || *max_height == 0 => Err(ff_core::Error::Validation(
                "resize bounds must be positive".into(),
            )),
            Self::Rotate { angle } if ![90, 180, 270].contains(angle) => {
                Err(ff_core::Error::Unsupported(format!(
                    "rotation by {angle} degrees; use 90, 180 or 270"
                )))
            }
            Self::Trim { start, end }
                if !(start.is_finite() && end.is_finite()) || *start < 0.0 || end <= start =>
            {
                Err(ff_core::Error::Validation(format!(
                    "invalid trim range {start}..{end}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Descriptive metadata gathered by [`MediaAdapter::process`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_alpha: Option<bool>,
    /// Seconds, for audio and video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_conversions: Option<Vec<String>>,
}

impl MediaMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Output of [`MediaAdapter::process`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub mime_type: String,
    pub size: u64,
    pub metadata: MediaMetadata,
}

impl ProcessingResult {
    /// The result reported when characterization fails: the bytes are kept,
    /// nothing is known about them.
    pub fn opaque(size: usize) -> Self {
        Self {
            mime_type: ff_core::OCTET_STREAM.to_string(),
            size: size as u64,
            metadata: MediaMetadata::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A family of media types the service can characterize and transform.
#[async_trait]
pub trait MediaAdapter: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// Whether this adapter handles `mime`.
    fn supports(&self, mime: &str) -> bool;

    /// Target formats [`Operation::Convert`] accepts for `mime`.
    fn conversions(&self, mime: &str) -> Vec<&'static str>;

    /// Names of the other operations offered for `mime`.
    fn operations(&self, _mime: &str) -> Vec<&'static str> {
        Vec::new()
    }

    /// Whether `op` is offered for `mime`, judged without running it.
    fn offers(&self, mime: &str, op: &Operation) -> bool {
        match op {
            Operation::Convert { format, .. } => self
                .conversions(mime)
                .contains(&format.to_ascii_lowercase().as_str()),
            other => self.operations(mime).contains(&other.name()),
        }
    }

    /// Characterize the input without changing it.
    async fn process(&self, input: &MediaInput) -> ff_core::Result<ProcessingResult>;

    /// Apply `op` and return the new bytes.
    ///
    /// Fails with [`ff_core::Error::Unsupported`] when `op` (or its target
    /// format) is not offered for the input, and with a runtime error
    /// (`Transform`, `Tool`, `AdapterUnavailable`) when it is offered but
    /// cannot be carried out.
    async fn manipulate(&self, input: &MediaInput, op: &Operation) -> ff_core::Result<Vec<u8>>;
}

pub(crate) fn unsupported_operation(adapter: &str, op: &Operation, mime: &str) -> ff_core::Error {
    ff_core::Error::Unsupported(format!(
        "{adapter} adapter does not support operation '{}' for {mime}",
        op.name()
    ))
}

pub(crate) fn unsupported_format(format: &str, mime: &str) -> ff_core::Error {
    ff_core::Error::Unsupported(format!("cannot convert {mime} to '{format}'"))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered list of adapters; the first that supports a MIME type wins.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn MediaAdapter>>,
}

impl AdapterRegistry {
    pub fn new(adapters: Vec<Arc<dyn MediaAdapter>>) -> Self {
        Self { adapters }
    }

    /// The image, audio/video and document adapters, in that order.
    pub fn with_defaults(tools: Arc<ToolRegistry>, conversion: &ConversionConfig) -> Self {
        Self::new(vec![
            Arc::new(ImageAdapter::new(conversion)),
            Arc::new(AvAdapter::new(Arc::clone(&tools), conversion)),
            Arc::new(DocumentAdapter::new(tools)),
        ])
    }

    /// The adapter responsible for `mime`, if any.
    pub fn get_adapter(&self, mime: &str) -> Option<Arc<dyn MediaAdapter>> {
        self.adapters.iter().find(|a| a.supports(mime)).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MediaAdapter>> {
        self.adapters.iter()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.adapters.iter().map(|a| a.name()))
            .finish()
    }
}
