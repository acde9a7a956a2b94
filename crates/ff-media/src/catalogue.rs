//! The manipulation catalogue: follow-up conversions and operations offered
//! for a classified file.
//!
//! The catalogue is a pure function of the file's category and extension.
//! It never offers a conversion to the format the file already has; `jpg`
//! and `jpeg` count as the same format. AVIF images are kept as produced,
//! so nothing is offered for them.

use ff_core::{FileCategory, FileType};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Quality presets offered for lossy image targets.
const IMAGE_QUALITIES: &[u8] = &[60, 75, 90];

/// A target format the client may convert to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOption {
    pub format: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Vec<u8>>,
}

/// An in-place operation the client may request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOption {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

/// Everything offered for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManipulationOptions {
    pub conversions: Vec<ConversionOption>,
    pub operations: Vec<OperationOption>,
}

impl ManipulationOptions {
    /// Formats listed in `conversions`, in catalogue order.
    pub fn formats(&self) -> Vec<&str> {
        self.conversions.iter().map(|c| c.format.as_str()).collect()
    }
}

fn conversion(format: &str, label: &str, quality: bool) -> ConversionOption {
    ConversionOption {
        format: format.into(),
        label: label.into(),
        quality: quality.then(|| IMAGE_QUALITIES.to_vec()),
    }
}

fn operation(id: &str, label: &str, kind: &str, options: Option<serde_json::Value>) -> OperationOption {
    OperationOption {
        id: id.into(),
        label: label.into(),
        kind: kind.into(),
        options,
    }
}

fn catalogue_for(category: FileCategory) -> ManipulationOptions {
    match category {
        FileCategory::Image => ManipulationOptions {
            conversions: vec![
                conversion("jpeg", "JPEG", true),
                conversion("png", "PNG", false),
                conversion("webp", "WebP", true),
                conversion("avif", "AVIF", true),
            ],
            operations: vec![
                operation(
                    "resize",
                    "Resize",
                    "resize",
                    Some(json!({
                        "maintainAspectRatio": true,
                        "maxWidth": 3840,
                        "maxHeight": 2160,
                    })),
                ),
                operation("rotate", "Rotate", "rotate", Some(json!({ "angles": [90, 180, 270] }))),
                operation("compress", "Compress", "compress", None),
            ],
        },
        FileCategory::Video => ManipulationOptions {
            conversions: vec![
                conversion("mp4", "MP4", false),
                conversion("webm", "WebM", false),
                conversion("gif", "GIF", false),
            ],
            operations: vec![
                operation("trim", "Trim", "trim", None),
                operation("extract-audio", "Extract Audio", "extract", None),
            ],
        },
        FileCategory::Audio => ManipulationOptions {
            conversions: vec![
                conversion("mp3", "MP3", false),
                conversion("wav", "WAV", false),
                conversion("ogg", "OGG", false),
            ],
            operations: vec![
                operation("trim", "Trim", "trim", None),
                operation("compress", "Compress", "compress", None),
            ],
        },
        FileCategory::Document => ManipulationOptions {
            conversions: vec![
                conversion("pdf", "PDF", false),
                conversion("docx", "Word Document", false),
                conversion("txt", "Plain Text", false),
            ],
            operations: vec![operation("compress", "Compress", "compress", None)],
        },
        FileCategory::Unknown => ManipulationOptions::default(),
    }
}

fn is_jpeg(ext: &str) -> bool {
    ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg")
}

/// The catalogue for `file_type`, minus the no-op self-conversion.
pub fn manipulation_options(file_type: &FileType) -> ManipulationOptions {
    let ext = file_type.extension.as_str();
    if file_type.category == FileCategory::Image && ext.eq_ignore_ascii_case("avif") {
        return ManipulationOptions::default();
    }
    let mut options = catalogue_for(file_type.category);

    options.conversions.retain(|c| {
        if file_type.category == FileCategory::Image && is_jpeg(ext) {
            !is_jpeg(&c.format)
        } else {
            !c.format.eq_ignore_ascii_case(ext)
        }
    });
    options
}
