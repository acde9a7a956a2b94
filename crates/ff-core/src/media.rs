//! Media-domain types: file categories, detected file types, and the static
//! extension-to-MIME table used for response headers and converted results.
//!
//! Enums serialize in lowercase and implement `Display` manually for a
//! consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type used when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// FileCategory
// ---------------------------------------------------------------------------

/// Semantic category derived from content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
    Unknown,
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Document => write!(f, "document"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// FileType
// ---------------------------------------------------------------------------

/// The classifier's verdict for a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileType {
    pub category: FileCategory,
    pub mime_type: String,
    pub extension: String,
}

impl FileType {
    /// The verdict for bytes nothing recognizes.
    pub fn unknown() -> Self {
        Self {
            category: FileCategory::Unknown,
            mime_type: OCTET_STREAM.to_string(),
            extension: "bin".to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.category == FileCategory::Unknown
    }
}

// ---------------------------------------------------------------------------
// Extension -> MIME table
// ---------------------------------------------------------------------------

const MIME_TABLE: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("avif", "image/avif"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("pdf", "application/pdf"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("txt", "text/plain"),
];

/// Look up the MIME type for a file extension (case-insensitive).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Like [`mime_for_extension`] but falls back to `application/octet-stream`.
pub fn mime_or_octet_stream(ext: &str) -> &'static str {
    mime_for_extension(ext).unwrap_or(OCTET_STREAM)
}

/// Replace the trailing extension of `name` with `ext`, keeping the stem.
///
/// A name without an extension gets `ext` appended.
pub fn replace_extension(name: &str, ext: &str) -> String {
    format!("{}.{}", file_stem(name), ext.trim_start_matches('.'))
}

/// The part of `name` before its last `.`, or the whole name.
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}
