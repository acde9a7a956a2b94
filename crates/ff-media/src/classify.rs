//! Content-based file classification.
//!
//! Classification looks only at the bytes. The MIME type a client declares
//! for an upload is ignored, so a PNG named `notes.txt` is still an image.

use ff_core::{FileCategory, FileType};

/// How much of the buffer the plain-text heuristic inspects.
const TEXT_SNIFF_LEN: usize = 512;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// MIME types accepted as documents. Anything else outside the image, video
/// and audio families is unknown.
pub const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    DOCX_MIME,
    XLSX_MIME,
    PPTX_MIME,
    "application/vnd.ms-excel",
    "application/vnd.ms-powerpoint",
    "text/plain",
    "application/rtf",
];

/// Classify a buffer by its magic bytes.
pub fn classify(bytes: &[u8]) -> FileType {
    let Some(kind) = infer::get(bytes) else {
        if looks_like_text(bytes) {
            return FileType {
                category: FileCategory::Document,
                mime_type: "text/plain".into(),
                extension: "txt".into(),
            };
        }
        return FileType::unknown();
    };

    let (mime, extension) = match kind.mime_type() {
        "application/zip" => ooxml_kind(bytes).unwrap_or(("application/zip", "zip")),
        mime => (mime, kind.extension()),
    };
    FileType {
        category: category_for_mime(mime),
        mime_type: mime.to_string(),
        extension: extension.to_string(),
    }
}

/// Office Open XML files are zip archives; the magic-byte matcher only
/// recognizes them when the package parts are stored in the usual order, so
/// a plain zip verdict gets a second look at the archive's part names.
fn ooxml_kind(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).ok()?;
    let has = |name: &str| archive.file_names().any(|n| n == name);
    if has("word/document.xml") {
        Some((DOCX_MIME, "docx"))
    } else if has("xl/workbook.xml") {
        Some((XLSX_MIME, "xlsx"))
    } else if has("ppt/presentation.xml") {
        Some((PPTX_MIME, "pptx"))
    } else {
        None
    }
}

/// Map a detected MIME type to its category.
pub fn category_for_mime(mime: &str) -> FileCategory {
    if mime.starts_with("image/") {
        FileCategory::Image
    } else if mime.starts_with("video/") {
        FileCategory::Video
    } else if mime.starts_with("audio/") {
        FileCategory::Audio
    } else if DOCUMENT_TYPES.contains(&mime) {
        FileCategory::Document
    } else {
        FileCategory::Unknown
    }
}

/// Plain text has no magic number: accept a head that holds a line break,
/// no NUL byte, and valid UTF-8 (a multi-byte sequence cut at the sniff
/// boundary is fine).
fn looks_like_text(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(TEXT_SNIFF_LEN)];
    if head.is_empty() || head.contains(&0) {
        return false;
    }
    if !head.iter().any(|&b| b == b'\n' || b == b'\r') {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}
