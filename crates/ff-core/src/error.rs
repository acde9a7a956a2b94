//! Unified error type for fileforge.
//!
//! Ingest, adapters, downloaders and the job engine all fail with [`Error`].
//! Route handlers derive the HTTP status from [`Error::http_status`]; the job
//! engine stores `to_string()` of the error in the job record.

use std::fmt;
use std::time::Duration;

/// Every failure mode the service distinguishes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input was rejected before any work started (bad type, too large).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The target is busy with another mutation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The operation or target format is not offered for this input.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// An external engine the adapter needs is missing or misconfigured.
    #[error("{adapter} unavailable: {message}")]
    AdapterUnavailable {
        /// Adapter or engine name.
        adapter: String,
        /// Human-readable reason.
        message: String,
    },

    /// A downloader could not locate media in the source page.
    #[error("Extraction failed [{platform}]: {message}")]
    Extraction {
        /// Downloader that failed (e.g. "tiktok").
        platform: String,
        /// Human-readable reason.
        message: String,
    },

    /// An adapter's manipulate step failed at runtime.
    #[error("Transform error [{operation}]: {message}")]
    Transform {
        /// Operation that was running (e.g. "convert").
        operation: String,
        /// Human-readable reason.
        message: String,
    },

    /// An external tool (ffmpeg, pdf2docx, ...) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A network fetch exceeded its wall-clock bound.
    #[error("Download timeout: {url} exceeded {}s", .after.as_secs())]
    Timeout {
        /// The URL being fetched.
        url: String,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// An HTTP request failed for a reason other than a timeout.
    #[error("Fetch error [{url}]: {message}")]
    Fetch {
        /// The URL being fetched.
        url: String,
        /// Human-readable reason.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::Unsupported(_) => 422,
            Error::AdapterUnavailable { .. } => 503,
            Error::Extraction { .. } => 502,
            Error::Transform { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Timeout { .. } => 504,
            Error::Fetch { .. } => 502,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation_error",
            Error::Conflict(_) => "conflict",
            Error::Unsupported(_) => "unsupported",
            Error::AdapterUnavailable { .. } => "adapter_unavailable",
            Error::Extraction { .. } => "extraction_failed",
            Error::Transform { .. } => "transform_error",
            Error::Tool { .. } => "tool_error",
            Error::Timeout { .. } => "download_timeout",
            Error::Fetch { .. } => "fetch_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// The message without its category prefix.
    pub fn reason(&self) -> String {
        match self {
            Error::Validation(message)
            | Error::Conflict(message)
            | Error::Unsupported(message)
            | Error::Internal(message) => message.clone(),
            Error::AdapterUnavailable { message, .. }
            | Error::Extraction { message, .. }
            | Error::Transform { message, .. }
            | Error::Tool { message, .. }
            | Error::Fetch { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::AdapterUnavailable`].
    pub fn unavailable(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Error::AdapterUnavailable {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Extraction`].
    pub fn extraction(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Extraction {
            platform: platform.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Transform`].
    pub fn transform(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transform {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Fetch`].
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
