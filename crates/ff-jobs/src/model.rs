//! Job records as stored and as serialized to clients.
//!
//! JSON is camelCase. The payload bytes never serialize; clients fetch them
//! through the download endpoint.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use ff_core::{FileType, JobId};
use ff_media::{ManipulationOptions, MediaMetadata};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// A job that is queued or being worked on accepts no new mutation.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// JobFile
// ---------------------------------------------------------------------------

/// The job's current payload and what is known about it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFile {
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub file_type: FileType,
    #[serde(skip)]
    pub buffer: Bytes,
}

impl JobFile {
    /// A payload whose MIME type is the classifier's verdict.
    pub fn new(original_name: impl Into<String>, file_type: FileType, buffer: Bytes) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: file_type.mime_type.clone(),
            size: buffer.len() as u64,
            file_type,
            buffer,
        }
    }
}

// ---------------------------------------------------------------------------
// JobResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// Where the current payload can be downloaded.
    pub url: String,
    pub mime_type: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// 0..=100; never decreases within one processing or conversion run.
    pub progress: u8,
    pub file: JobFile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manipulation_options: Option<ManipulationOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, file: JobFile, source_url: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            file,
            result: None,
            manipulation_options: None,
            error: None,
            source_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// Path of the download endpoint for this job.
    pub fn download_url(&self) -> String {
        download_url(self.id)
    }

    /// Enter `processing` at `progress`.
    pub(crate) fn start(&mut self, progress: u8) {
        self.status = JobStatus::Processing;
        self.progress = progress;
        self.error = None;
        self.touch();
    }

    /// Raise progress; lower values are ignored.
    pub(crate) fn advance(&mut self, progress: u8) {
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
            self.touch();
        }
    }

    pub(crate) fn complete(&mut self, result: JobResult, options: ManipulationOptions) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.result = Some(result);
        self.manipulation_options = Some(options);
        self.error = None;
        self.touch();
    }

    /// Terminal failure. The payload stays as it was.
    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.result = None;
        self.error = Some(error.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

pub fn download_url(id: JobId) -> String {
    format!("/api/media/download/{id}")
}
