//! `POST /api/upload`: ingest from a multipart file or a JSON `{url}`.

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use ff_core::{Error, FileCategory, JobId};
use ff_jobs::{IngestSource, JobStatus};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;

const NOTHING_TO_INGEST: &str = "No file or URL provided";

#[derive(Debug, Deserialize)]
pub struct UrlUpload {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub file_type: FileCategory,
}

/// POST /api/upload
pub async fn upload(
    State(ctx): State<AppContext>,
    request: Request,
) -> Result<Json<UploadResponse>, AppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let source = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &ctx)
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;
        read_file_field(multipart).await?
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<UrlUpload>::from_request(request, &ctx)
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;
        let url = body
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::Validation(NOTHING_TO_INGEST.into()))?;
        IngestSource::Url(url)
    } else {
        return Err(Error::Validation(NOTHING_TO_INGEST.into()).into());
    };

    let submitted = ctx.engine.ingest(source).await?;
    let job = submitted.job;
    Ok(Json(UploadResponse {
        job_id: job.id,
        status: job.status,
        file_type: job.file.file_type.category,
    }))
}

async fn read_file_field(mut multipart: Multipart) -> Result<IngestSource, Error> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let declared_mime = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(IngestSource::Upload {
            name,
            declared_mime,
            bytes,
        });
    }
    Err(Error::Validation(NOTHING_TO_INGEST.into()))
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::Validation("File size exceeds limit".into())
    } else {
        Error::Validation(e.body_text())
    }
}
