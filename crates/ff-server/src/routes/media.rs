//! Job status, conversion and download handlers under `/api/media`.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use ff_core::{Error, FileCategory};
use ff_jobs::Job;
use ff_media::Operation;
use serde::{Deserialize, Serialize};

use super::parse_job_id;
use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(flatten)]
    pub job: Job,
    pub file_type: FileCategory,
}

/// Body of a convert request: a bare `{format}` or a full operation such
/// as `{"operation": "resize", "maxWidth": 640, "maxHeight": 480}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConvertRequest {
    Operation(Operation),
    Format {
        format: String,
        #[serde(default)]
        quality: Option<u8>,
    },
}

impl From<ConvertRequest> for Operation {
    fn from(request: ConvertRequest) -> Self {
        match request {
            ConvertRequest::Operation(op) => op,
            ConvertRequest::Format { format, quality } => Operation::Convert { format, quality },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QualityRequest {
    pub quality: String,
}

/// GET /api/media/status/{job_id}
pub async fn status(
    State(ctx): State<AppContext>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let id = parse_job_id(&job_id)?;
    let job = ctx
        .engine
        .get_job(id)
        .ok_or_else(|| Error::not_found("job", id))?;
    let file_type = job.file.file_type.category;
    Ok(Json(StatusResponse { job, file_type }))
}

/// POST /api/media/convert/{job_id}
pub async fn convert(
    State(ctx): State<AppContext>,
    Path(job_id): Path<String>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_job_id(&job_id)?;
    let Json(request) = payload.map_err(|e| Error::Validation(e.body_text()))?;

    let job = ctx
        .engine
        .apply(id, Operation::from(request))
        .await
        .map_err(|e| AppError::new(e).summarize_server_error("Conversion failed"))?;

    Ok(attachment(
        job.file.buffer,
        &job.file.mime_type,
        &job.file.original_name,
    ))
}

/// GET /api/media/download/{job_id}
pub async fn download(
    State(ctx): State<AppContext>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_job_id(&job_id)?;
    let file = ctx.engine.download(id)?;
    Ok(attachment(file.bytes, &file.mime_type, &file.name))
}

/// POST /api/media/youtube-quality/{job_id}
pub async fn youtube_quality(
    State(ctx): State<AppContext>,
    Path(job_id): Path<String>,
    payload: Result<Json<QualityRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_job_id(&job_id)?;
    let Json(request) = payload.map_err(|e| Error::Validation(e.body_text()))?;

    let download = ctx
        .engine
        .redownload_youtube(id, &request.quality)
        .await
        .map_err(|e| AppError::new(e).summarize_server_error("Download failed"))?;

    Ok(attachment(
        download.bytes,
        &download.mime_type,
        &download.original_name,
    ))
}

/// Bytes served as a named attachment.
fn attachment(bytes: Bytes, mime: &str, name: &str) -> Response {
    let content_type = HeaderValue::from_str(mime)
        .unwrap_or_else(|_| HeaderValue::from_static(ff_core::OCTET_STREAM));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_DISPOSITION, disposition),
            (CONTENT_LENGTH, HeaderValue::from(bytes.len())),
        ],
        Body::from(bytes),
    )
        .into_response()
}

/// Keep the filename inside the quoted header parameter.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect()
}
