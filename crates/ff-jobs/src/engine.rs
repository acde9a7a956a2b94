//! Job lifecycle engine.
//!
//! ```text
//! ingest -> classify -> pending -> processing -> completed | failed
//!                                      ^                 |
//!                                      +---- convert ----+
//! ```
//!
//! Every heavy step (characterization, manipulation) runs on a spawned task
//! and holds a permit from a bounded semaphore. Conversions are awaited by
//! the caller, but because they run on their own task a caller that goes
//! away still leaves the job in a terminal state.

use std::sync::Arc;

use bytes::Bytes;
use ff_core::config::Config;
use ff_core::events::{EventBus, EventPayload};
use ff_core::{mime_or_octet_stream, replace_extension, Error, FileType, JobId};
use ff_fetch::youtube::video_id_from_name;
use ff_fetch::{Download, DownloaderRegistry, YouTubeDownloader, YouTubeQuality};
use ff_media::classify::category_for_mime;
use ff_media::{
    classify, manipulation_options, AdapterRegistry, MediaAdapter, MediaInput, MediaMetadata,
    Operation,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::model::{download_url, Job, JobFile, JobResult, JobStatus};
use crate::store::JobStore;

/// Progress markers reported during a run.
const PROGRESS_STARTED: u8 = 10;
const PROGRESS_WORKING: u8 = 30;
const PROGRESS_FINISHING: u8 = 90;

const NO_ADAPTER: &str = "No adapter found for file type";

/// Where an ingested file comes from.
#[derive(Debug, Clone)]
pub enum IngestSource {
    Upload {
        name: String,
        /// What the client claimed; informational only.
        declared_mime: Option<String>,
        bytes: Bytes,
    },
    Url(String),
}

/// A freshly queued job and the task processing it.
#[derive(Debug)]
pub struct Submitted {
    pub job: Job,
    pub handle: JoinHandle<()>,
}

/// The current payload of a completed job.
#[derive(Debug, Clone)]
pub struct Converted {
    pub bytes: Bytes,
    pub name: String,
    pub mime_type: String,
}

impl From<&Job> for Converted {
    fn from(job: &Job) -> Self {
        Self {
            bytes: job.file.buffer.clone(),
            name: job.file.original_name.clone(),
            mime_type: job.file.mime_type.clone(),
        }
    }
}

#[derive(Clone)]
pub struct JobEngine {
    store: Arc<JobStore>,
    adapters: Arc<AdapterRegistry>,
    downloaders: Arc<DownloaderRegistry>,
    youtube: Arc<YouTubeDownloader>,
    events: Arc<EventBus>,
    permits: Arc<Semaphore>,
    max_upload_bytes: u64,
}

impl JobEngine {
    pub fn new(
        adapters: Arc<AdapterRegistry>,
        downloaders: Arc<DownloaderRegistry>,
        youtube: Arc<YouTubeDownloader>,
        events: Arc<EventBus>,
        config: &Config,
    ) -> Self {
        Self {
            store: Arc::new(JobStore::new()),
            adapters,
            downloaders,
            youtube,
            events,
            permits: Arc::new(Semaphore::new(config.conversion.max_concurrent.max(1))),
            max_upload_bytes: config.limits.max_upload_bytes,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    // -- Ingest --------------------------------------------------------------

    /// Resolve `source` to bytes, classify them and queue a job.
    ///
    /// Oversized and unrecognized payloads are rejected with
    /// `Validation` before any job exists.
    pub async fn ingest(&self, source: IngestSource) -> ff_core::Result<Submitted> {
        let (name, bytes, source_url) = match source {
            IngestSource::Upload {
                name,
                declared_mime,
                bytes,
            } => {
                tracing::debug!(name = %name, declared_mime = ?declared_mime, size = bytes.len(), "Received upload");
                (name, bytes, None)
            }
            IngestSource::Url(url) => {
                let url = url.trim().to_string();
                if url.is_empty() {
                    return Err(Error::Validation("URL is required".into()));
                }
                let download = self.downloaders.download(&url).await?;
                (download.original_name, download.bytes, Some(url))
            }
        };

        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(Error::Validation("File size exceeds limit".into()));
        }

        let file_type = classify(&bytes);
        if file_type.is_unknown() {
            tracing::info!(name = %name, mime = %file_type.mime_type, "Rejecting unsupported file type");
            return Err(Error::Validation("Unsupported file type".into()));
        }

        Ok(self.add(JobFile::new(name, file_type, bytes), source_url))
    }

    /// Store a `pending` job and spawn its processing task.
    pub fn add(&self, file: JobFile, source_url: Option<String>) -> Submitted {
        let job = self.store.create_job(file, source_url);
        let id = job.id;
        tracing::info!(
            job_id = %id,
            name = %job.file.original_name,
            mime = %job.file.mime_type,
            size = job.file.size,
            "Job queued"
        );
        self.events.broadcast(EventPayload::JobQueued {
            job_id: id,
            category: job.file.file_type.category,
        });

        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.process(id).await });
        Submitted { job, handle }
    }

    pub fn get_job(&self, id: JobId) -> Option<Job> {
        self.store.get_job(id)
    }

    // -- Processing ----------------------------------------------------------

    async fn process(&self, id: JobId) {
        if let Err(e) = self.run_process(id).await {
            tracing::error!(job_id = %id, "Job failed: {e}");
            if let Err(store_err) = self.store.fail_job(id, e.to_string()) {
                tracing::error!(job_id = %id, "Could not record failure: {store_err}");
            }
            self.events.broadcast(EventPayload::JobFailed {
                job_id: id,
                error: e.to_string(),
            });
        }
    }

    async fn run_process(&self, id: JobId) -> ff_core::Result<()> {
        let _permit = self.acquire().await?;
        let job = self.store.start_processing(id, PROGRESS_STARTED)?;
        self.events.broadcast(EventPayload::JobStarted { job_id: id });
        tracing::info!(job_id = %id, "Processing job");

        let adapter = self
            .adapters
            .get_adapter(&job.file.mime_type)
            .ok_or_else(|| Error::Unsupported(NO_ADAPTER.into()))?;
        self.progress(id, PROGRESS_WORKING);

        let input = MediaInput::new(job.file.buffer.clone(), job.file.file_type.clone());
        let processed = adapter.process(&input).await?;
        self.progress(id, PROGRESS_FINISHING);

        let result = JobResult {
            url: download_url(id),
            mime_type: processed.mime_type,
            size: processed.size,
            metadata: non_empty(processed.metadata),
        };
        let options = manipulation_options(&job.file.file_type);
        self.store.complete_job(id, None, result, options)?;

        tracing::info!(job_id = %id, adapter = adapter.name(), "Job completed");
        self.events.broadcast(EventPayload::JobCompleted { job_id: id });
        Ok(())
    }

    // -- Conversion ----------------------------------------------------------

    /// Convert the job's current payload to `format` and wait for the
    /// outcome.
    pub async fn convert(&self, id: JobId, format: &str) -> ff_core::Result<Job> {
        self.apply(id, Operation::convert(format)).await
    }

    /// Apply `op` to the job's current payload and wait for the outcome.
    ///
    /// Rejections (`Validation`, `NotFound`, `Conflict`, `Unsupported`)
    /// leave the job untouched. A runtime failure marks the job failed but
    /// keeps the previous payload.
    pub async fn apply(&self, id: JobId, op: Operation) -> ff_core::Result<Job> {
        let op = normalize(op);
        op.validate()?;

        let job = self
            .store
            .get_job(id)
            .ok_or_else(|| Error::not_found("job", id))?;
        if job.status.is_active() {
            return Err(Error::Conflict(format!("job {id} is still {}", job.status)));
        }

        let mime = job.file.mime_type.clone();
        let adapter = self
            .adapters
            .get_adapter(&mime)
            .ok_or_else(|| Error::Unsupported(format!("{NO_ADAPTER}: {mime}")))?;
        if !adapter.offers(&mime, &op) {
            return Err(match &op {
                Operation::Convert { format, .. } => {
                    Error::Unsupported(format!("cannot convert {mime} to '{format}'"))
                }
                other => Error::Unsupported(format!(
                    "operation '{}' is not available for {mime}",
                    other.name()
                )),
            });
        }

        let job = self.store.begin_conversion(id, PROGRESS_STARTED)?;
        let target = op.target().to_string();
        tracing::info!(job_id = %id, from = %mime, operation = op.name(), target = %target, "Conversion started");
        self.events.broadcast(EventPayload::ConversionStarted {
            job_id: id,
            format: target,
        });

        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.run_conversion(job, adapter, op).await });
        handle
            .await
            .map_err(|e| Error::Internal(format!("conversion task for job {id} failed: {e}")))?
    }

    async fn run_conversion(
        &self,
        job: Job,
        adapter: Arc<dyn MediaAdapter>,
        op: Operation,
    ) -> ff_core::Result<Job> {
        let id = job.id;
        let target = op.target().to_string();
        match self.transform(&job, adapter.as_ref(), &op).await {
            Ok((file, result)) => {
                let options = manipulation_options(&file.file_type);
                let done = self.store.complete_job(id, Some(file), result, options)?;
                tracing::info!(job_id = %id, target = %target, size = done.file.size, "Conversion completed");
                self.events.broadcast(EventPayload::ConversionCompleted {
                    job_id: id,
                    format: target,
                });
                Ok(done)
            }
            Err(e) => {
                tracing::error!(job_id = %id, target = %target, "Conversion failed: {e}");
                if let Err(store_err) = self.store.fail_job(id, e.to_string()) {
                    tracing::error!(job_id = %id, "Could not record failure: {store_err}");
                }
                self.events.broadcast(EventPayload::ConversionFailed {
                    job_id: id,
                    format: target,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn transform(
        &self,
        job: &Job,
        adapter: &dyn MediaAdapter,
        op: &Operation,
    ) -> ff_core::Result<(JobFile, JobResult)> {
        let id = job.id;
        let _permit = self.acquire().await?;
        self.progress(id, PROGRESS_WORKING);

        let input = MediaInput::new(job.file.buffer.clone(), job.file.file_type.clone());
        let output = adapter.manipulate(&input, op).await?;
        if output.is_empty() {
            return Err(Error::transform(op.name(), "adapter produced no output"));
        }
        self.progress(id, PROGRESS_FINISHING);

        let bytes = Bytes::from(output);
        let file = match op {
            Operation::Convert { format, .. } => {
                let mime = mime_or_octet_stream(format);
                JobFile {
                    original_name: replace_extension(&job.file.original_name, format),
                    mime_type: mime.to_string(),
                    size: bytes.len() as u64,
                    file_type: converted_file_type(&bytes, format, mime),
                    buffer: bytes,
                }
            }
            _ => reshaped_file(&job.file, bytes),
        };
        let result = JobResult {
            url: download_url(id),
            mime_type: file.mime_type.clone(),
            size: file.size,
            metadata: self.describe(&file).await,
        };
        Ok((file, result))
    }

    /// Best-effort metadata for a converted payload.
    async fn describe(&self, file: &JobFile) -> Option<MediaMetadata> {
        let adapter = self.adapters.get_adapter(&file.mime_type)?;
        let input = MediaInput::new(file.buffer.clone(), file.file_type.clone());
        match adapter.process(&input).await {
            Ok(processed) => non_empty(processed.metadata),
            Err(e) => {
                tracing::debug!(mime = %file.mime_type, "No metadata for converted file: {e}");
                None
            }
        }
    }

    // -- Retrieval -----------------------------------------------------------

    /// The current payload, available once the job is completed.
    pub fn download(&self, id: JobId) -> ff_core::Result<Converted> {
        let job = self
            .store
            .get_job(id)
            .ok_or_else(|| Error::not_found("job", id))?;
        if job.status != JobStatus::Completed {
            return Err(Error::Validation("File not available".into()));
        }
        Ok(Converted::from(&job))
    }

    /// Fetch the YouTube video behind a job again at `quality`.
    pub async fn redownload_youtube(&self, id: JobId, quality: &str) -> ff_core::Result<Download> {
        let job = self
            .store
            .get_job(id)
            .ok_or_else(|| Error::not_found("job", id))?;
        let quality: YouTubeQuality = quality.parse()?;
        let video_id = video_id_from_name(&job.file.original_name)
            .ok_or_else(|| Error::Validation("Could not extract video ID".into()))?;

        tracing::info!(job_id = %id, video_id = %video_id, %quality, "Re-downloading YouTube video");
        self.youtube.download_quality(&video_id, quality).await
    }

    // -- Helpers -------------------------------------------------------------

    async fn acquire(&self) -> ff_core::Result<OwnedSemaphorePermit> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("worker pool is closed".into()))
    }

    fn progress(&self, id: JobId, progress: u8) {
        match self.store.set_progress(id, progress) {
            Ok(()) => self.events.broadcast(EventPayload::JobProgress {
                job_id: id,
                progress,
            }),
            Err(e) => tracing::debug!(job_id = %id, "Progress update dropped: {e}"),
        }
    }
}

/// Canonical spelling of a conversion target.
fn normalize(op: Operation) -> Operation {
    match op {
        Operation::Convert { format, quality } => Operation::Convert {
            format: format.trim().trim_start_matches('.').to_ascii_lowercase(),
            quality,
        },
        other => other,
    }
}

/// The payload produced by an in-place operation. Its type comes from the
/// new bytes; the name only changes when the extension does.
fn reshaped_file(source: &JobFile, bytes: Bytes) -> JobFile {
    let detected = classify(&bytes);
    let file_type = if detected.is_unknown() {
        source.file_type.clone()
    } else {
        detected
    };
    let original_name = if same_extension(&file_type.extension, &source.file_type.extension) {
        source.original_name.clone()
    } else {
        replace_extension(&source.original_name, &file_type.extension)
    };
    JobFile {
        original_name,
        mime_type: file_type.mime_type.clone(),
        size: bytes.len() as u64,
        file_type,
        buffer: bytes,
    }
}

fn same_extension(a: &str, b: &str) -> bool {
    let canonical = |ext: &str| {
        let ext = ext.to_ascii_lowercase();
        if ext == "jpeg" {
            "jpg".to_string()
        } else {
            ext
        }
    };
    canonical(a) == canonical(b)
}

fn non_empty(metadata: MediaMetadata) -> Option<MediaMetadata> {
    (!metadata.is_empty()).then_some(metadata)
}

/// Classify converted bytes, falling back to the target format when the
/// content has no recognizable signature.
fn converted_file_type(bytes: &[u8], format: &str, mime: &str) -> FileType {
    let detected = classify(bytes);
    if !detected.is_unknown() {
        return detected;
    }
    FileType {
        category: category_for_mime(mime),
        mime_type: mime.to_string(),
        extension: format.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ff_av::ToolRegistry;
    use ff_core::config::ConversionConfig;
    use ff_core::FileCategory;
    use ff_fetch::HttpFetcher;
    use ff_media::ProcessingResult;
    use std::io::Cursor;
    use tokio::sync::Notify;

    fn engine_with(adapters: AdapterRegistry, config: Config) -> JobEngine {
        let fetcher = Arc::new(
            HttpFetcher::new(&config.downloads, config.limits.max_upload_bytes).unwrap(),
        );
        let youtube = Arc::new(YouTubeDownloader::new(fetcher.clone()));
        let downloaders = Arc::new(DownloaderRegistry::with_youtube(fetcher, youtube.clone()));
        JobEngine::new(
            Arc::new(adapters),
            downloaders,
            youtube,
            Arc::new(EventBus::default()),
            &config,
        )
    }

    fn engine() -> JobEngine {
        engine_with(
            AdapterRegistry::with_defaults(
                Arc::new(ToolRegistry::empty()),
                &ConversionConfig::default(),
            ),
            Config::default(),
        )
    }

    fn png(w: u32, h: u32) -> Bytes {
        let img = ::image::RgbaImage::from_pixel(w, h, ::image::Rgba([0, 128, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ::image::ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    fn upload(name: &str, bytes: Bytes) -> IngestSource {
        IngestSource::Upload {
            name: name.into(),
            declared_mime: None,
            bytes,
        }
    }

    async fn ingest_and_wait(engine: &JobEngine, source: IngestSource) -> Job {
        let submitted = engine.ingest(source).await.unwrap();
        submitted.handle.await.unwrap();
        engine.get_job(submitted.job.id).unwrap()
    }

    /// Adapter whose `process` waits for a signal and whose `manipulate`
    /// always fails.
    struct GatedAdapter {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl MediaAdapter for GatedAdapter {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn supports(&self, mime: &str) -> bool {
            mime == "image/png"
        }

        fn conversions(&self, _mime: &str) -> Vec<&'static str> {
            vec!["webp"]
        }

        async fn process(&self, input: &MediaInput) -> ff_core::Result<ProcessingResult> {
            self.gate.notified().await;
            Ok(ProcessingResult::opaque(input.bytes.len()))
        }

        async fn manipulate(&self, _input: &MediaInput, op: &Operation) -> ff_core::Result<Vec<u8>> {
            Err(Error::transform(op.name(), "encoder exploded"))
        }
    }

    #[tokio::test]
    async fn png_upload_completes_with_metadata() {
        let engine = engine();
        let job = ingest_and_wait(&engine, upload("photo.png", png(10, 10))).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.file.mime_type, "image/png");
        assert_eq!(job.file.file_type.category, FileCategory::Image);
        let result = job.result.unwrap();
        assert_eq!(result.url, format!("/api/media/download/{}", job.id));
        let metadata = result.metadata.unwrap();
        assert_eq!((metadata.width, metadata.height), (Some(10), Some(10)));
        let options = job.manipulation_options.unwrap();
        assert!(!options.formats().contains(&"png"));
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn convert_replaces_payload_and_result() {
        let engine = engine();
        let job = ingest_and_wait(&engine, upload("photo.png", png(10, 10))).await;

        let converted = engine.convert(job.id, "webp").await.unwrap();
        assert_eq!(converted.status, JobStatus::Completed);
        assert_eq!(converted.file.original_name, "photo.webp");
        assert_eq!(converted.file.mime_type, "image/webp");
        assert_eq!(converted.file.file_type.extension, "webp");
        let result = converted.result.unwrap();
        assert_eq!(result.mime_type, "image/webp");
        assert_eq!(result.size, converted.file.size);

        let options = converted.manipulation_options.unwrap();
        assert!(!options.formats().contains(&"webp"));
        assert!(options.formats().contains(&"png"));

        let download = engine.download(job.id).unwrap();
        assert_eq!(download.name, "photo.webp");
        assert_eq!(download.mime_type, "image/webp");

        let events = engine.events().recent_events(20);
        assert!(events
            .iter()
            .any(|e| matches!(e.payload, EventPayload::ConversionCompleted { ref format, .. } if format == "webp")));
    }

    #[tokio::test]
    async fn unsupported_format_leaves_job_untouched() {
        let engine = engine();
        let job = ingest_and_wait(&engine, upload("photo.png", png(4, 4))).await;

        let err = engine.convert(job.id, "mp3").await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert_eq!(err.http_status(), 422);

        let after = engine.get_job(job.id).unwrap();
        assert_eq!(after.status, JobStatus::Completed);
        assert_eq!(after.result, job.result);
        assert_eq!(after.file.buffer, job.file.buffer);
        assert_eq!(after.updated_at, job.updated_at);
    }

    #[tokio::test]
    async fn unknown_and_oversized_inputs_create_no_job() {
        let engine = engine();
        let err = engine
            .ingest(upload("blob.bin", Bytes::from_static(&[0u8, 159, 146, 150, 0, 1])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m == "Unsupported file type"));

        let mut config = Config::default();
        config.limits.max_upload_bytes = 16;
        let small = engine_with(
            AdapterRegistry::with_defaults(Arc::new(ToolRegistry::empty()), &config.conversion),
            config,
        );
        let err = small.ingest(upload("photo.png", png(10, 10))).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m == "File size exceeds limit"));

        assert!(engine.store().is_empty());
        assert!(small.store().is_empty());
    }

    #[tokio::test]
    async fn missing_adapter_fails_the_job() {
        let engine = engine_with(AdapterRegistry::new(Vec::new()), Config::default());
        let job = ingest_and_wait(&engine, upload("photo.png", png(2, 2))).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert!(job.error.unwrap().contains("No adapter found for file type"));

        let err = engine.download(job.id).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m == "File not available"));
    }

    #[tokio::test]
    async fn busy_job_rejects_convert_and_failures_keep_payload() {
        let gate = Arc::new(Notify::new());
        let engine = engine_with(
            AdapterRegistry::new(vec![Arc::new(GatedAdapter { gate: gate.clone() })]),
            Config::default(),
        );

        let submitted = engine.ingest(upload("photo.png", png(3, 3))).await.unwrap();
        let id = submitted.job.id;

        let err = engine.convert(id, "webp").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(err.http_status(), 409);

        gate.notify_one();
        submitted.handle.await.unwrap();
        let completed = engine.get_job(id).unwrap();
        assert_eq!(completed.status, JobStatus::Completed);

        let err = engine.convert(id, "webp").await.unwrap_err();
        assert!(matches!(err, Error::Transform { .. }));

        let failed = engine.get_job(id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.result.is_none());
        assert!(failed.error.unwrap().contains("encoder exploded"));
        assert_eq!(failed.file.buffer, completed.file.buffer);
        assert_eq!(failed.file.original_name, "photo.png");
    }

    #[tokio::test]
    async fn convert_unknown_job_is_not_found() {
        let engine = engine();
        let id: JobId = "404".parse().unwrap();
        assert!(matches!(
            engine.convert(id, "png").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(engine.download(id), Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn url_ingest_uses_generic_fetch() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/readme.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_string("first line\nsecond line\n"),
            )
            .mount(&server)
            .await;

        let engine = engine();
        let url = format!("{}/docs/readme.txt", server.uri());
        let job = ingest_and_wait(&engine, IngestSource::Url(url.clone())).await;

        assert_eq!(job.file.original_name, "readme.txt");
        assert_eq!(job.file.file_type.category, FileCategory::Document);
        assert_eq!(job.file.mime_type, "text/plain");
        assert_eq!(job.source_url.as_deref(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn url_ingest_classifies_by_content_not_extension() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/report.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(png(6, 4).to_vec()),
            )
            .mount(&server)
            .await;

        let engine = engine();
        let url = format!("{}/files/report.pdf", server.uri());
        let job = ingest_and_wait(&engine, IngestSource::Url(url)).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.file.original_name, "report.pdf");
        assert_eq!(job.file.file_type.category, FileCategory::Image);
        assert_eq!(job.file.mime_type, "image/png");
        let metadata = job.result.unwrap().metadata.unwrap();
        assert_eq!((metadata.width, metadata.height), (Some(6), Some(4)));
    }

    #[tokio::test]
    async fn resize_shrinks_in_place() {
        let engine = engine();
        let job = ingest_and_wait(&engine, upload("photo.png", png(40, 20))).await;

        let resized = engine
            .apply(
                job.id,
                Operation::Resize {
                    max_width: 10,
                    max_height: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(resized.status, JobStatus::Completed);
        assert_eq!(resized.file.original_name, "photo.png");
        assert_eq!(resized.file.mime_type, "image/png");
        let metadata = resized.result.unwrap().metadata.unwrap();
        assert_eq!((metadata.width, metadata.height), (Some(10), Some(5)));

        let events = engine.events().recent_events(20);
        assert!(events
            .iter()
            .any(|e| matches!(e.payload, EventPayload::ConversionCompleted { ref format, .. } if format == "resize")));
    }

    #[tokio::test]
    async fn compress_reclassifies_the_output() {
        let engine = engine();
        let job = ingest_and_wait(&engine, upload("photo.png", png(8, 8))).await;

        let compressed = engine
            .apply(job.id, Operation::Compress { quality: Some(50) })
            .await
            .unwrap();
        assert_eq!(compressed.file.mime_type, "image/jpeg");
        assert_eq!(compressed.file.original_name, "photo.jpg");
        assert_eq!(compressed.result.unwrap().mime_type, "image/jpeg");
        let options = compressed.manipulation_options.unwrap();
        assert!(!options.formats().contains(&"jpeg"));
    }

    #[tokio::test]
    async fn rejected_operations_leave_job_untouched() {
        let engine = engine();
        let job = ingest_and_wait(&engine, upload("photo.png", png(4, 4))).await;

        let err = engine.apply(job.id, Operation::ExtractAudio).await.unwrap_err();
        assert_eq!(err.http_status(), 422);
        let err = engine
            .apply(job.id, Operation::Rotate { angle: 45 })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 422);
        let err = engine
            .apply(
                job.id,
                Operation::Resize {
                    max_width: 0,
                    max_height: 4,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);

        let after = engine.get_job(job.id).unwrap();
        assert_eq!(after.status, JobStatus::Completed);
        assert_eq!(after.file.buffer, job.file.buffer);
        assert_eq!(after.updated_at, job.updated_at);
    }

    #[tokio::test]
    async fn avif_output_cannot_be_converted_again() {
        let engine = engine();
        let job = ingest_and_wait(&engine, upload("photo.png", png(10, 10))).await;

        let avif = engine.convert(job.id, "avif").await.unwrap();
        assert_eq!(avif.status, JobStatus::Completed);
        assert_eq!(avif.file.mime_type, "image/avif");
        assert!(avif.manipulation_options.unwrap().conversions.is_empty());

        let err = engine.convert(job.id, "png").await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        let after = engine.get_job(job.id).unwrap();
        assert_eq!(after.status, JobStatus::Completed);
        assert_eq!(after.file.buffer, avif.file.buffer);

        let reingested = ingest_and_wait(&engine, upload("photo.avif", avif.file.buffer.clone())).await;
        assert_eq!(reingested.status, JobStatus::Completed);
        assert_eq!(reingested.file.mime_type, "image/avif");
        assert!(reingested.error.is_none());
        let result = reingested.result.unwrap();
        assert_eq!(result.size, avif.file.size);
        assert!(result.metadata.is_none());
    }

    #[test]
    fn jpeg_spellings_share_an_extension() {
        assert!(same_extension("jpeg", "JPG"));
        assert!(!same_extension("png", "jpg"));
    }

    #[tokio::test]
    async fn youtube_redownload_needs_a_youtube_name() {
        let engine = engine();
        let job = ingest_and_wait(&engine, upload("photo.png", png(2, 2))).await;

        let err = engine.redownload_youtube(job.id, "720p").await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m == "Could not extract video ID"));

        let err = engine.redownload_youtube(job.id, "8k").await.unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn converted_type_falls_back_to_target() {
        let ft = converted_file_type(b"no newline", "txt", "text/plain");
        assert_eq!(ft.category, FileCategory::Document);
        assert_eq!(ft.extension, "txt");
    }
}
