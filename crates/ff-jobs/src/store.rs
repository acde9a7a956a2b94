//! In-memory job store.
//!
//! Records live in a `DashMap`; each transition runs while holding the
//! record's shard lock, so checks and writes on one job never interleave.
//! The `processing` status doubles as the per-job mutation guard: only one
//! processing or conversion run can hold it.

use dashmap::DashMap;
use ff_core::{Error, JobId, JobIdSequence};
use ff_media::ManipulationOptions;

use crate::model::{Job, JobFile, JobResult, JobStatus};

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: DashMap<JobId, Job>,
    ids: JobIdSequence,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and store a `pending` job for `file`.
    pub fn create_job(&self, file: JobFile, source_url: Option<String>) -> Job {
        let id = self.ids.next_id();
        let job = Job::new(id, file, source_url);
        self.jobs.insert(id, job.clone());
        job
    }

    pub fn get_job(&self, id: JobId) -> Option<Job> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Run `f` against the job under its lock.
    fn update<R>(&self, id: JobId, f: impl FnOnce(&mut Job) -> ff_core::Result<R>) -> ff_core::Result<R> {
        let mut entry = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("job", id))?;
        f(entry.value_mut())
    }

    /// `pending -> processing` for the initial characterization.
    pub fn start_processing(&self, id: JobId, progress: u8) -> ff_core::Result<Job> {
        self.update(id, |job| {
            if job.status != JobStatus::Pending {
                return Err(Error::Conflict(format!(
                    "job {id} is {}, expected pending",
                    job.status
                )));
            }
            job.start(progress);
            Ok(job.clone())
        })
    }

    /// `completed|failed -> processing` for a conversion. Fails with
    /// `Conflict` when another run holds the job.
    pub fn begin_conversion(&self, id: JobId, progress: u8) -> ff_core::Result<Job> {
        self.update(id, |job| {
            if job.status.is_active() {
                return Err(Error::Conflict(format!("job {id} is {}", job.status)));
            }
            job.start(progress);
            Ok(job.clone())
        })
    }

    /// Raise the job's progress marker.
    pub fn set_progress(&self, id: JobId, progress: u8) -> ff_core::Result<()> {
        self.update(id, |job| {
            job.advance(progress);
            Ok(())
        })
    }

    /// Mark the job completed, swapping in `file` when a conversion
    /// produced a new payload.
    pub fn complete_job(
        &self,
        id: JobId,
        file: Option<JobFile>,
        result: JobResult,
        options: ManipulationOptions,
    ) -> ff_core::Result<Job> {
        self.update(id, |job| {
            if let Some(file) = file {
                job.file = file;
            }
            job.complete(result, options);
            Ok(job.clone())
        })
    }

    /// Mark the job failed; its current payload is retained.
    pub fn fail_job(&self, id: JobId, error: impl Into<String>) -> ff_core::Result<Job> {
        let error = error.into();
        self.update(id, |job| {
            job.fail(error);
            Ok(job.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ff_core::{FileCategory, FileType};

    fn file() -> JobFile {
        JobFile::new(
            "notes.txt",
            FileType {
                category: FileCategory::Document,
                mime_type: "text/plain".into(),
                extension: "txt".into(),
            },
            Bytes::from_static(b"hello\n"),
        )
    }

    fn result(job: &Job) -> JobResult {
        JobResult {
            url: job.download_url(),
            mime_type: job.file.mime_type.clone(),
            size: job.file.size,
            metadata: None,
        }
    }

    #[test]
    fn ids_are_sequential_strings() {
        let store = JobStore::new();
        let a = store.create_job(file(), None);
        let b = store.create_job(file(), None);
        assert_eq!(a.id.to_string(), "1");
        assert_eq!(b.id.to_string(), "2");
        assert!(store.get_job(a.id).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn processing_requires_pending() {
        let store = JobStore::new();
        let job = store.create_job(file(), None);
        store.start_processing(job.id, 10).unwrap();
        let err = store.start_processing(job.id, 10).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn conversion_is_guarded_by_status() {
        let store = JobStore::new();
        let job = store.create_job(file(), None);

        // Pending jobs cannot be converted yet.
        assert!(matches!(
            store.begin_conversion(job.id, 10),
            Err(Error::Conflict(_))
        ));

        let running = store.start_processing(job.id, 10).unwrap();
        store
            .complete_job(job.id, None, result(&running), ManipulationOptions::default())
            .unwrap();

        store.begin_conversion(job.id, 10).unwrap();
        assert!(matches!(
            store.begin_conversion(job.id, 10),
            Err(Error::Conflict(_))
        ));

        let failed = store.fail_job(job.id, "encoder crashed").unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.result.is_none());
        assert_eq!(&failed.file.buffer[..], b"hello\n");

        // A failed job may be converted again.
        assert!(store.begin_conversion(job.id, 10).is_ok());
    }

    #[test]
    fn completion_swaps_payload() {
        let store = JobStore::new();
        let job = store.create_job(file(), None);
        let running = store.start_processing(job.id, 10).unwrap();

        let mut converted = file();
        converted.original_name = "notes.pdf".into();
        let done = store
            .complete_job(
                job.id,
                Some(converted),
                result(&running),
                ManipulationOptions::default(),
            )
            .unwrap();
        assert_eq!(done.file.original_name, "notes.pdf");
        assert_eq!(done.progress, 100);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let store = JobStore::new();
        let id: JobId = "99".parse().unwrap();
        assert!(store.get_job(id).is_none());
        assert!(matches!(
            store.set_progress(id, 50),
            Err(Error::NotFound { .. })
        ));
    }
}
