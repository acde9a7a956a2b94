//! # ff-jobs
//!
//! Job records and the lifecycle engine.
//!
//! [`JobStore`] owns the records and applies every state transition under
//! the record's lock. [`JobEngine`] drives ingest, background processing,
//! conversion and download on top of the store, the media adapters and
//! the downloader registry.

pub mod engine;
pub mod model;
pub mod store;

pub use engine::{Converted, IngestSource, JobEngine, Submitted};
pub use model::{Job, JobFile, JobResult, JobStatus};
pub use store::JobStore;
