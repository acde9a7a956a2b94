//! Route handlers, grouped by API area.

pub mod admin;
pub mod events;
pub mod media;
pub mod upload;

use ff_core::{Error, JobId};

/// Parse a job id path segment. Ids that cannot exist are reported as
/// missing jobs.
pub(crate) fn parse_job_id(raw: &str) -> Result<JobId, Error> {
    raw.parse().map_err(|_| Error::not_found("job", raw))
}
