//! Run repository trait definition.
//!
//! [`RunRepository`] defines the bookkeeping contract for job runs: issuing
//! run identifiers and recording each run's terminal outcome. Model types
//! live in [`batchwise_types::state`].

use batchwise_types::state::{JobName, RunId, RunStats, RunStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error;

/// One job invocation as seen by the repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub job: JobName,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: RunStats,
}

/// Bookkeeping contract for job runs.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn RunRepository>`.
/// Run identifiers have no effect on processing; they only label runs.
pub trait RunRepository: Send + Sync {
    /// Begin a new run of `job`, returning a fresh identifier greater than
    /// every identifier previously issued by this repository.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn start_run(&self, job: &JobName) -> error::Result<RunId>;

    /// Finalize a run with its terminal status and aggregate stats.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownRun`](crate::error::StateError::UnknownRun)
    /// for an identifier this repository never issued, and
    /// [`StateError::AlreadyComplete`](crate::error::StateError::AlreadyComplete)
    /// when the run was already finalized.
    fn complete_run(&self, run_id: RunId, status: RunStatus, stats: &RunStats)
        -> error::Result<()>;

    /// Look up a run by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_run(&self, run_id: RunId) -> error::Result<Option<RunRecord>>;

    /// Most recent run of `job`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn last_run(&self, job: &JobName) -> error::Result<Option<RunRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn RunRepository`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn RunRepository) {}
    }
}
