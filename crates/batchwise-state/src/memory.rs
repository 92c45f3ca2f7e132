//! In-memory implementation of [`RunRepository`].
//!
//! Uses a single `Mutex` for thread safety. History lives as long as the
//! repository does.

use std::sync::{Mutex, MutexGuard};

use batchwise_types::state::{JobName, RunId, RunStats, RunStatus};
use chrono::Utc;

use crate::backend::{RunRecord, RunRepository};
use crate::error::{self, StateError};

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    runs: Vec<RunRecord>,
}

/// Process-local run repository.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    inner: Mutex<Inner>,
}

impl InMemoryRunRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering after `last_id`, so the first run gets `last_id + 1`.
    #[must_use]
    pub fn starting_after(last_id: i64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                last_id,
                runs: Vec::new(),
            }),
        }
    }

    /// All runs in start order.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the lock is poisoned.
    pub fn runs(&self) -> error::Result<Vec<RunRecord>> {
        Ok(self.lock()?.runs.clone())
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StateError::LockPoisoned)
    }
}

impl RunRepository for InMemoryRunRepository {
    fn start_run(&self, job: &JobName) -> error::Result<RunId> {
        let mut inner = self.lock()?;
        inner.last_id += 1;
        let run_id = RunId::new(inner.last_id);
        inner.runs.push(RunRecord {
            run_id,
            job: job.clone(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            stats: RunStats::default(),
        });
        Ok(run_id)
    }

    fn complete_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        stats: &RunStats,
    ) -> error::Result<()> {
        let mut inner = self.lock()?;
        let record = inner
            .runs
            .iter_mut()
            .find(|r| r.run_id == run_id)
            .ok_or(StateError::UnknownRun(run_id))?;
        if record.status.is_terminal() {
            return Err(StateError::AlreadyComplete(run_id));
        }
        record.status = status;
        record.finished_at = Some(Utc::now());
        record.stats = stats.clone();
        Ok(())
    }

    fn get_run(&self, run_id: RunId) -> error::Result<Option<RunRecord>> {
        let inner = self.lock()?;
        Ok(inner.runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    fn last_run(&self, job: &JobName) -> error::Result<Option<RunRecord>> {
        let inner = self.lock()?;
        Ok(inner.runs.iter().rev().find(|r| &r.job == job).cloned())
    }
}
