//! Step and job execution results.

use batchwise_types::error::BatchError;
use batchwise_types::state::{JobName, RunId, RunStats, RunStatus, StepName, StepStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Record and attempt counts for one step execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepCounts {
    /// Items successfully read.
    pub read_count: u64,
    /// Processor invocations, retries included.
    pub process_count: u64,
    /// Items accepted by the writer.
    pub write_count: u64,
    /// Writer calls, retries included.
    pub write_attempts: u64,
    /// Chunks flushed.
    pub chunk_count: u64,
    /// Items dropped by a skipping retry policy.
    pub skip_count: u64,
    /// Failures absorbed by the retry policy.
    pub retry_count: u64,
}

/// Outcome of running one step to exhaustion or failure.
#[derive(Debug, Clone, Serialize)]
pub struct StepExecution {
    pub step: StepName,
    pub status: StepStatus,
    pub counts: StepCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl StepExecution {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Outcome of one job run.
///
/// `steps` holds only the steps that ran; steps after a failure are absent.
#[derive(Debug, Clone, Serialize)]
pub struct JobExecution {
    pub run_id: RunId,
    pub job: JobName,
    pub status: RunStatus,
    pub steps: Vec<StepExecution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<StepName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl JobExecution {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    #[must_use]
    pub fn step(&self, name: &str) -> Option<&StepExecution> {
        self.steps.iter().find(|s| s.step.as_str() == name)
    }

    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.steps.iter().map(|s| s.counts.read_count).sum()
    }

    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.steps.iter().map(|s| s.counts.write_count).sum()
    }

    /// Aggregate stats recorded with the run.
    #[must_use]
    pub fn run_stats(&self) -> RunStats {
        let steps_completed = self.steps.iter().filter(|s| s.is_completed()).count();
        RunStats {
            steps_completed: u32::try_from(steps_completed).unwrap_or(u32::MAX),
            records_read: self.records_read(),
            records_written: self.records_written(),
            failed_step: self.failed_step.clone(),
            error_message: self.error.as_ref().map(ToString::to_string),
        }
    }
}
