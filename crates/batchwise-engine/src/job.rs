//! Jobs: ordered steps run to a single outcome.

use std::collections::HashSet;
use std::time::Instant;

use batchwise_types::error::BatchError;
use batchwise_types::state::{JobName, RunId, RunStatus, StepName};
use chrono::Utc;

use crate::result::JobExecution;
use crate::step::Step;

/// Ordered sequence of steps with unique names.
pub struct Job {
    name: JobName,
    steps: Vec<Box<dyn Step>>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

impl Job {
    #[must_use]
    pub fn name(&self) -> &JobName {
        &self.name
    }

    #[must_use]
    pub fn step_names(&self) -> Vec<&StepName> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in declared order, halting at the first failed step.
    pub fn execute(&mut self, run_id: RunId) -> JobExecution {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut steps = Vec::with_capacity(self.steps.len());
        let mut failed_step = None;
        let mut error = None;

        for step in &mut self.steps {
            let execution = step.execute();
            let completed = execution.is_completed();
            if !completed {
                failed_step = Some(execution.step.clone());
                error.clone_from(&execution.error);
            }
            steps.push(execution);
            if !completed {
                break;
            }
        }

        let status = if failed_step.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        JobExecution {
            run_id,
            job: self.name.clone(),
            status,
            steps,
            failed_step,
            error,
            started_at,
            duration_secs: start.elapsed().as_secs_f64(),
        }
    }
}

/// Assembles a [`Job`] from built steps.
///
/// ```ignore
/// let job = JobBuilder::new("import")
///     .start(step1)
///     .next(step2)
///     .build()?;
/// ```
pub struct JobBuilder {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl JobBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// First step. Equivalent to [`next`](Self::next) on an empty builder.
    #[must_use]
    pub fn start(self, step: impl Step + 'static) -> Self {
        self.next(step)
    }

    #[must_use]
    pub fn next(self, step: impl Step + 'static) -> Self {
        self.step(Box::new(step))
    }

    /// Append an already boxed step.
    #[must_use]
    pub fn step(mut self, step: Box<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// # Errors
    ///
    /// Returns a `configuration` error for an empty job name, a job without
    /// steps, or duplicate step names.
    pub fn build(self) -> Result<Job, BatchError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("job name must not be empty".to_string());
        }
        if self.steps.is_empty() {
            errors.push("job must have at least one step".to_string());
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name().as_str()) {
                errors.push(format!("duplicate step name '{}'", step.name()));
            }
        }

        if !errors.is_empty() {
            return Err(BatchError::configuration(
                "INVALID_JOB",
                format!("job '{}': {}", self.name, errors.join("; ")),
            ));
        }
        Ok(Job {
            name: JobName::new(self.name),
            steps: self.steps,
        })
    }
}
