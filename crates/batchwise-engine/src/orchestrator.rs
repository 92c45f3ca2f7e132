//! Job orchestrator: issues a run id, runs the job, records the outcome.

use std::sync::Arc;

use batchwise_state::RunRepository;
use batchwise_types::state::{RunStats, RunStatus};

use crate::error::EngineError;
use crate::job::Job;
use crate::result::JobExecution;

/// Run `job` once under a fresh run identifier.
///
/// Steps perform blocking file I/O, so the job runs on a blocking worker.
/// A failed job is still `Ok`: inspect [`JobExecution::status`].
///
/// # Errors
///
/// Returns `EngineError::State` when the run repository fails and
/// `EngineError::Infrastructure` when the worker running the job panics.
/// A panicked run is recorded as failed before the error is returned.
pub async fn run_job(
    mut job: Job,
    runs: Arc<dyn RunRepository>,
) -> Result<JobExecution, EngineError> {
    let job_name = job.name().clone();
    let run_id = runs.start_run(&job_name)?;
    tracing::info!(
        job = %job_name,
        run_id = %run_id,
        steps = job.len(),
        "Starting job run"
    );

    let execution = match tokio::task::spawn_blocking(move || job.execute(run_id)).await {
        Ok(execution) => execution,
        Err(e) => {
            let message = format!("job task panicked: {e}");
            tracing::error!(job = %job_name, run_id = %run_id, "{message}");
            let stats = RunStats {
                error_message: Some(message.clone()),
                ..RunStats::default()
            };
            runs.complete_run(run_id, RunStatus::Failed, &stats)?;
            return Err(EngineError::Infrastructure(anyhow::anyhow!(message)));
        }
    };

    runs.complete_run(run_id, execution.status, &execution.run_stats())?;

    if execution.is_completed() {
        tracing::info!(
            job = %job_name,
            run_id = %run_id,
            records_read = execution.records_read(),
            records_written = execution.records_written(),
            duration_secs = execution.duration_secs,
            "Job completed"
        );
    } else {
        tracing::error!(
            job = %job_name,
            run_id = %run_id,
            failed_step = execution.failed_step.as_ref().map(|s| s.as_str()),
            error = execution.error.as_ref().map(ToString::to_string).as_deref(),
            "Job failed"
        );
    }
    Ok(execution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{IterReader, VecWriter};
    use crate::job::JobBuilder;
    use crate::result::StepExecution;
    use crate::step::{Step, StepBuilder};
    use batchwise_state::InMemoryRunRepository;
    use batchwise_types::error::BatchError;
    use batchwise_types::state::{JobName, StepName};

    fn job() -> Job {
        let step = StepBuilder::<u8, u8>::new("only")
            .chunk(10)
            .reader(IterReader::new(vec![1u8, 2]))
            .processor(|n: &u8| -> Result<u8, BatchError> { Ok(*n) })
            .writer(VecWriter::new())
            .build()
            .unwrap();
        JobBuilder::new("job").start(step).build().unwrap()
    }

    struct Panicking(StepName);

    impl Step for Panicking {
        fn name(&self) -> &StepName {
            &self.0
        }

        fn execute(&mut self) -> StepExecution {
            panic!("step blew up");
        }
    }

    #[tokio::test]
    async fn records_completed_run() {
        let runs = Arc::new(InMemoryRunRepository::new());
        let execution = run_job(job(), runs.clone()).await.unwrap();
        assert!(execution.is_completed());

        let record = runs.get_run(execution.run_id).unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.stats.records_written, 2);
        assert_eq!(record.stats.steps_completed, 1);
        assert!(record.finished_at.is_some());
    }

    #[tokio::test]
    async fn each_run_gets_a_larger_id() {
        let runs: Arc<dyn RunRepository> = Arc::new(InMemoryRunRepository::new());
        let first = run_job(job(), runs.clone()).await.unwrap();
        let second = run_job(job(), runs.clone()).await.unwrap();
        assert!(second.run_id > first.run_id);
        let last = runs.last_run(&JobName::new("job")).unwrap().unwrap();
        assert_eq!(last.run_id, second.run_id);
    }

    #[tokio::test]
    async fn panicked_job_is_recorded_as_failed() {
        let runs = Arc::new(InMemoryRunRepository::new());
        let job = JobBuilder::new("job")
            .start(Panicking(StepName::new("boom")))
            .build()
            .unwrap();

        let err = run_job(job, runs.clone()).await.unwrap_err();
        assert!(matches!(err, EngineError::Infrastructure(_)));
        let record = runs.last_run(&JobName::new("job")).unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record
            .stats
            .error_message
            .unwrap()
            .contains("panicked"));
    }
}
