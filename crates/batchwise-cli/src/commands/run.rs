use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use batchwise_engine::config::{parser, validator};
use batchwise_engine::orchestrator;
use batchwise_engine::JobExecution;
use batchwise_state::{InMemoryRunRepository, RunRepository};

use crate::wiring;

/// Execute the `run` command: parse, validate, wire, and run a job.
/// Exits with a failure code when the job fails.
pub async fn execute(job_path: &Path, json: bool) -> Result<ExitCode> {
    // 1. Parse job YAML
    let config = parser::parse_job(job_path)
        .with_context(|| format!("Failed to parse job: {}", job_path.display()))?;

    // 2. Validate
    validator::validate_job(&config)?;

    tracing::info!(
        job = config.job,
        steps = config.steps.len(),
        "Job validated"
    );

    // 3. Wire and run
    let job = wiring::build_job(&config)?;
    let runs: Arc<dyn RunRepository> = Arc::new(InMemoryRunRepository::new());
    let execution = orchestrator::run_job(job, runs).await?;

    print_summary(&execution);
    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    }

    if execution.is_completed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_summary(execution: &JobExecution) {
    if execution.is_completed() {
        println!(
            "Job '{}' completed successfully (run {}).",
            execution.job, execution.run_id
        );
    } else {
        println!("Job '{}' failed (run {}).", execution.job, execution.run_id);
    }
    println!("  Records read:    {}", execution.records_read());
    println!("  Records written: {}", execution.records_written());
    println!("  Duration:        {:.2}s", execution.duration_secs);

    for step in &execution.steps {
        let c = &step.counts;
        println!(
            "  {:12} {:9} read {}, written {}, chunks {}",
            format!("{}:", step.step),
            step.status.as_str(),
            c.read_count,
            c.write_count,
            c.chunk_count,
        );
        if c.retry_count > 0 || c.skip_count > 0 {
            println!("    Retries: {}, skipped: {}", c.retry_count, c.skip_count);
        }
    }

    if let Some(err) = &execution.error {
        let step = execution
            .failed_step
            .as_ref()
            .map_or("?", |s| s.as_str());
        println!("  Error in '{step}': {err}");
    }
}
