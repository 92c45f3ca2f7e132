use std::path::Path;

use anyhow::{Context, Result};

use batchwise_engine::config::{parser, validator};

use crate::wiring;

/// Execute the `check` command: validate a job and build its steps.
/// Nothing is opened, read, or written.
pub fn execute(job_path: &Path) -> Result<()> {
    // 1. Parse job YAML
    let config = parser::parse_job(job_path)
        .with_context(|| format!("Failed to parse job: {}", job_path.display()))?;

    // 2. Validate job structure
    validator::validate_job(&config)?;
    println!("Job structure:     OK");

    // 3. Build every step
    let mut failures = 0usize;
    for step in &config.steps {
        let label = format!("Step '{}':", step.name);
        match wiring::build_step(step) {
            Ok(_) => println!("{label:18} OK"),
            Err(e) => {
                failures += 1;
                println!("{label:18} FAILED");
                println!("  {e}");
            }
        }
    }

    if failures == 0 {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("{failures} step(s) failed to build")
    }
}
