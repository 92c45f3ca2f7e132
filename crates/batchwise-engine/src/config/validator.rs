//! Semantic validation for parsed job configuration values.

use std::collections::HashSet;

use batchwise_types::error::{BatchError, ErrorKind};

use crate::config::types::{FaultToleranceConfig, JobConfig};

fn validate_fault_tolerance(ft: &FaultToleranceConfig, context: &str, errors: &mut Vec<String>) {
    if ft.retry_on.contains(&ErrorKind::Configuration) {
        errors.push(format!("{context}: 'configuration' errors cannot be retried"));
    }
    if ft.retry_limit > 0 && ft.retry_on.is_empty() {
        errors.push(format!(
            "{context}: retry_limit {} has no effect without retry_on",
            ft.retry_limit
        ));
    }
    if let Some(max) = ft.max_backoff_ms {
        if max < ft.backoff_ms {
            errors.push(format!(
                "{context}: max_backoff_ms ({max}) must be >= backoff_ms ({})",
                ft.backoff_ms
            ));
        }
    }
}

/// Validate a parsed job configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns a `configuration` error listing every problem found.
pub fn validate_job(config: &JobConfig) -> Result<(), BatchError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported job version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.job.trim().is_empty() {
        errors.push("Job name must not be empty".to_string());
    }

    if config.steps.is_empty() {
        errors.push("Job must define at least one step".to_string());
    }

    let mut seen = HashSet::new();
    for (i, step) in config.steps.iter().enumerate() {
        let context = if step.name.trim().is_empty() {
            errors.push(format!("Step {i} has an empty name"));
            format!("steps[{i}]")
        } else {
            if !seen.insert(step.name.as_str()) {
                errors.push(format!("Duplicate step name '{}'", step.name));
            }
            format!("Step '{}'", step.name)
        };

        if step.chunk_size == 0 {
            errors.push(format!("{context}: chunk_size must be at least 1"));
        }
        for (role, component) in [
            ("reader", &step.reader),
            ("processor", &step.processor),
            ("writer", &step.writer),
        ] {
            if component.use_ref.trim().is_empty() {
                errors.push(format!("{context}: {role} reference (use) must not be empty"));
            }
        }
        if let Some(ft) = &step.fault_tolerance {
            validate_fault_tolerance(ft, &context, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(BatchError::configuration(
            "INVALID_JOB_CONFIG",
            format!("Job validation failed:\n  - {}", errors.join("\n  - ")),
        ))
    }
}
