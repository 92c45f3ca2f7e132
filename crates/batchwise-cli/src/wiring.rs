//! Builds typed steps from a job definition.
//!
//! The processor reference fixes a step's item types; readers and writers
//! are then built for those types from their own references.

use batchwise_engine::config::{JobConfig, StepConfig};
use batchwise_engine::item::ItemProcessor;
use batchwise_engine::job::{Job, JobBuilder};
use batchwise_engine::step::{Step, StepBuilder};
use batchwise_file::{build_reader, build_writer};
use batchwise_types::error::BatchError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::processors::{
    ProfileAccountProcessor, UserProfileProcessor, PROFILE_ACCOUNT, USER_PROFILE,
};
use crate::schema::{Account, Profile, User};

/// # Errors
///
/// Returns a `configuration` error for any step that cannot be built, or
/// for a job the job builder rejects.
pub fn build_job(config: &JobConfig) -> Result<Job, BatchError> {
    let mut builder = JobBuilder::new(&config.job);
    for step in &config.steps {
        builder = builder.step(build_step(step)?);
    }
    builder.build()
}

/// # Errors
///
/// Returns a `configuration` error for an unknown processor or an invalid
/// reader, writer, or chunk setting.
pub fn build_step(config: &StepConfig) -> Result<Box<dyn Step>, BatchError> {
    match config.processor.use_ref.as_str() {
        USER_PROFILE => {
            let processor = UserProfileProcessor::from_config(&config.processor)?;
            typed_step::<User, Profile>(config, processor)
        }
        PROFILE_ACCOUNT => typed_step::<Profile, Account>(config, ProfileAccountProcessor),
        other => Err(BatchError::configuration(
            "UNKNOWN_PROCESSOR",
            format!(
                "step '{}': unknown processor '{other}', expected '{USER_PROFILE}' or '{PROFILE_ACCOUNT}'",
                config.name
            ),
        )),
    }
}

fn typed_step<I, O>(
    config: &StepConfig,
    processor: impl ItemProcessor<I, O> + 'static,
) -> Result<Box<dyn Step>, BatchError>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    let step = StepBuilder::new(&config.name)
        .chunk(config.chunk_size)
        .reader(build_reader::<I>(&config.reader)?)
        .processor(processor)
        .writer(build_writer::<O>(&config.writer)?)
        .fault_tolerant(config.retry_policy())
        .build()?;
    tracing::debug!(
        step = %config.name,
        reader = %config.reader.use_ref,
        processor = %config.processor.use_ref,
        writer = %config.writer.use_ref,
        chunk_size = config.chunk_size,
        "Built step"
    );
    Ok(Box::new(step))
}
