//! Chunk-oriented step: read, process, buffer, flush until exhaustion.

use std::num::NonZeroUsize;
use std::time::Instant;

use batchwise_types::error::BatchError;
use batchwise_types::state::{StepName, StepStatus};
use chrono::Utc;

use crate::chunk::{flush_chunk, ChunkBuffer};
use crate::item::{ItemProcessor, ItemReader, ItemWriter};
use crate::result::{StepCounts, StepExecution};
use crate::retry::{ChunkRetryState, RetryDecision, RetryPolicy};

/// A unit of work a [`Job`](crate::job::Job) runs in sequence.
///
/// Object safe, so a job can hold steps with different item types.
pub trait Step: Send {
    fn name(&self) -> &StepName;

    /// Run to exhaustion or to the first fatal error.
    fn execute(&mut self) -> StepExecution;
}

impl<S: Step + ?Sized> Step for Box<S> {
    fn name(&self) -> &StepName {
        (**self).name()
    }

    fn execute(&mut self) -> StepExecution {
        (**self).execute()
    }
}

/// Step reading `I` items, processing them into `O`, and writing `O`
/// chunks of at most `chunk_size` items.
pub struct ChunkStep<I, O> {
    name: StepName,
    chunk_size: NonZeroUsize,
    reader: Box<dyn ItemReader<I>>,
    processor: Box<dyn ItemProcessor<I, O>>,
    writer: Box<dyn ItemWriter<O>>,
    policy: RetryPolicy,
}

impl<I, O> std::fmt::Debug for ChunkStep<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStep")
            .field("name", &self.name)
            .field("chunk_size", &self.chunk_size)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<I, O> ChunkStep<I, O> {
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.get()
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn run(&mut self, counts: &mut StepCounts) -> Result<(), BatchError> {
        self.reader.open()?;
        if let Err(err) = self.writer.open() {
            if let Err(close_err) = self.reader.close() {
                tracing::warn!(step = %self.name, error = %close_err, "Reader close failed");
            }
            return Err(err);
        }

        let outcome = self.run_chunks(counts);
        // Both are closed even after a failure; the first error wins.
        let reader_closed = self.reader.close();
        let writer_closed = self.writer.close();
        outcome.and(reader_closed).and(writer_closed)
    }

    fn run_chunks(&mut self, counts: &mut StepCounts) -> Result<(), BatchError> {
        let mut buffer = ChunkBuffer::new(self.chunk_size);
        let mut retry = ChunkRetryState::new();
        loop {
            retry.reset();
            let exhausted = self.fill_chunk(&mut buffer, &mut retry, counts)?;
            flush_chunk(
                &self.name,
                self.writer.as_mut(),
                &self.policy,
                &mut retry,
                &mut buffer,
                counts,
            )?;
            if exhausted {
                return Ok(());
            }
        }
    }

    /// Fill `buffer` until it is full or the reader is exhausted.
    /// Returns `true` on exhaustion.
    fn fill_chunk(
        &mut self,
        buffer: &mut ChunkBuffer<O>,
        retry: &mut ChunkRetryState,
        counts: &mut StepCounts,
    ) -> Result<bool, BatchError> {
        while !buffer.is_full() {
            let Some(input) = self.read_item(retry, counts)? else {
                return Ok(true);
            };
            if let Some(output) = self.process_item(&input, retry, counts)? {
                buffer.push(output);
            }
        }
        Ok(false)
    }

    fn read_item(
        &mut self,
        retry: &mut ChunkRetryState,
        counts: &mut StepCounts,
    ) -> Result<Option<I>, BatchError> {
        loop {
            match self.reader.read() {
                Ok(item) => {
                    if item.is_some() {
                        counts.read_count += 1;
                    }
                    return Ok(item);
                }
                Err(err) => {
                    let skipped = self.absorb(retry, err, counts)?;
                    if skipped {
                        self.reader.discard_failed();
                    }
                }
            }
        }
    }

    /// `Ok(None)` when the item was skipped.
    fn process_item(
        &self,
        input: &I,
        retry: &mut ChunkRetryState,
        counts: &mut StepCounts,
    ) -> Result<Option<O>, BatchError> {
        loop {
            counts.process_count += 1;
            match self.processor.process(input) {
                Ok(output) => return Ok(Some(output)),
                Err(err) => {
                    if self.absorb(retry, err, counts)? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Offer an item-level error to the retry policy. Returns `true` when
    /// the item is skipped, `false` when it should be re-attempted.
    fn absorb(
        &self,
        retry: &mut ChunkRetryState,
        err: BatchError,
        counts: &mut StepCounts,
    ) -> Result<bool, BatchError> {
        let kind = err.kind;
        let code = err.code.clone();
        match retry.on_error(&self.policy, err) {
            RetryDecision::Fail(err) => Err(err),
            RetryDecision::Skip { attempt } => {
                counts.skip_count += 1;
                tracing::warn!(
                    step = %self.name,
                    attempt,
                    retry_limit = self.policy.retry_limit(),
                    kind = %kind,
                    code = %code,
                    "Item failed, skipping"
                );
                Ok(true)
            }
            RetryDecision::Retry { attempt, delay } => {
                counts.retry_count += 1;
                #[allow(clippy::cast_possible_truncation)]
                let delay_ms = delay.as_millis() as u64;
                tracing::warn!(
                    step = %self.name,
                    attempt,
                    retry_limit = self.policy.retry_limit(),
                    delay_ms,
                    kind = %kind,
                    code = %code,
                    "Item failed, retrying"
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                Ok(false)
            }
        }
    }
}

impl<I: 'static, O: 'static> Step for ChunkStep<I, O> {
    fn name(&self) -> &StepName {
        &self.name
    }

    fn execute(&mut self) -> StepExecution {
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(
            step = %self.name,
            chunk_size = self.chunk_size.get(),
            retry_limit = self.policy.retry_limit(),
            "Starting step"
        );

        let mut counts = StepCounts::default();
        let outcome = self.run(&mut counts);
        let duration_secs = start.elapsed().as_secs_f64();

        let (status, error) = match outcome {
            Ok(()) => {
                tracing::info!(
                    step = %self.name,
                    read = counts.read_count,
                    written = counts.write_count,
                    chunks = counts.chunk_count,
                    retries = counts.retry_count,
                    skipped = counts.skip_count,
                    duration_secs,
                    "Step completed"
                );
                (StepStatus::Completed, None)
            }
            Err(err) => {
                tracing::error!(
                    step = %self.name,
                    kind = %err.kind,
                    code = %err.code,
                    read = counts.read_count,
                    written = counts.write_count,
                    "Step failed: {}",
                    err.message
                );
                (StepStatus::Failed, Some(err))
            }
        };

        StepExecution {
            step: self.name.clone(),
            status,
            counts,
            error,
            started_at,
            duration_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`ChunkStep`] from already-constructed components.
pub struct StepBuilder<I, O> {
    name: String,
    chunk_size: usize,
    reader: Option<Box<dyn ItemReader<I>>>,
    processor: Option<Box<dyn ItemProcessor<I, O>>>,
    writer: Option<Box<dyn ItemWriter<O>>>,
    policy: RetryPolicy,
}

impl<I: 'static, O: 'static> StepBuilder<I, O> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunk_size: 0,
            reader: None,
            processor: None,
            writer: None,
            policy: RetryPolicy::none(),
        }
    }

    #[must_use]
    pub fn chunk(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn reader(mut self, reader: impl ItemReader<I> + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    #[must_use]
    pub fn processor(mut self, processor: impl ItemProcessor<I, O> + 'static) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    #[must_use]
    pub fn writer(mut self, writer: impl ItemWriter<O> + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    #[must_use]
    pub fn fault_tolerant(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// # Errors
    ///
    /// Returns a `configuration` error listing every missing or invalid part.
    pub fn build(self) -> Result<ChunkStep<I, O>, BatchError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("step name must not be empty".to_string());
        }
        let chunk_size = NonZeroUsize::new(self.chunk_size);
        if chunk_size.is_none() {
            errors.push("chunk size must be at least 1".to_string());
        }
        if self.reader.is_none() {
            errors.push("reader is required".to_string());
        }
        if self.processor.is_none() {
            errors.push("processor is required".to_string());
        }
        if self.writer.is_none() {
            errors.push("writer is required".to_string());
        }

        match (chunk_size, self.reader, self.processor, self.writer) {
            (Some(chunk_size), Some(reader), Some(processor), Some(writer))
                if errors.is_empty() =>
            {
                Ok(ChunkStep {
                    name: StepName::new(self.name),
                    chunk_size,
                    reader,
                    processor,
                    writer,
                    policy: self.policy,
                })
            }
            _ => Err(BatchError::configuration(
                "INVALID_STEP",
                format!("step '{}': {}", self.name, errors.join("; ")),
            )),
        }
    }
}
