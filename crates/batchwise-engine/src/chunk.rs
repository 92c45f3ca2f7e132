//! Chunk buffer and flush controller.
//!
//! Processed items accumulate in a [`ChunkBuffer`] until it holds
//! `chunk_size` items or the source is exhausted; the whole buffer is then
//! handed to the writer in a single call. The writer never sees a partial
//! or empty chunk.

use std::num::NonZeroUsize;

use batchwise_types::error::BatchError;
use batchwise_types::state::StepName;

use crate::item::ItemWriter;
use crate::result::StepCounts;
use crate::retry::{ChunkRetryState, RetryDecision, RetryPolicy};

/// Flush-controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Accepting processed items.
    Filling,
    /// Contents handed to the writer; may be re-handed on retry.
    Flushing,
    /// Writer accepted the chunk; buffer cleared.
    Flushed,
}

/// Ordered, bounded buffer of processed items.
#[derive(Debug)]
pub struct ChunkBuffer<T> {
    items: Vec<T>,
    chunk_size: NonZeroUsize,
    state: ChunkState,
}

impl<T> ChunkBuffer<T> {
    #[must_use]
    pub fn new(chunk_size: NonZeroUsize) -> Self {
        Self {
            items: Vec::with_capacity(chunk_size.get()),
            chunk_size,
            state: ChunkState::Filling,
        }
    }

    /// Append an item. Leaves the `Flushed` state.
    pub fn push(&mut self, item: T) {
        debug_assert!(!self.is_full(), "push into a full chunk");
        self.state = ChunkState::Filling;
        self.items.push(item);
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.chunk_size.get()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Enter `Flushing` and expose the full ordered contents.
    pub fn begin_flush(&mut self) -> &[T] {
        self.state = ChunkState::Flushing;
        &self.items
    }

    /// Clear the buffer after the writer accepted it.
    pub fn finish_flush(&mut self) {
        self.items.clear();
        self.state = ChunkState::Flushed;
    }
}

/// Hand the buffered chunk to `writer`, re-flushing the same chunk while
/// the retry policy allows it.
///
/// # Errors
///
/// Returns the terminal writer error once the policy rejects it.
pub(crate) fn flush_chunk<T>(
    step: &StepName,
    writer: &mut dyn ItemWriter<T>,
    policy: &RetryPolicy,
    retry: &mut ChunkRetryState,
    buffer: &mut ChunkBuffer<T>,
    counts: &mut StepCounts,
) -> Result<(), BatchError> {
    if buffer.is_empty() {
        return Ok(());
    }

    let chunk = buffer.begin_flush();
    let size = chunk.len();
    loop {
        counts.write_attempts += 1;
        match writer.write(chunk) {
            Ok(()) => break,
            Err(err) => {
                let kind = err.kind;
                let code = err.code.clone();
                let (attempt, delay) = match retry.on_error(policy, err) {
                    RetryDecision::Fail(err) => return Err(err),
                    RetryDecision::Retry { attempt, delay } => (attempt, delay),
                    // A flush has no single item to drop: the whole chunk is
                    // re-flushed, within the same budget.
                    RetryDecision::Skip { attempt } => (attempt, policy.backoff().delay(attempt)),
                };
                counts.retry_count += 1;
                tracing::warn!(
                    step = %step,
                    attempt,
                    retry_limit = policy.retry_limit(),
                    kind = %kind,
                    code = %code,
                    chunk_size = size,
                    "Chunk flush failed, retrying"
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }
    }

    buffer.finish_flush();
    counts.write_count += size as u64;
    counts.chunk_count += 1;
    tracing::debug!(
        step = %step,
        chunk = counts.chunk_count,
        records = size,
        "Chunk flushed"
    );
    Ok(())
}
