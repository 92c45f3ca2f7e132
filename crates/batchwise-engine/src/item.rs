//! Item capability traits and in-memory implementations.
//!
//! A step is wired from three capabilities: an [`ItemReader`] producing a
//! lazy, finite sequence of items, an [`ItemProcessor`] mapping one input
//! to one output, and an [`ItemWriter`] accepting whole chunks. Concrete
//! record schemas implement these once per type and are selected when the
//! step is built.

use std::sync::{Arc, Mutex};

use batchwise_types::error::BatchError;
use batchwise_types::resource::Resource;

use crate::fault::FaultPlan;

/// Lazy, finite, non-restartable source of items.
///
/// When `read` fails with an item-level error the reader keeps the failed
/// raw item current, so the next `read` re-presents it. `discard_failed`
/// drops it so the next `read` advances past it.
pub trait ItemReader<T>: Send {
    /// Bind to the underlying input. Re-opening restarts from the beginning.
    ///
    /// # Errors
    ///
    /// Returns a `resource` error if the input cannot be opened.
    fn open(&mut self) -> Result<(), BatchError> {
        Ok(())
    }

    /// Next item, or `None` once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an item-level error (e.g. `parse`) for a malformed item or a
    /// `resource` error when the input cannot be read.
    fn read(&mut self) -> Result<Option<T>, BatchError>;

    /// Drop the item whose last `read` failed.
    fn discard_failed(&mut self) {}

    /// Release the underlying input.
    ///
    /// # Errors
    ///
    /// Returns a `resource` error if releasing the input fails.
    fn close(&mut self) -> Result<(), BatchError> {
        Ok(())
    }
}

/// Reader that can be re-bound to a different [`Resource`].
///
/// Binding resets the cursor and re-applies any header skipping.
pub trait ResourceItemReader<T>: ItemReader<T> {
    /// # Errors
    ///
    /// Returns a `resource` error if the resource cannot be opened.
    fn open_resource(&mut self, resource: &Resource) -> Result<(), BatchError>;
}

/// Single-input single-output transform.
///
/// Takes `&self`: a retry re-invokes `process` on the same input, so stages
/// whose output depends on hidden mutable state produce different results
/// on retry.
pub trait ItemProcessor<I, O>: Send {
    /// # Errors
    ///
    /// Returns a `processing` error for semantically invalid input.
    fn process(&self, item: &I) -> Result<O, BatchError>;
}

impl<I, O, F> ItemProcessor<I, O> for F
where
    F: Fn(&I) -> Result<O, BatchError> + Send,
{
    fn process(&self, item: &I) -> Result<O, BatchError> {
        self(item)
    }
}

/// Sink accepting one whole chunk per `write` call.
///
/// A successful `write` means every record of the chunk was accepted; a
/// failed one may be retried with the same chunk.
pub trait ItemWriter<T>: Send {
    /// # Errors
    ///
    /// Returns a `resource` error if the destination cannot be opened.
    fn open(&mut self) -> Result<(), BatchError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a `sink` error if the chunk could not be written.
    fn write(&mut self, chunk: &[T]) -> Result<(), BatchError>;

    /// # Errors
    ///
    /// Returns a `resource` error if finalizing the destination fails.
    fn close(&mut self) -> Result<(), BatchError> {
        Ok(())
    }
}

impl<T, R: ItemReader<T> + ?Sized> ItemReader<T> for Box<R> {
    fn open(&mut self) -> Result<(), BatchError> {
        (**self).open()
    }

    fn read(&mut self) -> Result<Option<T>, BatchError> {
        (**self).read()
    }

    fn discard_failed(&mut self) {
        (**self).discard_failed();
    }

    fn close(&mut self) -> Result<(), BatchError> {
        (**self).close()
    }
}

impl<T, R: ResourceItemReader<T> + ?Sized> ResourceItemReader<T> for Box<R> {
    fn open_resource(&mut self, resource: &Resource) -> Result<(), BatchError> {
        (**self).open_resource(resource)
    }
}

impl<T, W: ItemWriter<T> + ?Sized> ItemWriter<T> for Box<W> {
    fn open(&mut self) -> Result<(), BatchError> {
        (**self).open()
    }

    fn write(&mut self, chunk: &[T]) -> Result<(), BatchError> {
        (**self).write(chunk)
    }

    fn close(&mut self) -> Result<(), BatchError> {
        (**self).close()
    }
}

// ---------------------------------------------------------------------------
// In-memory reader
// ---------------------------------------------------------------------------

/// Reader over a fixed list of items or item failures.
///
/// A failure entry stays current until discarded, like a malformed line.
/// `open` rewinds to the first entry.
pub struct IterReader<T> {
    entries: Vec<Result<T, BatchError>>,
    position: usize,
}

impl<T: Clone + Send> IterReader<T> {
    #[must_use]
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self::from_results(items.into_iter().map(Ok))
    }

    #[must_use]
    pub fn from_results(entries: impl IntoIterator<Item = Result<T, BatchError>>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            position: 0,
        }
    }
}

impl<T: Clone + Send> ItemReader<T> for IterReader<T> {
    fn open(&mut self) -> Result<(), BatchError> {
        self.position = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<T>, BatchError> {
        match self.entries.get(self.position) {
            None => Ok(None),
            Some(Ok(item)) => {
                self.position += 1;
                Ok(Some(item.clone()))
            }
            Some(Err(err)) => Err(err.clone()),
        }
    }

    fn discard_failed(&mut self) {
        if matches!(self.entries.get(self.position), Some(Err(_))) {
            self.position += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory writer
// ---------------------------------------------------------------------------

/// Shared view of the chunks accepted by a [`VecWriter`].
#[derive(Debug)]
pub struct ChunkLog<T> {
    chunks: Arc<Mutex<Vec<Vec<T>>>>,
}

impl<T> Clone for ChunkLog<T> {
    fn clone(&self) -> Self {
        Self {
            chunks: Arc::clone(&self.chunks),
        }
    }
}

impl<T: Clone> ChunkLog<T> {
    /// Every accepted chunk, in flush order.
    #[must_use]
    pub fn chunks(&self) -> Vec<Vec<T>> {
        self.chunks
            .lock()
            .map(|chunks| chunks.clone())
            .unwrap_or_default()
    }

    /// Concatenation of all accepted chunks.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.chunks().into_iter().flatten().collect()
    }

    /// Sizes of the accepted chunks, in flush order.
    #[must_use]
    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.chunks().iter().map(Vec::len).collect()
    }
}

/// Writer that appends each accepted chunk to a shared [`ChunkLog`].
///
/// An optional [`FaultPlan`] makes selected `write` calls fail with a
/// `sink` error before anything is recorded.
pub struct VecWriter<T> {
    log: ChunkLog<T>,
    faults: FaultPlan,
}

impl<T: Clone + Send> VecWriter<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_faults(FaultPlan::never())
    }

    #[must_use]
    pub fn with_faults(faults: FaultPlan) -> Self {
        Self {
            log: ChunkLog {
                chunks: Arc::new(Mutex::new(Vec::new())),
            },
            faults,
        }
    }

    #[must_use]
    pub fn log(&self) -> ChunkLog<T> {
        self.log.clone()
    }
}

impl<T: Clone + Send> Default for VecWriter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> ItemWriter<T> for VecWriter<T> {
    fn write(&mut self, chunk: &[T]) -> Result<(), BatchError> {
        if self.faults.next_fails() {
            return Err(BatchError::sink(
                "INJECTED_FAULT",
                format!("write #{} failed by fault plan", self.faults.invocations()),
            ));
        }
        let mut chunks = self
            .log
            .chunks
            .lock()
            .map_err(|_| BatchError::sink("LOCK_POISONED", "chunk log lock poisoned"))?;
        chunks.push(chunk.to_vec());
        Ok(())
    }
}
