//! Chunk-oriented batch execution engine.
//!
//! A [`Job`] runs its [`Step`]s in sequence. Each [`ChunkStep`] reads items,
//! processes them one by one, and hands them to its writer in chunks of a
//! fixed size, retrying failures within a per-chunk budget set by its
//! [`RetryPolicy`].

pub mod chunk;
pub mod config;
pub mod error;
pub mod fault;
pub mod item;
pub mod job;
pub mod multi;
pub mod orchestrator;
pub mod result;
pub mod retry;
pub mod step;

pub use error::EngineError;
pub use fault::{FaultInjectingProcessor, FaultPlan};
pub use item::{ItemProcessor, ItemReader, ItemWriter, IterReader, ResourceItemReader, VecWriter};
pub use job::{Job, JobBuilder};
pub use multi::MultiResourceReader;
pub use orchestrator::run_job;
pub use result::{JobExecution, StepCounts, StepExecution};
pub use retry::{Backoff, RetryPolicy};
pub use step::{ChunkStep, Step, StepBuilder};
