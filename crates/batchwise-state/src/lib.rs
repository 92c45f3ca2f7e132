//! Run bookkeeping for batchwise jobs.
//!
//! Provides the [`RunRepository`] trait and an [`InMemoryRunRepository`]
//! that hands out monotonically increasing run identifiers and keeps the
//! run history of the current process.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod memory;

pub use backend::{RunRecord, RunRepository};
pub use error::StateError;
pub use memory::InMemoryRunRepository;
