//! Shared batchwise identifiers, run-status model, and error model types.
//!
//! Dependency-light so every other crate in the workspace can use it.

pub mod error;
pub mod resource;
pub mod state;
