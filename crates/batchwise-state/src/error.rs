//! Run repository error types.

use batchwise_types::state::RunId;

/// Errors produced by [`RunRepository`](crate::RunRepository) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Internal mutex was poisoned by a panicked thread.
    #[error("run repository lock poisoned")]
    LockPoisoned,

    /// No run was started with this identifier.
    #[error("unknown run id {0}")]
    UnknownRun(RunId),

    /// The run was already completed.
    #[error("run {0} is already complete")]
    AlreadyComplete(RunId),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_poisoned_displays() {
        assert_eq!(
            StateError::LockPoisoned.to_string(),
            "run repository lock poisoned"
        );
    }

    #[test]
    fn unknown_run_names_the_id() {
        let msg = StateError::UnknownRun(RunId::new(42)).to_string();
        assert!(msg.contains("42"), "got: {msg}");
    }
}
