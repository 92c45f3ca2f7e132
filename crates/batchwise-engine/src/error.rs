//! Engine-level error type.

use batchwise_state::StateError;
use batchwise_types::error::BatchError;

/// Error returned by the orchestrator.
///
/// Step failures are not errors at this level: they are reported inside
/// the [`JobExecution`](crate::result::JobExecution). This type covers
/// failures around the run itself.
#[derive(Debug)]
pub enum EngineError {
    /// Typed batch error raised outside any step (e.g. wiring).
    Batch(BatchError),
    /// Run repository failure.
    State(StateError),
    /// Infrastructure error (worker task panic, etc.)
    Infrastructure(anyhow::Error),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Batch(e) => write!(f, "{e}"),
            Self::State(e) => write!(f, "run repository: {e}"),
            Self::Infrastructure(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Batch(e) => Some(e),
            Self::State(e) => Some(e),
            Self::Infrastructure(e) => Some(e.as_ref()),
        }
    }
}

impl From<BatchError> for EngineError {
    fn from(e: BatchError) -> Self {
        Self::Batch(e)
    }
}

impl From<StateError> for EngineError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}

impl EngineError {
    /// Returns the typed batch error, if this is one.
    #[must_use]
    pub fn as_batch_error(&self) -> Option<&BatchError> {
        match self {
            Self::Batch(e) => Some(e),
            Self::State(_) | Self::Infrastructure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchwise_types::state::RunId;

    #[test]
    fn display_passes_batch_error_through() {
        let err = EngineError::from(BatchError::configuration("NO_STEPS", "job has no steps"));
        assert_eq!(err.to_string(), "[configuration] NO_STEPS: job has no steps");
        assert!(err.as_batch_error().is_some());
    }

    #[test]
    fn state_error_is_prefixed() {
        let err = EngineError::from(StateError::UnknownRun(RunId::new(9)));
        assert!(err.to_string().starts_with("run repository: "));
        assert!(err.as_batch_error().is_none());
    }

    #[test]
    fn anyhow_converts_to_infrastructure() {
        let err: EngineError = anyhow::anyhow!("worker panicked").into();
        assert!(matches!(err, EngineError::Infrastructure(_)));
        assert_eq!(err.to_string(), "worker panicked");
    }
}
