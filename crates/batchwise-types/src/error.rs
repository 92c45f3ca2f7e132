//! Structured error model for batch item, chunk, and wiring failures.
//!
//! [`BatchError`] carries an [`ErrorKind`] that retry policies match on,
//! a stable machine-readable code, and optional diagnostic details.
//! Construct via the kind-specific factory methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a batch error.
///
/// Retry policies enroll kinds, never individual codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input line (e.g. field count mismatch).
    Parse,
    /// A processing stage rejected its input.
    Processing,
    /// The sink failed to accept a chunk.
    Sink,
    /// An input or output resource could not be opened, read, or closed.
    Resource,
    /// Invalid step or job wiring. Never retried.
    Configuration,
}

impl ErrorKind {
    /// Wire-format string, matching the serde representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Processing => "processing",
            Self::Sink => "sink",
            Self::Resource => "resource",
            Self::Configuration => "configuration",
        }
    }

    /// Item-level kinds are retried by re-running the failing item;
    /// every other kind is scoped to the chunk or the step.
    #[must_use]
    pub fn is_item_level(self) -> bool {
        matches!(self, Self::Parse | Self::Processing)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error raised by readers, processors, writers, and builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind}] {code}: {message}")]
pub struct BatchError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl BatchError {
    /// Error of an explicit kind; prefer the kind-specific factories.
    #[must_use]
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Malformed input record.
    #[must_use]
    pub fn parse(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, code, message)
    }

    /// Semantically invalid input rejected by a processing stage.
    #[must_use]
    pub fn processing(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Processing, code, message)
    }

    /// Chunk flush failure.
    #[must_use]
    pub fn sink(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Sink, code, message)
    }

    /// Resource open/read/close failure.
    #[must_use]
    pub fn resource(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resource, code, message)
    }

    /// Invalid wiring detected at build time.
    #[must_use]
    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, code, message)
    }

    /// Attach structured diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factories_set_kind() {
        assert_eq!(BatchError::parse("X", "y").kind, ErrorKind::Parse);
        assert_eq!(BatchError::processing("X", "y").kind, ErrorKind::Processing);
        assert_eq!(BatchError::sink("X", "y").kind, ErrorKind::Sink);
        assert_eq!(BatchError::resource("X", "y").kind, ErrorKind::Resource);
        assert_eq!(
            BatchError::configuration("X", "y").kind,
            ErrorKind::Configuration
        );
    }

    #[test]
    fn item_level_kinds() {
        assert!(ErrorKind::Parse.is_item_level());
        assert!(ErrorKind::Processing.is_item_level());
        assert!(!ErrorKind::Sink.is_item_level());
        assert!(!ErrorKind::Resource.is_item_level());
        assert!(!ErrorKind::Configuration.is_item_level());
    }

    #[test]
    fn display_format() {
        let err = BatchError::parse("FIELD_COUNT_MISMATCH", "expected 3 fields, found 2");
        assert_eq!(
            err.to_string(),
            "[parse] FIELD_COUNT_MISMATCH: expected 3 fields, found 2"
        );
    }

    #[test]
    fn kind_deserializes_from_snake_case() {
        let kinds: Vec<ErrorKind> =
            serde_json::from_str(r#"["parse", "processing", "sink"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![ErrorKind::Parse, ErrorKind::Processing, ErrorKind::Sink]
        );
    }

    #[test]
    fn details_are_skipped_when_absent() {
        let json = serde_json::to_value(BatchError::sink("IO", "disk full")).unwrap();
        assert!(json.get("details").is_none());

        let with = BatchError::sink("IO", "disk full")
            .with_details(serde_json::json!({"path": "/tmp/out.csv"}));
        let json = serde_json::to_value(&with).unwrap();
        assert_eq!(json["details"]["path"], "/tmp/out.csv");
    }
}
