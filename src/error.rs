use std::fmt;

use thiserror::Error;

/// Main error type for the carving engine
///
/// Only failures that stop a whole operation live here. A candidate that
/// turns out not to be a document is a [`CandidateRejection`], not an error.
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Memory mapping error: {0}")]
    Mmap(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Container error: {0}")]
    Container(String),
}

/// Result type alias for carving operations
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Why a candidate window was not persisted
///
/// All three drive the same skip-and-rescan policy; they are kept apart so
/// callers can tell which path the carver took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateRejection {
    /// The window does not open as a container exposing the primary entry
    NotAContainer,
    /// The container opened but yielded no usable text (or is encrypted)
    NoText,
    /// The text fingerprint was already recovered in this session
    DuplicateContent,
}

impl fmt::Display for CandidateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CandidateRejection::NotAContainer => "not a container",
            CandidateRejection::NoText => "no extractable text",
            CandidateRejection::DuplicateContent => "duplicate content",
        };
        f.write_str(reason)
    }
}

/// Result of a long-running operation that may be cancelled
///
/// Abandonment is a normal outcome: files already fully written stay on disk.
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    Abandoned,
}

impl<T> Outcome<T> {
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Outcome::Abandoned)
    }

    /// Returns the completed value, if any
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Abandoned => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let err: RecoveryError =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read").into();
        assert!(matches!(err, RecoveryError::Io(_)));
        assert!(err.to_string().contains("short read"));
    }

    #[test]
    fn test_outcome_accessors() {
        assert_eq!(Outcome::Completed(3).completed(), Some(3));
        assert!(Outcome::<u8>::Abandoned.is_abandoned());
        assert_eq!(Outcome::<u8>::Abandoned.completed(), None);
    }
}
