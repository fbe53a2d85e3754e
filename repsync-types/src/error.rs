//! Error types for the coordination core.
//!
//! The core deliberately has almost no errors of its own: supersession and
//! "nothing to flush" are ordinary outcomes, and factory failures pass
//! through verbatim as the caller's error type.

use thiserror::Error;

/// Entity key validation errors.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Entity keys must be non-empty.
    #[error("entity key must not be empty")]
    Empty,
}

/// Errors from the backing write path for a session set.
///
/// This is the error type the workout app's persistence layer settles its
/// write factories with. The coordinator carries it through untouched.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetWriteError {
    /// The request never reached the backend.
    #[error("network error: {0}")]
    Network(String),

    /// The backend no longer knows the set being written.
    #[error("set not found: {0}")]
    NotFound(String),

    /// The backend refused the write.
    #[error("rejected by server: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_error_display() {
        assert!(KeyError::Empty.to_string().contains("empty"));
    }

    #[test]
    fn set_write_error_display() {
        let err = SetWriteError::Network("connection reset".into());
        assert!(err.to_string().contains("connection reset"));
        let err = SetWriteError::NotFound("set-9".into());
        assert!(err.to_string().contains("set-9"));
    }
}
