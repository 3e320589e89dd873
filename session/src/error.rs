//! Error types for session tracking.

use std::fmt;

use crate::SessionId;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by the session tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The session id is not connected.
    UnknownSession { session: SessionId },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSession { session } => {
                write!(f, "unknown session {}", session.0)
            }
        }
    }
}

impl std::error::Error for SessionError {}
