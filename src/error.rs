use crate::id::SessionId;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort an anti-entropy session. None of them is fatal to the
/// replica: the session is discarded without committing any state.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
    #[error("undecodable message: {0}")]
    Decode(#[from] bincode::Error),
    #[error("unencodable message: {0}")]
    Encode(bincode::Error),
    #[error("protocol violation: expected {expected}, got {got}")]
    Protocol {
        expected: &'static str,
        got: &'static str,
    },
    #[error("message from session {got} received in session {expected}")]
    SessionMismatch { expected: SessionId, got: SessionId },
    #[error("connection closed while waiting for {expected}")]
    Closed { expected: &'static str },
    #[error("session timed out after {0:?}")]
    Timeout(Duration),
}

impl SessionError {
    /// Checks whether the partner misbehaved (as opposed to the transport
    /// failing underneath the session).
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            SessionError::Decode(_)
                | SessionError::Protocol { .. }
                | SessionError::SessionMismatch { .. }
        )
    }
}
