use crate::clock::{TimestampMatrix, TimestampVector};
use crate::id::SessionId;
use crate::operation::Operation;
use serde::{Deserialize, Serialize};

/// Messages exchanged in an anti-entropy session. Every message carries the
/// identifier of the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    SummaryRequest {
        session_id: SessionId,
        summary: TimestampVector,
        ack: Option<TimestampMatrix>,
    },
    Operation {
        session_id: SessionId,
        operation: Operation,
    },
    EndSession {
        session_id: SessionId,
    },
}

impl Message {
    pub const SUMMARY_REQUEST: &'static str = "SUMMARY_REQUEST";
    pub const OPERATION: &'static str = "OPERATION";
    pub const END_SESSION: &'static str = "END_SESSION";

    pub fn session_id(&self) -> SessionId {
        match self {
            Message::SummaryRequest { session_id, .. } => *session_id,
            Message::Operation { session_id, .. } => *session_id,
            Message::EndSession { session_id } => *session_id,
        }
    }

    /// Returns the wire name of this message.
    pub fn name(&self) -> &'static str {
        match self {
            Message::SummaryRequest { .. } => Self::SUMMARY_REQUEST,
            Message::Operation { .. } => Self::OPERATION,
            Message::EndSession { .. } => Self::END_SESSION,
        }
    }
}
