// This module contains the definition of `Message`.
mod message;

// This module contains the initiator side of a session.
mod initiator;

// This module contains the responder side of a session.
mod responder;

// Re-exports.
pub use initiator::initiate;
pub use message::Message;
pub use responder::respond;

use crate::clock::{TimestampMatrix, TimestampVector};
use crate::error::SessionError;
use crate::id::SessionId;
use crate::operation::Operation;
use crate::replica::Commit;
use crate::run::rw::Rw;
use crate::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

/// The states of a session. Both roles go through
/// `Start -> ExchangeSummary -> ExchangeOperations -> Terminating -> Closed`;
/// any failure moves the session to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Start,
    ExchangeSummary,
    ExchangeOperations,
    Terminating,
    Closed,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Aborted)
    }

    fn can_move_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Start, ExchangeSummary)
            | (ExchangeSummary, ExchangeOperations)
            | (ExchangeOperations, Terminating)
            | (Terminating, Closed) => true,
            (current, Aborted) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// Summary of a session that reached `SessionState::Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub role: Role,
    /// number of operations sent to the partner
    pub sent: usize,
    /// number of operations received from the partner
    pub received: usize,
    /// what committing the session changed locally
    pub commit: Commit,
}

/// What a session received and will commit once it terminates cleanly.
struct Staged {
    ops: Vec<Operation>,
    summary: TimestampVector,
    ack: Option<TimestampMatrix>,
}

/// The exchange primitives shared by both roles: they differ only in the
/// order in which these are called.
struct Session<'a, S> {
    id: SessionId,
    role: Role,
    state: SessionState,
    rw: &'a mut Rw<S>,
    sent: usize,
    received: usize,
}

impl<'a, S> Session<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(id: SessionId, role: Role, rw: &'a mut Rw<S>) -> Self {
        Self {
            id,
            role,
            state: SessionState::Start,
            rw,
            sent: 0,
            received: 0,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_move_to(next),
            "invalid session transition"
        );
        trace!(
            "[session {}] {:?}: {:?} -> {:?}",
            self.id,
            self.role,
            self.state,
            next
        );
        self.state = next;
    }

    /// Sends a summary request, flushing every operation written before.
    async fn send_summary(
        &mut self,
        summary: TimestampVector,
        ack: Option<TimestampMatrix>,
    ) -> Result<(), SessionError> {
        let msg = Message::SummaryRequest {
            session_id: self.id,
            summary,
            ack,
        };
        self.rw.send(&msg).await
    }

    /// Streams `ops` to the partner, one message per operation. Operations are
    /// only flushed by the next `send_summary` or `send_end`.
    async fn send_operations(
        &mut self,
        ops: Vec<Operation>,
    ) -> Result<(), SessionError> {
        for operation in ops {
            let msg = Message::Operation {
                session_id: self.id,
                operation,
            };
            self.rw.write(&msg).await?;
            self.sent += 1;
        }
        Ok(())
    }

    async fn send_end(&mut self) -> Result<(), SessionError> {
        let msg = Message::EndSession {
            session_id: self.id,
        };
        self.rw.send(&msg).await
    }

    /// Receives operations until a message that is not an operation shows up;
    /// that message is returned along with the operations received.
    async fn recv_operations(
        &mut self,
        expected: &'static str,
    ) -> Result<(Vec<Operation>, Message), SessionError> {
        let mut ops = Vec::new();
        loop {
            match self.recv(expected).await? {
                Message::Operation { operation, .. } => {
                    trace!("[session {}] received {}", self.id, operation);
                    self.received += 1;
                    ops.push(operation);
                }
                msg => return Ok((ops, msg)),
            }
        }
    }

    /// Receives the next message of this session. `expected` names what the
    /// session is waiting for and is only used for error reporting.
    async fn recv(
        &mut self,
        expected: &'static str,
    ) -> Result<Message, SessionError> {
        match self.rw.recv::<Message>().await? {
            Some(msg) if msg.session_id() != self.id => {
                Err(SessionError::SessionMismatch {
                    expected: self.id,
                    got: msg.session_id(),
                })
            }
            Some(msg) => Ok(msg),
            None => Err(SessionError::Closed { expected }),
        }
    }

    fn close(mut self, commit: Commit) -> SessionOutcome {
        self.transition(SessionState::Closed);
        debug!(
            "[session {}] {:?} closed | sent: {} | received: {} | {:?}",
            self.id,
            self.role,
            self.sent,
            self.received,
            commit
        );
        SessionOutcome {
            session_id: self.id,
            role: self.role,
            sent: self.sent,
            received: self.received,
            commit,
        }
    }

    fn abort(&mut self, error: &SessionError) {
        warn!(
            "[session {}] {:?} aborted in {:?}: {}",
            self.id,
            self.role,
            self.state,
            error
        );
        self.transition(SessionState::Aborted);
    }
}

/// Builds the error for a message that arrived out of turn.
fn unexpected(expected: &'static str, msg: &Message) -> SessionError {
    SessionError::Protocol {
        expected,
        got: msg.name(),
    }
}
