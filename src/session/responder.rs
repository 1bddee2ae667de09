use super::{
    unexpected, Message, Role, Session, SessionOutcome, SessionState,
};
use crate::clock::TimestampVector;
use crate::error::SessionError;
use crate::operation::Operation;
use crate::replica::Replica;
use crate::run::rw::Rw;
use crate::store::Store;
use crate::warn;
use tokio::io::{AsyncRead, AsyncWrite};

/// Runs the responder side of a session over `rw`:
/// `recv SUMMARY_REQUEST -> send OPERATION* -> send SUMMARY_REQUEST ->
/// recv OPERATION* -> recv END_SESSION -> send END_SESSION`.
///
/// The session adopts the identifier chosen by the initiator. The replica is
/// only changed if the session terminates cleanly.
pub async fn respond<S, St>(
    replica: &Replica<St>,
    rw: &mut Rw<S>,
) -> Result<SessionOutcome, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    St: Store,
{
    // the first message opens the session
    let (session_id, summary, ack) = match rw.recv::<Message>().await? {
        Some(Message::SummaryRequest {
            session_id,
            summary,
            ack,
        }) => (session_id, summary, ack),
        Some(msg) => {
            let e = unexpected(Message::SUMMARY_REQUEST, &msg);
            warn!("[session {}] rejected: {}", msg.session_id(), e);
            return Err(e);
        }
        None => {
            return Err(SessionError::Closed {
                expected: Message::SUMMARY_REQUEST,
            })
        }
    };
    let mut session = Session::new(session_id, Role::Responder, rw);

    match exchange(&mut session, replica, &summary).await {
        Ok(ops) => {
            let commit = replica.commit(ops, &summary, ack.as_ref());
            Ok(session.close(commit))
        }
        Err(e) => {
            session.abort(&e);
            Err(e)
        }
    }
}

async fn exchange<S, St>(
    session: &mut Session<'_, S>,
    replica: &Replica<St>,
    partner_summary: &TimestampVector,
) -> Result<Vec<Operation>, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    St: Store,
{
    // snapshot what the initiator is missing along with our summary
    session.transition(SessionState::ExchangeSummary);
    let (newer, summary, ack) = replica.snapshot_newer(partner_summary);

    // send those operations and then our summary, signalling the
    // initiator's turn
    session.transition(SessionState::ExchangeOperations);
    session.send_operations(newer).await?;
    session.send_summary(summary, Some(ack)).await?;

    // stage the operations we're missing, until the initiator ends the
    // session
    let (ops, msg) = session.recv_operations(Message::END_SESSION).await?;
    match msg {
        Message::EndSession { .. } => {}
        msg => return Err(unexpected(Message::END_SESSION, &msg)),
    }

    // acknowledge the end of the session
    session.transition(SessionState::Terminating);
    session.send_end().await?;
    Ok(ops)
}
