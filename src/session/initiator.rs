use super::{
    unexpected, Message, Role, Session, SessionOutcome, SessionState, Staged,
};
use crate::error::SessionError;
use crate::replica::Replica;
use crate::run::rw::Rw;
use crate::store::Store;
use crate::trace;
use tokio::io::{AsyncRead, AsyncWrite};

/// Runs the initiator side of a session with `partner` over `rw`:
/// `send SUMMARY_REQUEST -> recv OPERATION* -> recv SUMMARY_REQUEST ->
/// send OPERATION* -> send END_SESSION -> recv END_SESSION`.
///
/// The replica is only changed if the session terminates cleanly.
pub async fn initiate<S, St>(
    replica: &Replica<St>,
    rw: &mut Rw<S>,
    partner: &str,
) -> Result<SessionOutcome, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    St: Store,
{
    let session_id = replica.next_session_id();
    trace!(
        "[session {}] {} starting with {}",
        session_id,
        replica.id(),
        partner
    );
    let mut session = Session::new(session_id, Role::Initiator, rw);

    match exchange(&mut session, replica).await {
        Ok(staged) => {
            let Staged { ops, summary, ack } = staged;
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
) -> Result<Staged, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    St: Store,
{
    // send our summary first
    session.transition(SessionState::ExchangeSummary);
    let (summary, ack) = replica.snapshot();
    session.send_summary(summary, Some(ack)).await?;

    // stage the operations we're missing, until the responder's summary
    // signals our turn
    let (ops, msg) = session.recv_operations(Message::SUMMARY_REQUEST).await?;
    let (partner_summary, partner_ack) = match msg {
        Message::SummaryRequest { summary, ack, .. } => (summary, ack),
        msg => return Err(unexpected(Message::SUMMARY_REQUEST, &msg)),
    };

    // send the operations the responder is missing
    session.transition(SessionState::ExchangeOperations);
    let newer = replica.list_newer(&partner_summary);
    session.send_operations(newer).await?;

    // end the session and wait for the responder to acknowledge it
    session.transition(SessionState::Terminating);
    session.send_end().await?;
    match session.recv(Message::END_SESSION).await? {
        Message::EndSession { .. } => {}
        msg => return Err(unexpected(Message::END_SESSION, &msg)),
    }

    Ok(Staged {
        ops,
        summary: partner_summary,
        ack: partner_ack,
    })
}
