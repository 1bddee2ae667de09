use super::{connect, spawn, with_timeout};
use crate::config::Config;
use crate::id::ParticipantId;
use crate::replica::Replica;
use crate::run::RunResult;
use crate::session::{self, SessionOutcome};
use crate::store::Store;
use crate::{debug, info, warn};
use rand::seq::SliceRandom;
use std::net::SocketAddr;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Starts a session with a random partner every `config.session_interval()`.
/// Each session runs in its own task, so a partner that stops answering never
/// delays the next tick; a failed session is only logged, as the next tick
/// will start a new one.
pub async fn scheduler_task<S>(
    replica: Replica<S>,
    config: Config,
    partners: Vec<(ParticipantId, SocketAddr)>,
) where
    S: Store,
{
    let duration = match config.session_interval() {
        Some(duration) => duration,
        None => {
            info!("[scheduler] no session interval: exiting");
            return;
        }
    };
    if partners.is_empty() {
        info!("[scheduler] no partners: exiting");
        return;
    }
    info!(
        "[scheduler] started with {} partners | interval {:?}",
        partners.len(),
        duration
    );

    // create interval, skipping the tick at time zero
    let mut interval = time::interval_at(Instant::now() + duration, duration);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let (partner, address) =
            match partners.choose(&mut rand::thread_rng()) {
                Some(chosen) => chosen.clone(),
                None => continue,
            };
        let replica = replica.clone();
        let config = config.clone();
        spawn(async move {
            match initiate(&replica, &config, &partner, address).await {
                Ok(outcome) => {
                    debug!(
                        "[scheduler] session with {}: {:?}",
                        partner,
                        outcome
                    );
                }
                Err(e) => {
                    warn!("[scheduler] session with {} failed: {}", partner, e);
                }
            }
        });
    }
}

/// Connects to `partner` and runs the initiator side of a session over the new
/// connection, bounded by `config.session_timeout()`.
pub async fn initiate<S>(
    replica: &Replica<S>,
    config: &Config,
    partner: &ParticipantId,
    address: SocketAddr,
) -> RunResult<SessionOutcome>
where
    S: Store,
{
    let mut connection = connect(
        address,
        config.tcp_nodelay(),
        config.tcp_buffer_size(),
        config.connect_retries(),
    )
    .await?;
    let session = session::initiate(replica, &mut connection, partner);
    let outcome = with_timeout(config.session_timeout(), session).await?;
    Ok(outcome)
}
