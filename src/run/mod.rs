// The runner of a `Replica`: each replica listens for sessions started by
// others and, if a session interval is configured, periodically starts a
// session with a random partner.
//
// - every accepted connection is answered by a responder session in its own
//   task, so sessions run concurrently with each other and with local writes
// - sessions only touch the replica through its lock-guarded methods, and
//   never hold the lock across I/O
// - a failed session is logged and discarded; the scheduler's next tick is
//   the retry
//
// This module contains the common read-write (+serde) utilities.
pub mod rw;

// This module contains the implementation of the listener and the session
// scheduler.
pub mod task;

use crate::config::Config;
use crate::id::ParticipantId;
use crate::info;
use crate::replica::Replica;
use crate::store::Store;
use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use tokio::task::JoinHandle;

pub type RunResult<V> = Result<V, Box<dyn Error + Send + Sync>>;

/// A running replica: the listener and the scheduler run in their own tasks
/// until the handle is shut down (or dropped along with the runtime).
#[derive(Debug)]
pub struct ReplicaHandle<S> {
    replica: Replica<S>,
    local_addr: SocketAddr,
    listener: JoinHandle<()>,
    scheduler: JoinHandle<()>,
}

impl<S> ReplicaHandle<S> {
    /// The replica being run. Local operations can be submitted through it.
    pub fn replica(&self) -> &Replica<S> {
        &self.replica
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and starting sessions. Sessions already
    /// running are left to complete.
    pub fn shutdown(self) {
        self.listener.abort();
        self.scheduler.abort();
    }
}

/// Starts a replica listening on `ip:port` that exchanges operations with the
/// partners in `addresses`. Addresses of unknown participants (or of this
/// replica) are ignored.
pub async fn replica<S>(
    config: Config,
    ip: IpAddr,
    port: u16,
    addresses: Vec<(ParticipantId, SocketAddr)>,
    store: S,
) -> RunResult<ReplicaHandle<S>>
where
    S: Store,
{
    let replica = Replica::new(&config, store);

    // only keep the addresses of our partners
    let partners: Vec<_> = addresses
        .into_iter()
        .filter(|(id, _)| config.partners().any(|partner| partner == id))
        .collect();

    // start listener
    let listener = task::listen((ip, port)).await?;
    let local_addr = listener.local_addr()?;
    info!(
        "[replica {}] listening on {} | partners: {:?}",
        config.id(),
        local_addr,
        partners
    );
    let listener = task::spawn(task::listener_task(
        listener,
        replica.clone(),
        config.clone(),
    ));

    // start scheduler
    let scheduler = task::spawn(task::periodic::scheduler_task(
        replica.clone(),
        config,
        partners,
    ));

    Ok(ReplicaHandle {
        replica,
        local_addr,
        listener,
        scheduler,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Payload;
    use crate::store::KVStore;
    use crate::timestamp::Timestamp;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn add(key: &str) -> Payload {
        Payload::Add {
            key: key.to_string(),
            value: String::from("v"),
        }
    }

    #[tokio::test]
    async fn session_over_tcp() {
        let participants = vec!["A", "B"];

        // b only answers to sessions
        let mut config_b = Config::new("B", participants.clone());
        config_b.set_session_interval(None);
        let b = replica(config_b, LOCALHOST, 0, Vec::new(), KVStore::new())
            .await
            .expect("replica b should start");
        let op = b.replica().submit(add("x"));

        // a starts sessions on demand
        let mut config_a = Config::new("A", participants);
        config_a.set_session_interval(None);
        config_a.set_session_timeout(Some(Duration::from_secs(5)));
        let addresses = vec![(String::from("B"), b.local_addr())];
        let a =
            replica(config_a.clone(), LOCALHOST, 0, addresses, KVStore::new())
                .await
                .expect("replica a should start");
        a.replica().submit(add("y"));

        let outcome = task::periodic::initiate(
            a.replica(),
            &config_a,
            &String::from("B"),
            b.local_addr(),
        )
        .await
        .expect("session should complete");
        assert_eq!(outcome.sent, 1);
        assert_eq!(outcome.received, 1);

        // a has b's operation
        assert_eq!(a.replica().log().last("B"), Some(op.timestamp()));
        assert_eq!(a.replica().inspect(|store| store.len()), 2);

        // b commits right after acknowledging the end of the session
        let expected = Timestamp::new("A", 0);
        let mut rounds = 0;
        while b.replica().summary().get_last("A") != Some(&expected) {
            assert!(rounds < 100, "b should commit the session");
            tokio::time::sleep(Duration::from_millis(10)).await;
            rounds += 1;
        }
        assert_eq!(a.replica().summary(), b.replica().summary());

        a.shutdown();
        b.shutdown();
    }

    #[tokio::test]
    async fn scheduled_sessions() {
        let participants = vec!["A", "B", "C"];
        let interval = Duration::from_millis(20);

        // a and b only answer to sessions started by c
        let mut handles = Vec::new();
        for id in &participants[..2] {
            let mut config = Config::new(*id, participants.clone());
            config.set_session_interval(None);
            let handle =
                replica(config, LOCALHOST, 0, Vec::new(), KVStore::new())
                    .await
                    .expect("replica should start");
            handle.replica().submit(add(id));
            handles.push(handle);
        }
        let addresses: Vec<_> = participants
            .iter()
            .zip(&handles)
            .map(|(id, handle)| (id.to_string(), handle.local_addr()))
            .collect();
        let mut config_c = Config::new("C", participants.clone());
        config_c.set_session_interval(Some(interval));
        let c = replica(config_c, LOCALHOST, 0, addresses, KVStore::new())
            .await
            .expect("replica c should start");
        c.replica().submit(add("c"));

        // eventually c sees the first operation of every replica
        let everyone = |c: &ReplicaHandle<KVStore>| {
            let summary = c.replica().summary();
            participants
                .iter()
                .all(|id| summary.get_last(id) == Some(&Timestamp::new(*id, 0)))
        };
        let mut rounds = 0;
        while !everyone(&c) {
            assert!(rounds < 500, "c should hear from everyone");
            tokio::time::sleep(interval).await;
            rounds += 1;
        }

        c.shutdown();
        handles.into_iter().for_each(ReplicaHandle::shutdown);
    }

    #[tokio::test]
    async fn silent_partner_does_not_stall_sessions() {
        let participants = vec!["A", "B", "C"];
        let interval = Duration::from_millis(20);

        // a accepts connections but never answers
        let silent = tokio::net::TcpListener::bind((LOCALHOST, 0))
            .await
            .expect("listener should bind");
        let silent_addr = silent.local_addr().expect("listener has an address");
        let silent = tokio::spawn(async move {
            let mut streams = Vec::new();
            while let Ok((stream, _)) = silent.accept().await {
                streams.push(stream);
            }
        });

        // b only answers to sessions started by c
        let mut config_b = Config::new("B", participants.clone());
        config_b.set_session_interval(None);
        let b = replica(config_b, LOCALHOST, 0, Vec::new(), KVStore::new())
            .await
            .expect("replica b should start");
        let op = b.replica().submit(add("b"));

        // c has no session timeout, so sessions with a hang forever
        let mut config_c = Config::new("C", participants);
        config_c.set_session_interval(Some(interval));
        config_c.set_session_timeout(None);
        let addresses = vec![
            (String::from("A"), silent_addr),
            (String::from("B"), b.local_addr()),
        ];
        let c = replica(config_c, LOCALHOST, 0, addresses, KVStore::new())
            .await
            .expect("replica c should start");

        // c still gets b's operation
        let mut rounds = 0;
        while c.replica().summary().get_last("B") != Some(op.timestamp()) {
            assert!(rounds < 500, "c should hear from b");
            tokio::time::sleep(interval).await;
            rounds += 1;
        }

        c.shutdown();
        b.shutdown();
        silent.abort();
    }
}
