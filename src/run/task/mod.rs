// This module contains the session scheduler's implementation.
pub mod periodic;

use crate::config::Config;
use crate::error::SessionError;
use crate::replica::Replica;
use crate::run::rw::Connection;
use crate::run::RunResult;
use crate::session;
use crate::store::Store;
use crate::{debug, info, warn};
use std::fmt::Debug;
use std::future::Future;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Just a wrapper around tokio::spawn.
pub fn spawn<F>(task: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(task)
}

/// Connect to some address.
pub async fn connect<A>(
    address: A,
    tcp_nodelay: bool,
    tcp_buffer_size: usize,
    connect_retries: usize,
) -> RunResult<Connection>
where
    A: ToSocketAddrs + Clone + Debug,
{
    let mut tries = 0;
    loop {
        match TcpStream::connect(address.clone()).await {
            Ok(stream) => {
                let connection =
                    Connection::new(stream, tcp_nodelay, tcp_buffer_size);
                return Ok(connection);
            }
            Err(e) => {
                // if not, try again if we shouldn't give up (due to too many
                // attempts)
                tries += 1;
                if tries < connect_retries {
                    warn!(
                        "[connect] failed to connect to {:?}: {}",
                        address,
                        e
                    );
                    warn!(
                        "[connect] will try again in {:?} ({} out of {})",
                        CONNECT_RETRY_DELAY,
                        tries,
                        connect_retries
                    );
                    time::sleep(CONNECT_RETRY_DELAY).await;
                } else {
                    return Err(e.into());
                }
            }
        }
    }
}

/// Listen on some address.
pub async fn listen<A>(address: A) -> RunResult<TcpListener>
where
    A: ToSocketAddrs,
{
    Ok(TcpListener::bind(address).await?)
}

/// Listen on new connections and answer each of them with a session in its
/// own task.
pub async fn listener_task<S>(
    listener: TcpListener,
    replica: Replica<S>,
    config: Config,
) where
    S: Store,
{
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("[listener] new connection: {:?}", addr);

                // create connection
                let mut connection = Connection::new(
                    stream,
                    config.tcp_nodelay(),
                    config.tcp_buffer_size(),
                );

                let replica = replica.clone();
                let timeout = config.session_timeout();
                spawn(async move {
                    let session = session::respond(&replica, &mut connection);
                    match with_timeout(timeout, session).await {
                        Ok(outcome) => {
                            debug!(
                                "[listener] session with {:?}: {:?}",
                                addr,
                                outcome
                            );
                        }
                        Err(e) => {
                            warn!(
                                "[listener] session with {:?} failed: {}",
                                addr,
                                e
                            );
                        }
                    }
                });
            }
            Err(e) => {
                info!("[listener] couldn't accept new connection: {:?}", e);
            }
        }
    }
}

/// Bounds `session` by `timeout`, if any. A session that times out is
/// dropped, which also drops (and thus closes) its connection.
pub async fn with_timeout<F, T>(
    timeout: Option<Duration>,
    session: F,
) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    match timeout {
        Some(timeout) => time::timeout(timeout, session)
            .await
            .unwrap_or(Err(SessionError::Timeout(timeout))),
        None => session.await,
    }
}
