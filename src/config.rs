use crate::id::ParticipantId;
use std::time::Duration;

const DEFAULT_SESSION_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_TCP_NODELAY: bool = true;
const DEFAULT_TCP_BUFFER_SIZE: usize = 8 * 1024; // 8 KBs
const DEFAULT_CONNECT_RETRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// identifier of this replica
    id: ParticipantId,
    /// all participants in the group (including this replica)
    participants: Vec<ParticipantId>,
    /// interval between anti-entropy sessions started by this replica; if
    /// `None`, this replica only answers to sessions started by others
    session_interval: Option<Duration>,
    /// if set, sessions taking longer than this are aborted
    session_timeout: Option<Duration>,
    /// defines whether the log should be purged after each session
    purge: bool,
    /// defines whether TCP_NODELAY should be set on connections
    tcp_nodelay: bool,
    /// size of the read and write buffers of each connection
    tcp_buffer_size: usize,
    /// number of attempts when connecting to a partner
    connect_retries: usize,
}

impl Config {
    /// Create a new `Config`.
    /// The first argument `id` identifies this replica and the second argument
    /// `participants` lists every replica in the group. If `id` is not part of
    /// `participants`, it's added.
    pub fn new<P, I>(id: P, participants: I) -> Self
    where
        P: Into<ParticipantId>,
        I: IntoIterator,
        I::Item: Into<ParticipantId>,
    {
        let id = id.into();
        let mut participants: Vec<ParticipantId> =
            participants.into_iter().map(Into::into).collect();
        if !participants.contains(&id) {
            participants.push(id.clone());
        }
        // make sure each participant shows up once
        participants.sort();
        participants.dedup();

        Self {
            id,
            participants,
            session_interval: Some(DEFAULT_SESSION_INTERVAL),
            // by default, sessions are not bounded
            session_timeout: None,
            // by default, the log is purged
            purge: true,
            tcp_nodelay: DEFAULT_TCP_NODELAY,
            tcp_buffer_size: DEFAULT_TCP_BUFFER_SIZE,
            connect_retries: DEFAULT_CONNECT_RETRIES,
        }
    }

    /// Retrieve the identifier of this replica.
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Retrieve all participants.
    pub fn participants(&self) -> &[ParticipantId] {
        &self.participants
    }

    /// Retrieve all participants but this replica.
    pub fn partners(&self) -> impl Iterator<Item = &ParticipantId> {
        self.participants
            .iter()
            .filter(move |participant| *participant != &self.id)
    }

    /// Checks the interval between sessions started by this replica.
    pub fn session_interval(&self) -> Option<Duration> {
        self.session_interval
    }

    /// Changes the interval between sessions started by this replica.
    pub fn set_session_interval(&mut self, interval: Option<Duration>) {
        self.session_interval = interval;
    }

    /// Checks the session timeout.
    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout
    }

    /// Changes the session timeout.
    pub fn set_session_timeout(&mut self, timeout: Option<Duration>) {
        self.session_timeout = timeout;
    }

    /// Checks whether the log is purged after each session.
    pub fn purge(&self) -> bool {
        self.purge
    }

    /// Changes the value of `purge`.
    pub fn set_purge(&mut self, purge: bool) {
        self.purge = purge;
    }

    /// Checks whether TCP_NODELAY is set.
    pub fn tcp_nodelay(&self) -> bool {
        self.tcp_nodelay
    }

    /// Changes the value of `tcp_nodelay`.
    pub fn set_tcp_nodelay(&mut self, tcp_nodelay: bool) {
        self.tcp_nodelay = tcp_nodelay;
    }

    /// Checks the connection buffer size.
    pub fn tcp_buffer_size(&self) -> usize {
        self.tcp_buffer_size
    }

    /// Changes the connection buffer size.
    pub fn set_tcp_buffer_size(&mut self, tcp_buffer_size: usize) {
        self.tcp_buffer_size = tcp_buffer_size;
    }

    /// Checks the number of connection attempts.
    pub fn connect_retries(&self) -> usize {
        self.connect_retries
    }

    /// Changes the number of connection attempts.
    pub fn set_connect_retries(&mut self, connect_retries: usize) {
        self.connect_retries = connect_retries;
    }
}
