#![deny(rust_2018_idioms)]

// This module contains the definition of `ParticipantId`, `SessionId` and the
// generator of session identifiers.
pub mod id;

// This module contains the definition of `Timestamp`.
pub mod timestamp;

// This module contains the definition of `TimestampVector` and
// `TimestampMatrix`.
pub mod clock;

// This module contains the definition of `Operation`, `OpKind` and `Payload`.
pub mod operation;

// This module contains the definition of the `Store` trait and of an in-memory
// key-value store implementing it.
pub mod store;

// This module contains the definition of `Log`.
pub mod log;

// This module contains the definition of `Replica`, the state shared between
// local writers and anti-entropy sessions.
pub mod replica;

// This module contains the definition of `Config`.
pub mod config;

// This module contains the definition of `SessionError`.
pub mod error;

// This module contains the anti-entropy session protocol (both roles).
#[cfg(feature = "run")]
pub mod session;

// This module contains the definition of the transport, the listener and the
// session scheduler that actually run a `Replica`.
#[cfg(feature = "run")]
pub mod run;

// Re-exports.
pub use clock::{TimestampMatrix, TimestampVector};
pub use config::Config;
pub use error::SessionError;
pub use log::Log;
pub use operation::{OpKind, Operation, Payload};
pub use replica::Replica;
pub use timestamp::Timestamp;

pub type HashMap<K, V> = hashbrown::HashMap<K, V>;

#[macro_export]
macro_rules! trace {
    ($( $args:expr ),*) => {
        #[cfg(feature = "max_level_trace")]
        tracing::trace!( $( $args ),* )
    };
}

#[macro_export]
macro_rules! debug {
    ($( $args:expr ),*) => {
        #[cfg(any(feature = "max_level_debug", feature = "max_level_trace"))]
        tracing::debug!( $( $args ),* )
    };
}

#[macro_export]
macro_rules! info {
    ($( $args:expr ),*) => {
        tracing::info!( $( $args ),* )
    };
}

#[macro_export]
macro_rules! warn {
    ($( $args:expr ),*) => {
        tracing::warn!( $( $args ),* )
    };
}
