use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

// Definition of `Key` and `Value` types.
pub type Key = String;
pub type Value = String;

/// The kind of an `Operation`, used to decide how it mutates the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Add,
    Remove,
}

/// The application-level payload of an `Operation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Payload {
    Add { key: Key, value: Value },
    Remove { key: Key },
}

impl Payload {
    pub fn kind(&self) -> OpKind {
        match self {
            Payload::Add { .. } => OpKind::Add,
            Payload::Remove { .. } => OpKind::Remove,
        }
    }

    pub fn key(&self) -> &Key {
        match self {
            Payload::Add { key, .. } => key,
            Payload::Remove { key } => key,
        }
    }
}

/// An operation originated by some participant. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    timestamp: Timestamp,
    payload: Payload,
}

impl Operation {
    /// Creates a new `Operation`.
    pub fn new(timestamp: Timestamp, payload: Payload) -> Self {
        Self { timestamp, payload }
    }

    /// Creates a new `Add` operation.
    pub fn add<K, V>(timestamp: Timestamp, key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        let payload = Payload::Add {
            key: key.into(),
            value: value.into(),
        };
        Self::new(timestamp, payload)
    }

    /// Creates a new `Remove` operation.
    pub fn remove<K: Into<Key>>(timestamp: Timestamp, key: K) -> Self {
        let payload = Payload::Remove { key: key.into() };
        Self::new(timestamp, payload)
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> OpKind {
        self.payload.kind()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Add { key, value } => {
                write!(f, "{} add {}={}", self.timestamp, key, value)
            }
            Payload::Remove { key } => {
                write!(f, "{} remove {}", self.timestamp, key)
            }
        }
    }
}
