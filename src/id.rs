use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// participant ids
pub type ParticipantId = String;

// session ids; only used for tracing
pub type SessionId = u64;

#[derive(Clone, Debug, Default)]
pub struct SessionIdGen {
    last_session: Arc<AtomicU64>,
}

impl SessionIdGen {
    /// Creates a new generator of `SessionId`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Generates the next `SessionId`.
    pub fn next_id(&self) -> SessionId {
        let previous = self.last_session.fetch_add(1, Ordering::Relaxed);
        previous + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_id() {
        // create id generator
        let gen = SessionIdGen::new();

        // check the `id` generated for `id_count` ids
        let id_count = 100;

        for expected in 1..=id_count {
            assert_eq!(gen.next_id(), expected);
        }
    }

    #[test]
    fn shared_next_id() {
        // clones share the same sequence
        let gen = SessionIdGen::new();
        let other = gen.clone();

        assert_eq!(gen.next_id(), 1);
        assert_eq!(other.next_id(), 2);
        assert_eq!(gen.next_id(), 3);
    }
}
