use crate::clock::{TimestampMatrix, TimestampVector};
use crate::config::Config;
use crate::id::{ParticipantId, SessionId, SessionIdGen};
use crate::log::Log;
use crate::operation::{Operation, Payload};
use crate::store::Store;
use crate::timestamp::Timestamp;
use crate::trace;
use parking_lot::Mutex;
use std::sync::Arc;

/// What a session commit changed in the replica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Commit {
    /// operations inserted in the log (and applied to the store)
    pub applied: usize,
    /// operations received but rejected by the log
    pub rejected: usize,
    /// operations removed from the log by garbage collection
    pub purged: usize,
}

/// A handle to the state of one replica. Clones share the same state.
///
/// The log, the summary, the acknowledgment matrix and the store are guarded
/// by a single lock, so that multi-field sequences (e.g. snapshotting the
/// summary together with the operations it covers) are never interleaved with
/// local writes or with other sessions. The lock is never held across I/O.
#[derive(Debug)]
pub struct Replica<S> {
    id: ParticipantId,
    purge: bool,
    session_ids: SessionIdGen,
    state: Arc<Mutex<ReplicaState<S>>>,
}

#[derive(Debug)]
struct ReplicaState<S> {
    log: Log,
    summary: TimestampVector,
    ack: TimestampMatrix,
    store: S,
}

impl<S> Clone for Replica<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            purge: self.purge,
            session_ids: self.session_ids.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S> Replica<S>
where
    S: Store,
{
    /// Creates a new `Replica` with an empty log.
    pub fn new(config: &Config, store: S) -> Self {
        let participants = config.participants();
        let state = ReplicaState {
            log: Log::new(participants.iter().cloned()),
            summary: TimestampVector::new(participants.iter().cloned()),
            ack: TimestampMatrix::new(participants.iter().cloned()),
            store,
        };
        Self {
            id: config.id().clone(),
            purge: config.purge(),
            session_ids: SessionIdGen::new(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Retrieves the identifier of this replica.
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Generates the identifier of a new session started by this replica.
    pub fn next_session_id(&self) -> SessionId {
        self.session_ids.next_id()
    }

    /// Originates a new operation at this replica: the operation is logged,
    /// applied to the store and recorded in the summary.
    pub fn submit(&self, payload: Payload) -> Operation {
        let mut state = self.state.lock();

        let last = state.log.last(&self.id);
        let timestamp = Timestamp::successor(&self.id, last);
        let op = Operation::new(timestamp, payload);

        let added = state.log.add(op.clone());
        debug_assert!(added, "local operations should always be logged");
        if added {
            state.store.apply(op.payload());
            state.summary.record(op.timestamp());
            let summary = state.summary.clone();
            state.ack.update(&self.id, summary);
        }
        trace!("[replica {}] submitted {}", self.id, op);
        op
    }

    /// Returns a copy of the summary and of the acknowledgment matrix. The own
    /// row of the matrix is refreshed with the current summary.
    pub fn snapshot(&self) -> (TimestampVector, TimestampMatrix) {
        let mut state = self.state.lock();
        Self::do_snapshot(&self.id, &mut state)
    }

    /// Returns the operations `partner_summary` is missing, together with a
    /// snapshot of the summary and the acknowledgment matrix. Both are taken
    /// atomically, so the summary never covers operations not returned.
    pub fn snapshot_newer(
        &self,
        partner_summary: &TimestampVector,
    ) -> (Vec<Operation>, TimestampVector, TimestampMatrix) {
        let mut state = self.state.lock();
        let newer = state.log.list_newer(partner_summary);
        let (summary, ack) = Self::do_snapshot(&self.id, &mut state);
        (newer, summary, ack)
    }

    /// Returns the operations `partner_summary` is missing.
    pub fn list_newer(
        &self,
        partner_summary: &TimestampVector,
    ) -> Vec<Operation> {
        self.state.lock().log.list_newer(partner_summary)
    }

    /// Commits the outcome of a successful session:
    /// - operations are inserted in the log; those inserted are applied to
    ///   the store, the others are dropped
    /// - the partner's summary (and acknowledgment matrix, if any) are merged
    /// - if enabled, operations known by all participants are purged
    pub fn commit(
        &self,
        ops: Vec<Operation>,
        partner_summary: &TimestampVector,
        partner_ack: Option<&TimestampMatrix>,
    ) -> Commit {
        let mut commit = Commit::default();
        let mut state = self.state.lock();

        for op in ops {
            let payload = op.payload().clone();
            if state.log.add(op) {
                state.store.apply(&payload);
                commit.applied += 1;
            } else {
                commit.rejected += 1;
            }
        }

        state.summary.update_max(partner_summary);
        if let Some(partner_ack) = partner_ack {
            state.ack.update_max(partner_ack);
        }
        let summary = state.summary.clone();
        state.ack.update(&self.id, summary);

        if self.purge {
            let state = &mut *state;
            commit.purged = state.log.purge(&state.ack);
        }
        commit
    }

    /// Returns a copy of the summary.
    pub fn summary(&self) -> TimestampVector {
        self.state.lock().summary.clone()
    }

    /// Returns a copy of the acknowledgment matrix.
    pub fn ack(&self) -> TimestampMatrix {
        self.state.lock().ack.clone()
    }

    /// Returns a copy of the log.
    pub fn log(&self) -> Log {
        self.state.lock().log.clone()
    }

    /// Runs `inspect` over the store.
    pub fn inspect<F, R>(&self, inspect: F) -> R
    where
        F: FnOnce(&S) -> R,
    {
        inspect(&self.state.lock().store)
    }

    fn do_snapshot(
        id: &ParticipantId,
        state: &mut ReplicaState<S>,
    ) -> (TimestampVector, TimestampMatrix) {
        let summary = state.summary.clone();
        state.ack.update(id, summary.clone());
        (summary, state.ack.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KVStore;

    fn replica(id: &str) -> Replica<KVStore> {
        let config = Config::new(id, vec!["A", "B"]);
        Replica::new(&config, KVStore::new())
    }

    fn add(key: &str, value: &str) -> Payload {
        Payload::Add {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn submit() {
        let a = replica("A");

        let op0 = a.submit(add("x", "1"));
        let op1 = a.submit(add("y", "2"));
        assert_eq!(op0.timestamp(), &Timestamp::new("A", 0));
        assert_eq!(op1.timestamp(), &Timestamp::new("A", 1));

        // the operations are logged, applied and summarized
        assert_eq!(a.log().ops("A"), &[op0, op1]);
        assert_eq!(a.inspect(|store| store.len()), 2);
        assert_eq!(a.summary().get_last("A"), Some(&Timestamp::new("A", 1)));

        // our own row of the ack matrix follows the summary
        assert_eq!(a.ack().get("A"), Some(&a.summary()));
    }

    #[test]
    fn commit_applies_each_operation_once() {
        let a = replica("A");
        let b = replica("B");

        b.submit(add("x", "1"));
        b.submit(add("x", "2"));
        let (newer, summary, ack) = b.snapshot_newer(&a.summary());
        assert_eq!(newer.len(), 2);

        let commit = a.commit(newer.clone(), &summary, Some(&ack));
        assert_eq!(commit.applied, 2);
        assert_eq!(commit.rejected, 0);
        assert_eq!(a.summary(), summary);

        let x = String::from("x");
        let value = a.inspect(|store| store.get(&x).cloned());
        assert_eq!(value, Some(String::from("2")));

        // a second delivery of the same operations is dropped
        let commit = a.commit(newer, &summary, Some(&ack));
        assert_eq!(commit.applied, 0);
        assert_eq!(commit.rejected, 2);
        assert_eq!(a.log().last("B"), Some(&Timestamp::new("B", 1)));
        assert_eq!(a.inspect(|store| store.len()), 1);
    }

    #[test]
    fn commit_applies_removals() {
        let a = replica("A");
        let b = replica("B");

        b.submit(add("x", "1"));
        b.submit(Payload::Remove {
            key: String::from("x"),
        });
        let (newer, summary, ack) = b.snapshot_newer(&a.summary());

        // both operations are logged and applied in order
        let commit = a.commit(newer, &summary, Some(&ack));
        assert_eq!(commit.applied, 2);
        assert_eq!(a.log().last("B"), Some(&Timestamp::new("B", 1)));
        assert!(a.inspect(|store| store.is_empty()));
        assert_eq!(a.inspect(|store| store.clone()), b.inspect(|s| s.clone()));
    }

    #[test]
    fn commit_merges_ack_and_purges() {
        let a = replica("A");
        let b = replica("B");

        a.submit(add("x", "1"));
        a.submit(add("y", "1"));

        // b gets both operations from a
        let (newer, a_summary, a_ack) = a.snapshot_newer(&b.summary());
        let commit = b.commit(newer, &a_summary, Some(&a_ack));
        assert_eq!(commit.applied, 2);
        // b knows that both replicas have seen A:1, so A:0 can go
        assert_eq!(commit.purged, 1);

        // a learns that b has seen A:1; A:0 is now known by all
        let (_, b_summary, b_ack) = b.snapshot_newer(&a.summary());
        let commit = a.commit(Vec::new(), &b_summary, Some(&b_ack));
        assert_eq!(commit.purged, 1);
        let expected = Operation::add(Timestamp::new("A", 1), "y", "1");
        assert_eq!(a.log().ops("A"), &[expected]);

        // local writes still work after purging
        let op = a.submit(add("z", "1"));
        assert_eq!(op.timestamp(), &Timestamp::new("A", 2));
    }

    #[test]
    fn commit_without_ack() {
        let mut config = Config::new("A", vec!["A", "B"]);
        config.set_purge(false);
        let a = Replica::new(&config, KVStore::new());
        let b = replica("B");

        b.submit(add("x", "1"));
        let (newer, summary, _) = b.snapshot_newer(&a.summary());
        let commit = a.commit(newer, &summary, None);
        assert_eq!(commit.applied, 1);
        assert_eq!(commit.purged, 0);
        let bottom = TimestampVector::new(vec!["A", "B"]);
        assert_eq!(a.ack().get("B"), Some(&bottom));
        assert_eq!(a.log().len(), 1);
    }
}
