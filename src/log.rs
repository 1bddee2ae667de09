use crate::clock::{TimestampMatrix, TimestampVector};
use crate::id::ParticipantId;
use crate::operation::Operation;
use crate::timestamp::Timestamp;
use crate::trace;
use crate::HashMap;
use std::fmt;

/// The operations known by a replica, one sequence per originating
/// participant.
///
/// Each sequence is strictly increasing and has no gaps, except for the prefix
/// removed by `purge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    log: HashMap<ParticipantId, Sequence>,
}

// the operations from a single participant; `last` survives purges so that
// insertion can resume after the whole sequence was purged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Sequence {
    ops: Vec<Operation>,
    last: Option<Timestamp>,
}

impl Log {
    /// Creates an empty `Log` for the given set of participants.
    pub fn new<I>(participants: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ParticipantId>,
    {
        let log = participants
            .into_iter()
            .map(|participant| (participant.into(), Sequence::default()))
            .collect();
        Self { log }
    }

    /// Inserts `op` in the log. This only succeeds if `op` is the successor of
    /// the last operation logged from the same participant (or the first
    /// operation from that participant if none was logged yet).
    ///
    /// Returns whether the operation was inserted: `false` means it was
    /// either already seen or not yet deliverable.
    #[must_use]
    pub fn add(&mut self, op: Operation) -> bool {
        let sequence = match self.log.get_mut(op.timestamp().participant()) {
            Some(sequence) => sequence,
            None => {
                trace!("[log] unknown participant in {}", op);
                return false;
            }
        };

        if op.timestamp().follows(sequence.last.as_ref()) {
            trace!("[log] inserted {}", op);
            sequence.last = Some(op.timestamp().clone());
            sequence.ops.push(op);
            true
        } else {
            trace!("[log] rejected {} | last: {:?}", op, sequence.last);
            false
        }
    }

    /// Returns the last timestamp logged from `participant`, even if it was
    /// already purged.
    pub fn last(&self, participant: &str) -> Option<&Timestamp> {
        self.log
            .get(participant)
            .and_then(|sequence| sequence.last.as_ref())
    }

    /// Returns the operations newer than the ones in `summary`. Operations
    /// from the same participant are returned in the order they were logged.
    pub fn list_newer(&self, summary: &TimestampVector) -> Vec<Operation> {
        self.log
            .iter()
            .flat_map(|(participant, sequence)| {
                let ops = &sequence.ops;
                let seen = summary.get_last(participant);
                // since each sequence is ordered, skip the prefix already seen
                let start = ops
                    .partition_point(|op| op.timestamp().compare(seen).is_le());
                ops[start..].iter().cloned()
            })
            .collect()
    }

    /// Removes the operations that every participant is known to have seen,
    /// according to `ack`. Returns the number of operations removed.
    pub fn purge(&mut self, ack: &TimestampMatrix) -> usize {
        let min = ack.min_timestamp_vector();
        self.log
            .iter_mut()
            .map(|(participant, sequence)| {
                let ops = &mut sequence.ops;
                let known_by_all = match min.get_last(participant) {
                    Some(timestamp) => timestamp,
                    None => return 0,
                };
                let before = ops.len();
                ops.retain(|op| {
                    op.timestamp().compare(Some(known_by_all)).is_ge()
                });
                before - ops.len()
            })
            .sum()
    }

    /// Returns the number of operations in the log.
    pub fn len(&self) -> usize {
        self.log.values().map(|sequence| sequence.ops.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.log.values().all(|sequence| sequence.ops.is_empty())
    }

    /// Returns the operations logged from `participant`, in order.
    pub fn ops(&self, participant: &str) -> &[Operation] {
        self.log
            .get(participant)
            .map(|sequence| sequence.ops.as_slice())
            .unwrap_or_default()
    }
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in self.log.values().flat_map(|sequence| &sequence.ops) {
            writeln!(f, "{}", op)?;
        }
        Ok(())
    }
}
