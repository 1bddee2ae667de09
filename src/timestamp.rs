use crate::id::ParticipantId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The causal position of an operation: the `sequence`-th operation originated
/// by `participant`. Sequences start at 0.
///
/// The "none" timestamp (nothing seen yet from some participant) is
/// represented by `None` wherever an `Option<Timestamp>` is expected.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    participant: ParticipantId,
    sequence: u64,
}

impl Timestamp {
    /// Creates a new `Timestamp`.
    pub fn new<P: Into<ParticipantId>>(participant: P, sequence: u64) -> Self {
        Self {
            participant: participant.into(),
            sequence,
        }
    }

    /// Creates the timestamp of the first operation originated by
    /// `participant`.
    pub fn first<P: Into<ParticipantId>>(participant: P) -> Self {
        Self::new(participant, 0)
    }

    /// Retrieves the participant that originated this `Timestamp`.
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Retrieves the sequence of this `Timestamp`.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the timestamp that immediately follows `last`, where `last` is
    /// the latest timestamp known from `participant` (if any).
    pub fn successor(participant: &ParticipantId, last: Option<&Self>) -> Self {
        match last {
            Some(last) => {
                debug_assert_eq!(last.participant(), participant);
                Self::new(participant.clone(), last.sequence + 1)
            }
            None => Self::first(participant.clone()),
        }
    }

    /// Checks whether `self` is exactly the successor of `last`.
    pub fn follows(&self, last: Option<&Self>) -> bool {
        match last {
            Some(last) => {
                self.participant == last.participant
                    && self.sequence == last.sequence + 1
            }
            None => self.sequence == 0,
        }
    }

    /// Compares `self` with `other`, where `None` stands for "none" and is
    /// older than any concrete timestamp.
    ///
    /// Both timestamps are expected to come from the same participant.
    pub fn compare(&self, other: Option<&Self>) -> Ordering {
        compare(Some(self), other)
    }
}

/// Compares two (maybe "none") timestamps from the same participant:
/// - "none" vs "none" is `Equal`
/// - concrete vs "none" is `Greater`
/// - otherwise, sequences are compared
pub fn compare(a: Option<&Timestamp>, b: Option<&Timestamp>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(a), Some(b)) => {
            debug_assert_eq!(
                a.participant, b.participant,
                "timestamps from different participants are not comparable"
            );
            a.sequence.cmp(&b.sequence)
        }
    }
}

/// Returns the newest of two (maybe "none") timestamps.
pub fn max<'a>(
    a: Option<&'a Timestamp>,
    b: Option<&'a Timestamp>,
) -> Option<&'a Timestamp> {
    match compare(a, b) {
        Ordering::Less => b,
        _ => a,
    }
}

/// Returns the oldest of two (maybe "none") timestamps.
pub fn min<'a>(
    a: Option<&'a Timestamp>,
    b: Option<&'a Timestamp>,
) -> Option<&'a Timestamp> {
    match compare(a, b) {
        Ordering::Greater => b,
        _ => a,
    }
}

// timestamps from different participants don't compare
impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.participant == other.participant {
            Some(self.sequence.cmp(&other.sequence))
        } else {
            None
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.participant, self.sequence)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.participant, self.sequence)
    }
}
