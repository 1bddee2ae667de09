use crate::id::ParticipantId;
use crate::timestamp::{self, Timestamp};
use crate::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maps each participant to the latest `Timestamp` known from it (or to "none"
/// if nothing is known yet).
///
/// The set of participants is fixed at construction: merges never add or
/// remove entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampVector {
    clock: HashMap<ParticipantId, Option<Timestamp>>,
}

impl TimestampVector {
    /// Creates a new `TimestampVector` where every participant is mapped to
    /// "none".
    pub fn new<I>(participants: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ParticipantId>,
    {
        let clock = participants
            .into_iter()
            .map(|participant| (participant.into(), None))
            .collect();
        Self { clock }
    }

    /// Returns the latest timestamp known from `participant`. Unknown
    /// participants, as well as entries holding a timestamp originated by some
    /// other participant (only possible in vectors received from a partner),
    /// are reported as "none".
    pub fn get_last(&self, participant: &str) -> Option<&Timestamp> {
        self.clock
            .get(participant)
            .and_then(Option::as_ref)
            .filter(|last| last.participant() == participant)
    }

    /// Records `timestamp` if it's newer than the one currently known from its
    /// participant.
    pub fn record(&mut self, timestamp: &Timestamp) {
        if let Some(current) = self.clock.get_mut(timestamp.participant()) {
            if timestamp.compare(current.as_ref()).is_gt() {
                *current = Some(timestamp.clone());
            }
        }
    }

    /// Merges `other` into `self` by keeping, for each participant, the newest
    /// of the two timestamps.
    pub fn update_max(&mut self, other: &Self) {
        self.merge_with(other, timestamp::max);
    }

    /// Merges `other` into `self` by keeping, for each participant, the oldest
    /// of the two timestamps.
    pub fn merge_min(&mut self, other: &Self) {
        self.merge_with(other, timestamp::min);
    }

    fn merge_with<F>(&mut self, other: &Self, pick: F)
    where
        F: for<'a> Fn(
            Option<&'a Timestamp>,
            Option<&'a Timestamp>,
        ) -> Option<&'a Timestamp>,
    {
        self.clock.iter_mut().for_each(|(participant, current)| {
            let picked = pick(current.as_ref(), other.get_last(participant))
                .cloned();
            *current = picked;
        });
    }

    /// Returns an iterator over all participants in this vector.
    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.clock.keys()
    }

    /// Returns an iterator over all (participant, latest timestamp) pairs.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&ParticipantId, Option<&Timestamp>)> {
        self.clock
            .iter()
            .map(|(participant, last)| (participant, last.as_ref()))
    }

    /// Returns the number of participants.
    pub fn len(&self) -> usize {
        self.clock.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clock.is_empty()
    }
}

impl fmt::Display for TimestampVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

        write!(f, "[")?;
        for (index, (participant, last)) in entries.into_iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            match last {
                Some(last) => write!(f, "{}", last)?,
                None => write!(f, "{}:-", participant)?,
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // create a vector with entries for participants A, B and C
    fn vector(
        a: Option<u64>,
        b: Option<u64>,
        c: Option<u64>,
    ) -> TimestampVector {
        let mut vector = TimestampVector::new(vec!["A", "B", "C"]);
        for (participant, sequence) in vec![("A", a), ("B", b), ("C", c)] {
            if let Some(sequence) = sequence {
                vector.record(&Timestamp::new(participant, sequence));
            }
        }
        vector
    }

    #[test]
    fn get_last() {
        let vector = vector(Some(2), None, Some(0));
        assert_eq!(vector.get_last("A"), Some(&Timestamp::new("A", 2)));
        assert_eq!(vector.get_last("B"), None);
        assert_eq!(vector.get_last("C"), Some(&Timestamp::new("C", 0)));

        // unknown participants are "none"
        assert_eq!(vector.get_last("D"), None);
    }

    #[test]
    fn record_never_goes_back() {
        let mut vector = vector(Some(2), None, None);
        vector.record(&Timestamp::new("A", 1));
        assert_eq!(vector.get_last("A"), Some(&Timestamp::new("A", 2)));

        vector.record(&Timestamp::new("A", 3));
        assert_eq!(vector.get_last("A"), Some(&Timestamp::new("A", 3)));

        // participants outside the vector are ignored
        vector.record(&Timestamp::new("D", 3));
        assert_eq!(vector.len(), 3);
        assert_eq!(vector.get_last("D"), None);
    }

    #[test]
    fn update_max() {
        let mut v1 = vector(Some(2), None, Some(1));
        let v2 = vector(Some(1), Some(4), None);

        v1.update_max(&v2);
        assert_eq!(v1, vector(Some(2), Some(4), Some(1)));
    }

    #[test]
    fn merge_min() {
        let mut v1 = vector(Some(2), None, Some(1));
        let v2 = vector(Some(1), Some(4), Some(3));

        v1.merge_min(&v2);
        assert_eq!(v1, vector(Some(1), None, Some(1)));
    }

    #[test]
    fn update_max_keeps_participants() {
        let mut v1 = TimestampVector::new(vec!["A"]);
        let mut v2 = TimestampVector::new(vec!["A", "B"]);
        v2.record(&Timestamp::new("B", 1));

        v1.update_max(&v2);
        assert_eq!(v1.len(), 1);
        assert_eq!(v1.get_last("B"), None);
    }

    #[test]
    fn foreign_entries_are_none() {
        let mut foreign = vector(None, None, None);
        foreign
            .clock
            .insert(String::from("A"), Some(Timestamp::new("B", 5)));
        assert_eq!(foreign.get_last("A"), None);

        // merging it changes nothing
        let mut local = vector(Some(1), None, None);
        local.update_max(&foreign);
        assert_eq!(local, vector(Some(1), None, None));
    }

    #[test]
    fn show() {
        let vector = vector(Some(2), None, Some(0));
        assert_eq!(format!("{}", vector), "[A:2, B:-, C:0]");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use quickcheck_macros::quickcheck;

    const PARTICIPANTS: [&str; 3] = ["A", "B", "C"];

    fn vector(entries: Vec<Option<u8>>) -> TimestampVector {
        let mut vector = TimestampVector::new(PARTICIPANTS);
        PARTICIPANTS
            .iter()
            .zip(entries)
            .for_each(|(participant, sequence)| {
                if let Some(sequence) = sequence {
                    let sequence = sequence as u64;
                    vector.record(&Timestamp::new(*participant, sequence));
                }
            });
        vector
    }

    #[quickcheck]
    fn update_max_with_self_is_idempotent(entries: Vec<Option<u8>>) -> bool {
        let v = vector(entries);
        let mut merged = v.clone();
        merged.update_max(&v);
        merged == v
    }

    #[quickcheck]
    fn clone_equals(entries: Vec<Option<u8>>) -> bool {
        let v = vector(entries);
        v.clone() == v
    }

    #[quickcheck]
    fn update_max_commutes(a: Vec<Option<u8>>, b: Vec<Option<u8>>) -> bool {
        let (a, b) = (vector(a), vector(b));

        let mut ab = a.clone();
        ab.update_max(&b);
        let mut ba = b.clone();
        ba.update_max(&a);
        ab == ba
    }

    #[quickcheck]
    fn merge_min_is_below_both(a: Vec<Option<u8>>, b: Vec<Option<u8>>) -> bool {
        let (a, b) = (vector(a), vector(b));
        let mut min = a.clone();
        min.merge_min(&b);

        PARTICIPANTS.iter().all(|participant| {
            let entry = min.get_last(participant);
            timestamp::compare(entry, a.get_last(participant)).is_le()
                && timestamp::compare(entry, b.get_last(participant)).is_le()
        })
    }
}
