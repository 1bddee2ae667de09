use super::TimestampVector;
use crate::id::ParticipantId;
use crate::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One replica's belief of every participant's summary: row `p` is the
/// `TimestampVector` that participant `p` is known to have reached.
///
/// Rows are fixed at construction: each row covers the same participants as
/// the matrix and no merge creates new rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampMatrix {
    rows: HashMap<ParticipantId, TimestampVector>,
}

impl TimestampMatrix {
    /// Creates a new `TimestampMatrix` where every row is an all-"none"
    /// `TimestampVector`.
    pub fn new<I>(participants: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ParticipantId>,
    {
        let participants: Vec<ParticipantId> =
            participants.into_iter().map(Into::into).collect();
        let rows = participants
            .iter()
            .map(|participant| {
                let row = TimestampVector::new(participants.iter().cloned());
                (participant.clone(), row)
            })
            .collect();
        Self { rows }
    }

    /// Returns the row of `participant`, if it's part of the matrix.
    pub fn get(&self, participant: &str) -> Option<&TimestampVector> {
        self.rows.get(participant)
    }

    /// Merges `other` into `self`, row by row, taking the elementwise maximum.
    /// Rows that only exist in `other` are ignored.
    pub fn update_max(&mut self, other: &Self) {
        self.rows.iter_mut().for_each(|(participant, row)| {
            if let Some(other_row) = other.rows.get(participant) {
                row.update_max(other_row);
            }
        });
    }

    /// Replaces the row of `participant` with `vector`. Participants outside
    /// the matrix are ignored.
    pub fn update(&mut self, participant: &str, vector: TimestampVector) {
        if let Some(row) = self.rows.get_mut(participant) {
            *row = vector;
        }
    }

    /// Computes, for each participant, the newest timestamp that every
    /// participant is known to have seen. Operations older than it can be
    /// safely discarded.
    pub fn min_timestamp_vector(&self) -> TimestampVector {
        let mut rows = self.rows.values();
        match rows.next() {
            Some(first) => {
                let mut min = first.clone();
                rows.for_each(|row| min.merge_min(row));
                min
            }
            None => TimestampVector::new(Vec::<ParticipantId>::new()),
        }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for TimestampMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rows: Vec<_> = self.rows.iter().collect();
        rows.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        for (participant, row) in rows {
            writeln!(f, "{}: {}", participant, row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::Timestamp;

    // create a row for participants A and B
    fn row(a: Option<u64>, b: Option<u64>) -> TimestampVector {
        let mut row = TimestampVector::new(vec!["A", "B"]);
        if let Some(a) = a {
            row.record(&Timestamp::new("A", a));
        }
        if let Some(b) = b {
            row.record(&Timestamp::new("B", b));
        }
        row
    }

    #[test]
    fn new_matrix_is_bottom() {
        let matrix = TimestampMatrix::new(vec!["A", "B"]);
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.get("A"), Some(&row(None, None)));
        assert_eq!(matrix.get("B"), Some(&row(None, None)));
        assert_eq!(matrix.get("C"), None);
        assert_eq!(matrix.min_timestamp_vector(), row(None, None));
    }

    #[test]
    fn update_and_min() {
        let mut matrix = TimestampMatrix::new(vec!["A", "B"]);

        // A has seen A:3 and B:1; B has only seen A:1
        matrix.update("A", row(Some(3), Some(1)));
        assert_eq!(matrix.min_timestamp_vector(), row(None, None));

        matrix.update("B", row(Some(1), None));
        assert_eq!(matrix.min_timestamp_vector(), row(Some(1), None));

        // once B has seen B:2, B:1 is known by all
        matrix.update("B", row(Some(1), Some(2)));
        assert_eq!(matrix.min_timestamp_vector(), row(Some(1), Some(1)));

        // updating a row outside the matrix does nothing
        matrix.update("C", row(Some(7), Some(7)));
        assert_eq!(matrix.len(), 2);
    }

    #[test]
    fn update_max() {
        let mut m1 = TimestampMatrix::new(vec!["A", "B"]);
        m1.update("A", row(Some(3), None));
        m1.update("B", row(Some(1), Some(1)));

        let mut m2 = TimestampMatrix::new(vec!["A", "B"]);
        m2.update("A", row(Some(2), Some(2)));
        m2.update("B", row(None, Some(4)));

        m1.update_max(&m2);
        assert_eq!(m1.get("A"), Some(&row(Some(3), Some(2))));
        assert_eq!(m1.get("B"), Some(&row(Some(1), Some(4))));
    }

    #[test]
    fn update_max_creates_no_rows() {
        let mut m1 = TimestampMatrix::new(vec!["A"]);
        let m2 = TimestampMatrix::new(vec!["A", "B"]);
        m1.update_max(&m2);
        assert_eq!(m1.len(), 1);
        assert_eq!(m1.get("B"), None);
    }

    #[test]
    fn clone_is_deep() {
        let mut m1 = TimestampMatrix::new(vec!["A", "B"]);
        let m2 = m1.clone();
        assert_eq!(m1, m2);

        // mutating the original leaves the clone untouched
        m1.update("A", row(Some(1), None));
        assert_ne!(m1, m2);
        assert_eq!(m2.get("A"), Some(&row(None, None)));
    }
}
