//! Nearest-timestamp lookup
//!
//! Entries are keyed by `(TimeKey, seq)`: the timestamp, then arrival order,
//! so repeated timestamps stay distinct and ordered.
//!
//! For a query at `t`:
//!
//! ```text
//!   Past    last entry with key <= t
//!   Future  first entry with key >= t
//!   Both    the closer of (last key < t, first key >= t); ties go to the later
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::element::Timestamp;

/// Which side of the query timestamp a match may come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    Past,
    Future,
    #[default]
    Both,
}

/// Totally ordered timestamp.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TimeKey(Timestamp);

impl TimeKey {
    pub(crate) fn new(timestamp: Timestamp) -> Self {
        // -0.0 and 0.0 are the same instant.
        Self(timestamp + 0.0)
    }

    pub(crate) fn get(self) -> Timestamp {
        self.0
    }
}

impl PartialEq for TimeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

pub(crate) type EntryKey = (TimeKey, u64);

/// Lowest key any entry at `t` can have.
pub(crate) fn first_at(t: TimeKey) -> EntryKey {
    (t, 0)
}

/// Highest key any entry at `t` can have.
pub(crate) fn last_at(t: TimeKey) -> EntryKey {
    (t, u64::MAX)
}

/// Entry closest to `t` in the given direction.
pub(crate) fn closest<V>(
    entries: &BTreeMap<EntryKey, V>,
    t: TimeKey,
    direction: Direction,
) -> Option<(&EntryKey, &V)> {
    match direction {
        Direction::Past => entries.range((Unbounded, Included(last_at(t)))).next_back(),
        Direction::Future => entries.range((Included(first_at(t)), Unbounded)).next(),
        Direction::Both => {
            let succ = entries.range((Included(first_at(t)), Unbounded)).next();
            let pred = entries
                .range((Unbounded, Excluded(first_at(t))))
                .next_back();
            match (pred, succ) {
                (None, succ) => succ,
                (pred, None) => pred,
                (Some(pred), Some(succ)) => {
                    let ahead = succ.0 .0.get() - t.get();
                    let behind = t.get() - pred.0 .0.get();
                    if ahead > behind {
                        Some(pred)
                    } else {
                        Some(succ)
                    }
                }
            }
        }
    }
}
