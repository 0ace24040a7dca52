use chrono::NaiveTime;
use itertools::Itertools;
use std::collections::{BTreeSet, HashSet};

use crate::clock::{self, ClockRange};
use crate::data::TimeslotRow;
use crate::error::{Warning, WarningLog};

/// Position of a timeslot in the model's timeslot list.
pub type SlotIdx = usize;

/// A fixed daily time window. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeslot {
    pub id: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Timeslot {
    pub fn new(id: impl Into<String>, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            id: id.into(),
            start,
            end,
        }
    }

    pub fn duration_minutes(&self) -> u32 {
        clock::minute_of_day(self.end).saturating_sub(clock::minute_of_day(self.start))
    }

    /// Strict interval intersection.
    pub fn overlaps(&self, other: &Timeslot) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }

    /// `[start, end]` lies inside `[from, to]`.
    pub fn within(&self, from: NaiveTime, to: NaiveTime) -> bool {
        self.start >= from && self.end <= to
    }
}

/// Builds timeslots from raw rows. Unparseable, non-positive and duplicate
/// rows are dropped with a warning.
pub fn timeslots_from_rows(rows: &[TimeslotRow], warnings: &mut WarningLog) -> Vec<Timeslot> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut slots = Vec::with_capacity(rows.len());

    for row in rows {
        let slot_id = row.slot_id.trim();
        let dropped = |detail: String| Warning::MalformedTime {
            source: "timeslot".to_string(),
            detail: format!("slot_id={slot_id} {detail}"),
        };

        match clock::parse_range(&row.start_time, &row.end_time) {
            ClockRange::Valid(start, end) => {
                if !seen.insert(slot_id) {
                    warnings.push(dropped("duplicates an earlier slot id".to_string()));
                    continue;
                }
                slots.push(Timeslot::new(slot_id, start, end));
            }
            ClockRange::Missing => warnings.push(dropped(format!(
                "has empty time: start={:?} end={:?}",
                row.start_time, row.end_time
            ))),
            ClockRange::Unparseable(detail) => {
                warnings.push(dropped(format!("has unparseable time: {detail}")))
            }
            ClockRange::NonPositive(start, end) => warnings.push(dropped(format!(
                "has non-positive duration: start={start} end={end}"
            ))),
        }
    }
    slots
}

/// Symmetric, reflexive overlap relation over timeslots, independent of day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictGraph {
    adjacency: Vec<BTreeSet<SlotIdx>>,
}

impl ConflictGraph {
    pub fn build(timeslots: &[Timeslot]) -> Self {
        let mut adjacency: Vec<BTreeSet<SlotIdx>> =
            (0..timeslots.len()).map(|i| BTreeSet::from([i])).collect();

        for ((a, ta), (b, tb)) in timeslots.iter().enumerate().tuple_combinations() {
            if ta.overlaps(tb) {
                adjacency[a].insert(b);
                adjacency[b].insert(a);
            }
        }
        Self { adjacency }
    }

    #[inline]
    pub fn conflicts(&self, a: SlotIdx, b: SlotIdx) -> bool {
        self.adjacency
            .get(a)
            .is_some_and(|neighbours| neighbours.contains(&b))
    }

}
