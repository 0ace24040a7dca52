//! Mutable search state.
//!
//! All mutation goes through [`SearchState::place`] and
//! [`SearchState::remove`], which are exact inverses: occupancy and running
//! durations always equal the aggregate of the current assignment.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::availability::DayIdx;
use crate::model::{Candidate, Problem, ReqIdx, VarIdx};
use crate::timeslot::SlotIdx;

/// Per-day map from a resource to the timeslots it currently holds.
/// Slots are counted so that a place/remove round trip is exact even for
/// a placement that was never checked for feasibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occupancy {
    by_day: Vec<HashMap<usize, BTreeMap<SlotIdx, u32>>>,
}

impl Occupancy {
    pub fn new(days: usize) -> Self {
        Self {
            by_day: vec![HashMap::new(); days],
        }
    }

    pub fn occupy(&mut self, day: DayIdx, resource: usize, slot: SlotIdx) {
        *self.by_day[day]
            .entry(resource)
            .or_default()
            .entry(slot)
            .or_insert(0) += 1;
    }

    pub fn release(&mut self, day: DayIdx, resource: usize, slot: SlotIdx) {
        let held = &mut self.by_day[day];
        let Some(slots) = held.get_mut(&resource) else {
            return;
        };
        if let Some(count) = slots.get_mut(&slot) {
            *count -= 1;
            if *count == 0 {
                slots.remove(&slot);
            }
        }
        if slots.is_empty() {
            held.remove(&resource);
        }
    }

    /// Timeslots held by `resource` on `day`.
    pub fn slots(&self, day: DayIdx, resource: usize) -> impl Iterator<Item = SlotIdx> + '_ {
        self.by_day[day]
            .get(&resource)
            .into_iter()
            .flat_map(|slots| slots.keys().copied())
    }

    /// Number of resources holding exactly `slot` on `day`.
    pub fn holders(&self, day: DayIdx, slot: SlotIdx) -> usize {
        self.by_day[day]
            .values()
            .filter(|slots| slots.contains_key(&slot))
            .count()
    }

    /// Resource -> held slots for one day, ordered by resource index.
    pub fn snapshot(&self, day: DayIdx) -> BTreeMap<usize, BTreeSet<SlotIdx>> {
        self.by_day[day]
            .iter()
            .map(|(&resource, slots)| (resource, slots.keys().copied().collect()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_day.iter().all(HashMap::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    assignment: Vec<Option<Candidate>>,
    running_minutes: Vec<u32>,
    assigned_count: Vec<u32>,
    placed: usize,
    sections: Occupancy,
    teachers: Occupancy,
    rooms: Occupancy,
}

impl SearchState {
    pub fn new(problem: &Problem) -> Self {
        let days = problem.days.len();
        Self {
            assignment: vec![None; problem.variables.len()],
            running_minutes: vec![0; problem.requirements.len()],
            assigned_count: vec![0; problem.requirements.len()],
            placed: 0,
            sections: Occupancy::new(days),
            teachers: Occupancy::new(days),
            rooms: Occupancy::new(days),
        }
    }

    pub fn place(&mut self, problem: &Problem, var: VarIdx, candidate: Candidate) {
        debug_assert!(self.assignment[var].is_none(), "variable {var} placed twice");
        let req_idx = problem.variables[var].requirement;
        let req = &problem.requirements[req_idx];

        self.assignment[var] = Some(candidate);
        self.running_minutes[req_idx] += problem.slot_minutes(candidate.slot);
        self.assigned_count[req_idx] += 1;
        self.placed += 1;

        self.sections
            .occupy(candidate.day, req.section_idx, candidate.slot);
        self.teachers
            .occupy(candidate.day, req.teacher_idx, candidate.slot);
        if let Some(room) = problem.physical_room(candidate.room) {
            self.rooms.occupy(candidate.day, room, candidate.slot);
        }
    }

    /// Undoes the placement of `var`, returning the value it held.
    pub fn remove(&mut self, problem: &Problem, var: VarIdx) -> Option<Candidate> {
        let candidate = self.assignment[var].take()?;
        let req_idx = problem.variables[var].requirement;
        let req = &problem.requirements[req_idx];

        self.running_minutes[req_idx] -= problem.slot_minutes(candidate.slot);
        self.assigned_count[req_idx] -= 1;
        self.placed -= 1;

        self.sections
            .release(candidate.day, req.section_idx, candidate.slot);
        self.teachers
            .release(candidate.day, req.teacher_idx, candidate.slot);
        if let Some(room) = problem.physical_room(candidate.room) {
            self.rooms.release(candidate.day, room, candidate.slot);
        }
        Some(candidate)
    }

    #[inline]
    pub fn is_assigned(&self, var: VarIdx) -> bool {
        self.assignment[var].is_some()
    }

    #[inline]
    pub fn running_minutes(&self, req: ReqIdx) -> u32 {
        self.running_minutes[req]
    }

    #[inline]
    pub fn assigned_count(&self, req: ReqIdx) -> u32 {
        self.assigned_count[req]
    }

    /// Number of variables currently holding a value.
    #[inline]
    pub fn placed_count(&self) -> usize {
        self.placed
    }

    pub fn assigned(&self) -> impl Iterator<Item = (VarIdx, Candidate)> + '_ {
        self.assignment
            .iter()
            .enumerate()
            .filter_map(|(var, value)| value.map(|c| (var, c)))
    }

    /// Days on which `req` already has a meeting.
    pub fn days_used_by(&self, problem: &Problem, req: ReqIdx) -> Vec<DayIdx> {
        problem.requirements[req]
            .variables
            .clone()
            .filter_map(|var| self.assignment[var].map(|c| c.day))
            .collect()
    }

    pub fn sections(&self) -> &Occupancy {
        &self.sections
    }

    pub fn teachers(&self) -> &Occupancy {
        &self.teachers
    }

    pub fn rooms(&self) -> &Occupancy {
        &self.rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::AvailabilityIndex;
    use crate::model::tests::{req_row, two_hour_slots, week};

    fn problem() -> Problem {
        let rows = vec![
            req_row("CS101", "A", "Reyes", 2, 2.0, &["Room-101"]),
            req_row("CS102", "B", "Reyes", 1, 1.0, &["Online-1"]),
        ];
        Problem::build(
            week(&["Mon", "Tue"]),
            two_hour_slots(),
            &rows,
            &AvailabilityIndex::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_place_updates_every_map() {
        let problem = problem();
        let mut state = SearchState::new(&problem);
        let candidate = problem.domain(0)[0];
        state.place(&problem, 0, candidate);

        assert_eq!(state.assigned().collect::<Vec<_>>(), vec![(0, candidate)]);
        assert_eq!(state.running_minutes(0), 60);
        assert_eq!(state.assigned_count(0), 1);
        assert_eq!(state.sections().slots(candidate.day, 0).collect::<Vec<_>>(), vec![candidate.slot]);
        assert_eq!(state.teachers().holders(candidate.day, candidate.slot), 1);
        assert_eq!(state.rooms().holders(candidate.day, candidate.slot), 1);
        assert_eq!(state.days_used_by(&problem, 0), vec![candidate.day]);
    }

    #[test]
    fn test_virtual_room_is_not_tracked() {
        let problem = problem();
        let mut state = SearchState::new(&problem);
        state.place(&problem, 2, problem.domain(2)[0]);
        assert!(state.rooms().is_empty());
        assert!(!state.teachers().is_empty());
    }

    #[test]
    fn test_place_then_remove_is_noop() {
        let problem = problem();
        let mut state = SearchState::new(&problem);
        state.place(&problem, 0, problem.domain(0)[1]);
        let before = state.clone();

        for var in 1..problem.variables.len() {
            for &candidate in problem.domain(var) {
                state.place(&problem, var, candidate);
                assert_eq!(state.remove(&problem, var), Some(candidate));
                assert_eq!(state, before);
            }
        }
    }

    #[test]
    fn test_round_trip_exact_even_when_clashing() {
        let problem = problem();
        let mut state = SearchState::new(&problem);
        let candidate = problem.domain(0)[0];
        state.place(&problem, 0, candidate);
        let before = state.clone();

        // same day, slot and room as var 0: not feasible, still invertible
        state.place(&problem, 1, candidate);
        state.remove(&problem, 1);
        assert_eq!(state, before);
        assert_eq!(state.remove(&problem, 1), None);
    }
}
