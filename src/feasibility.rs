use crate::model::{Candidate, Problem, VarIdx};
use crate::state::{Occupancy, SearchState};

/// Which rule rejected a candidate. Checks run in this order and stop at
/// the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TeacherUnavailable,
    SectionClash,
    TeacherClash,
    RoomClash,
    MinimumUnreachable,
}

/// Admissibility of `candidate` for `var` against the live state.
pub fn check(
    problem: &Problem,
    state: &SearchState,
    var: VarIdx,
    candidate: Candidate,
) -> Result<(), Rejection> {
    let req_idx = problem.variables[var].requirement;
    let req = &problem.requirements[req_idx];
    let Candidate { day, slot, room } = candidate;

    if !problem.teacher_allows(req.teacher_idx, day, slot) {
        return Err(Rejection::TeacherUnavailable);
    }
    if clashes(problem, state.sections(), day, req.section_idx, slot) {
        return Err(Rejection::SectionClash);
    }
    // teachers clash across every course and section
    if clashes(problem, state.teachers(), day, req.teacher_idx, slot) {
        return Err(Rejection::TeacherClash);
    }
    if let Some(room) = problem.physical_room(room) {
        if clashes(problem, state.rooms(), day, room, slot) {
            return Err(Rejection::RoomClash);
        }
    }

    let remaining = req
        .slots_required
        .saturating_sub(state.assigned_count(req_idx))
        .saturating_sub(1);
    let reachable = state
        .running_minutes(req_idx)
        .saturating_add(problem.slot_minutes(slot))
        .saturating_add(remaining.saturating_mul(problem.max_slot_minutes));
    if reachable < req.min_minutes {
        return Err(Rejection::MinimumUnreachable);
    }
    Ok(())
}

#[inline]
pub fn is_feasible(problem: &Problem, state: &SearchState, var: VarIdx, candidate: Candidate) -> bool {
    check(problem, state, var, candidate).is_ok()
}

/// Feasible candidates of `var`, in domain order.
pub fn feasible_candidates(problem: &Problem, state: &SearchState, var: VarIdx) -> Vec<Candidate> {
    problem
        .domain(var)
        .iter()
        .copied()
        .filter(|&candidate| is_feasible(problem, state, var, candidate))
        .collect()
}

pub fn count_feasible(problem: &Problem, state: &SearchState, var: VarIdx) -> usize {
    problem
        .domain(var)
        .iter()
        .filter(|&&candidate| is_feasible(problem, state, var, candidate))
        .count()
}

/// Number of slots held by `resource` on `day` that overlap `slot`.
pub fn conflict_count(
    problem: &Problem,
    occupancy: &Occupancy,
    day: usize,
    resource: usize,
    slot: usize,
) -> usize {
    occupancy
        .slots(day, resource)
        .filter(|&used| problem.conflicts.conflicts(used, slot))
        .count()
}

fn clashes(problem: &Problem, occupancy: &Occupancy, day: usize, resource: usize, slot: usize) -> bool {
    occupancy
        .slots(day, resource)
        .any(|used| problem.conflicts.conflicts(used, slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::AvailabilityIndex;
    use crate::model::tests::{hm, req_row, two_hour_slots, week};
    use crate::timeslot::Timeslot;

    fn build(rows: Vec<crate::data::RequirementRow>, slots: Vec<Timeslot>) -> Problem {
        Problem::build(week(&["Mon", "Tue"]), slots, &rows, &AvailabilityIndex::default()).unwrap()
    }

    fn at(problem: &Problem, var: VarIdx, day: usize, slot: usize) -> Candidate {
        *problem
            .domain(var)
            .iter()
            .find(|c| c.day == day && c.slot == slot)
            .unwrap()
    }

    #[test]
    fn test_section_clash() {
        let problem = build(
            vec![
                req_row("CS101", "A", "Reyes", 1, 1.0, &[]),
                req_row("CS102", "A", "Cruz", 1, 1.0, &[]),
            ],
            two_hour_slots(),
        );
        let mut state = SearchState::new(&problem);
        state.place(&problem, 0, at(&problem, 0, 0, 0));

        assert_eq!(check(&problem, &state, 1, at(&problem, 1, 0, 0)), Err(Rejection::SectionClash));
        assert!(is_feasible(&problem, &state, 1, at(&problem, 1, 0, 1)));
        assert!(is_feasible(&problem, &state, 1, at(&problem, 1, 1, 0)));
    }

    #[test]
    fn test_teacher_clash_spans_sections() {
        let problem = build(
            vec![
                req_row("CS101", "A", "Reyes", 1, 1.0, &[]),
                req_row("MA101", "B", "Reyes", 1, 1.0, &[]),
            ],
            two_hour_slots(),
        );
        let mut state = SearchState::new(&problem);
        state.place(&problem, 0, at(&problem, 0, 1, 1));
        assert_eq!(check(&problem, &state, 1, at(&problem, 1, 1, 1)), Err(Rejection::TeacherClash));
        assert_eq!(count_feasible(&problem, &state, 1), 3);
    }

    #[test]
    fn test_overlapping_slots_clash_for_rooms_but_not_virtual_rooms() {
        let slots = vec![
            Timeslot::new("A", hm(9, 0), hm(10, 30)),
            Timeslot::new("B", hm(10, 0), hm(11, 0)),
        ];
        let problem = build(
            vec![
                req_row("CS101", "A", "Reyes", 1, 1.0, &["Room-101"]),
                req_row("MA101", "B", "Cruz", 1, 1.0, &["Room-101"]),
                req_row("PE101", "C", "Lim", 1, 1.0, &["Zoom A"]),
                req_row("EN101", "D", "Tan", 1, 1.0, &["Online-1"]),
            ],
            slots,
        );
        let mut state = SearchState::new(&problem);
        state.place(&problem, 0, at(&problem, 0, 0, 0));
        state.place(&problem, 2, at(&problem, 2, 0, 0));

        assert_eq!(check(&problem, &state, 1, at(&problem, 1, 0, 1)), Err(Rejection::RoomClash));
        assert!(is_feasible(&problem, &state, 3, at(&problem, 3, 0, 0)));
    }

    #[test]
    fn test_minimum_reachability_prunes_short_slots() {
        let slots = vec![
            Timeslot::new("SHORT", hm(9, 0), hm(9, 30)),
            Timeslot::new("LONG", hm(13, 0), hm(14, 30)),
        ];
        // 2 meetings, 150 minutes: 30 + 90 falls short, 90 + 90 does not
        let problem = build(vec![req_row("CS101", "A", "Reyes", 2, 2.5, &[])], slots);
        let mut state = SearchState::new(&problem);

        assert_eq!(
            check(&problem, &state, 0, at(&problem, 0, 0, 0)),
            Err(Rejection::MinimumUnreachable)
        );
        assert!(is_feasible(&problem, &state, 0, at(&problem, 0, 0, 1)));

        state.place(&problem, 0, at(&problem, 0, 0, 1));
        assert_eq!(
            check(&problem, &state, 1, at(&problem, 1, 1, 0)),
            Err(Rejection::MinimumUnreachable)
        );
        assert_eq!(
            feasible_candidates(&problem, &state, 1)
                .iter()
                .map(|c| (c.day, c.slot))
                .collect::<Vec<_>>(),
            vec![(1, 1)]
        );
    }

    #[test]
    fn test_teacher_availability_rule() {
        use crate::data::TeacherAvailabilityRow;
        let mut warnings = crate::error::WarningLog::new();
        let windows = crate::availability::windows_from_rows(
            &[TeacherAvailabilityRow {
                teacher: "Reyes".into(),
                day: "Mon".into(),
                available_from: "09:00".into(),
                available_to: "10:00".into(),
            }],
            &mut warnings,
        );
        let days = week(&["Mon", "Tue"]);
        let index = AvailabilityIndex::build(&windows, &days, &two_hour_slots(), &mut warnings);
        let rows = vec![req_row("CS101", "A", "Reyes", 1, 1.0, &[])];
        let problem = Problem::build(days, two_hour_slots(), &rows, &index).unwrap();
        let state = SearchState::new(&problem);

        assert_eq!(problem.domain(0).len(), 1);
        let off_hours = Candidate { day: 1, slot: 1, room: None };
        assert_eq!(
            check(&problem, &state, 0, off_hours),
            Err(Rejection::TeacherUnavailable)
        );
    }

    #[test]
    fn test_huge_minimum_is_unreachable() {
        // 2_400_000_000 minutes sits near the top of u32
        let problem = build(
            vec![req_row("CS101", "A", "Reyes", 3, 40_000_000.0, &[])],
            two_hour_slots(),
        );
        let mut state = SearchState::new(&problem);
        assert_eq!(
            check(&problem, &state, 0, at(&problem, 0, 0, 0)),
            Err(Rejection::MinimumUnreachable)
        );
        state.place(&problem, 0, at(&problem, 0, 0, 0));
        assert_eq!(count_feasible(&problem, &state, 1), 0);
    }
}
