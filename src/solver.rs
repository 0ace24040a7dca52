use log::{info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::clock::{self, ClockRange};
use crate::config::SolverConfig;
use crate::data::{
    BreakPeriod, BreakRow, DiagnosticsReport, ScheduledMeeting, SchedulingInput,
    SchedulingOutput, SearchStats, SkippedRequirement,
};
use crate::diagnostics::{self, Diagnostics};
use crate::error::{SolveError, Warning, WarningLog};
use crate::model::{CandidateValue, Problem, Requirement, VariableKey};
use crate::search::{self, SearchOutcome, SkipReason};
use crate::state::Occupancy;

const CLOCK_OUTPUT: &str = "%H:%M:%S";

/// A solved timetable together with the model it was solved on.
#[derive(Debug, Clone)]
pub struct Timetable {
    problem: Problem,
    outcome: SearchOutcome,
    warnings: WarningLog,
    diagnostics: Diagnostics,
}

impl Timetable {
    /// Normalises `input`, runs the pre-solve checks and searches.
    pub fn build(input: &SchedulingInput, config: &SolverConfig) -> Result<Self, SolveError> {
        let mut warnings = WarningLog::new();
        let problem = Problem::from_input(input, &mut warnings)?;
        let diagnostics = diagnostics::analyse(&problem, &mut warnings);
        let outcome = search::search(&problem, config)?;

        for entry in &outcome.skipped {
            let req = &problem.requirements[entry.requirement];
            warnings.push(Warning::PartialSolution {
                course_code: req.course_code.clone(),
                section_id: req.section_id.clone(),
                reason: entry.reason.to_string(),
            });
        }

        Ok(Self {
            problem,
            outcome,
            warnings,
            diagnostics,
        })
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// `(course_code, section_id, meeting_index) -> (day, slot_id, room)` for
    /// every placed meeting. Skipped requirements contribute nothing.
    pub fn assignment(&self) -> BTreeMap<VariableKey, CandidateValue> {
        self.outcome
            .state
            .assigned()
            .filter(|&(var, _)| !self.outcome.is_skipped(var))
            .map(|(var, candidate)| {
                (
                    self.problem.variable_key(var),
                    self.problem.candidate_value(candidate),
                )
            })
            .collect()
    }

    /// Skipped requirements in the order they were abandoned.
    pub fn skip_log(&self) -> impl Iterator<Item = (&Requirement, SkipReason)> + '_ {
        self.outcome
            .skipped
            .iter()
            .map(|entry| (&self.problem.requirements[entry.requirement], entry.reason))
    }

    /// The full domain of one variable, or `None` for an unknown key.
    pub fn domain(&self, key: &VariableKey) -> Option<Vec<CandidateValue>> {
        let var = (0..self.problem.variables.len())
            .find(|&var| self.problem.variable_key(var) == *key)?;
        Some(
            self.problem
                .domain(var)
                .iter()
                .map(|&candidate| self.problem.candidate_value(candidate))
                .collect(),
        )
    }

    /// `(curriculum, section_id) -> slot ids` held on `day`.
    pub fn section_occupancy(&self, day: &str) -> Option<BTreeMap<(String, String), Vec<String>>> {
        self.snapshot(self.outcome.state.sections(), day, |idx| {
            self.problem.sections[idx].clone()
        })
    }

    pub fn teacher_occupancy(&self, day: &str) -> Option<BTreeMap<String, Vec<String>>> {
        self.snapshot(self.outcome.state.teachers(), day, |idx| {
            self.problem.teachers[idx].clone()
        })
    }

    /// Physical rooms only; virtual rooms are never occupied.
    pub fn room_occupancy(&self, day: &str) -> Option<BTreeMap<String, Vec<String>>> {
        self.snapshot(self.outcome.state.rooms(), day, |idx| {
            self.problem.rooms[idx].name.clone()
        })
    }

    fn snapshot<K: Ord>(
        &self,
        occupancy: &Occupancy,
        day: &str,
        name: impl Fn(usize) -> K,
    ) -> Option<BTreeMap<K, Vec<String>>> {
        let day = self.problem.days.iter().position(|d| d == day)?;
        Some(
            occupancy
                .snapshot(day)
                .into_iter()
                .map(|(resource, slots)| {
                    let ids = slots
                        .into_iter()
                        .map(|slot| self.problem.timeslots[slot].id.clone())
                        .collect();
                    (name(resource), ids)
                })
                .collect(),
        )
    }

    pub fn warnings(&self) -> &[Warning] {
        self.warnings.entries()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn stats(&self) -> &SearchStats {
        &self.outcome.stats
    }

    /// Placed meetings sorted by course, section and meeting index.
    pub fn meetings(&self) -> Vec<ScheduledMeeting> {
        let mut meetings: Vec<ScheduledMeeting> = self
            .outcome
            .state
            .assigned()
            .filter(|&(var, _)| !self.outcome.is_skipped(var))
            .map(|(var, candidate)| {
                let req = self.problem.requirement_of(var);
                let slot = &self.problem.timeslots[candidate.slot];
                let value = self.problem.candidate_value(candidate);
                ScheduledMeeting {
                    course_code: req.course_code.clone(),
                    section_id: req.section_id.clone(),
                    meeting_index: self.problem.variables[var].meeting_index,
                    curriculum: req.curriculum.clone(),
                    semester: req.semester.clone(),
                    teacher: req.teacher.clone(),
                    day: value.day,
                    slot_id: value.slot_id,
                    start: slot.start.format(CLOCK_OUTPUT).to_string(),
                    end: slot.end.format(CLOCK_OUTPUT).to_string(),
                    room: value.room,
                }
            })
            .collect();
        meetings.sort_by(|a, b| {
            (&a.course_code, &a.section_id, a.meeting_index)
                .cmp(&(&b.course_code, &b.section_id, b.meeting_index))
        });
        meetings
    }

    pub fn skipped_requirements(&self) -> Vec<SkippedRequirement> {
        self.skip_log()
            .map(|(req, reason)| SkippedRequirement {
                course_code: req.course_code.clone(),
                section_id: req.section_id.clone(),
                curriculum: req.curriculum.clone(),
                semester: req.semester.clone(),
                teacher: req.teacher.clone(),
                slots_required: req.slots_required,
                min_total_hours: req.min_total_hours,
                available_rooms: req.available_rooms.clone(),
                reason: reason.to_string(),
            })
            .collect()
    }
}

/// Validates break rows for the exporter. The search never reads them.
pub fn normalise_breaks(rows: &[BreakRow], warnings: &mut WarningLog) -> Vec<BreakPeriod> {
    rows.iter()
        .filter_map(|row| {
            let dropped = |detail: String| Warning::MalformedTime {
                source: "break".to_string(),
                detail: format!(
                    "curriculum={} section={} day={} {detail}",
                    row.curriculum.trim(),
                    row.section_id.trim(),
                    row.day.trim()
                ),
            };
            match clock::parse_range(&row.break_from, &row.break_to) {
                ClockRange::Valid(from, to) => Some(BreakPeriod {
                    curriculum: row.curriculum.trim().to_string(),
                    semester: row.semester.trim().to_string(),
                    section_id: row.section_id.trim().to_string(),
                    day: row.day.trim().to_string(),
                    break_from: from.format(CLOCK_OUTPUT).to_string(),
                    break_to: to.format(CLOCK_OUTPUT).to_string(),
                }),
                ClockRange::Missing => {
                    warnings.push(dropped("has an empty break time".to_string()));
                    None
                }
                ClockRange::Unparseable(detail) => {
                    warnings.push(dropped(format!("has unparseable time: {detail}")));
                    None
                }
                ClockRange::NonPositive(from, to) => {
                    warnings.push(dropped(format!(
                        "has non-positive duration: from={from} to={to}"
                    )));
                    None
                }
            }
        })
        .collect()
}

/// Solves the timetabling problem with the backtracking engine.
pub fn solve(input: &SchedulingInput, config: &SolverConfig) -> Result<SchedulingOutput, SolveError> {
    let start_time = Instant::now();
    info!(
        "Solving timetable for {} requirements over {} timeslot rows...",
        input.requirements.len(),
        input.timeslots.len()
    );

    let timetable = Timetable::build(input, config)?;
    let mut warnings = timetable.warnings.clone();
    let breaks = normalise_breaks(&input.breaks, &mut warnings);

    let output = SchedulingOutput {
        window: input.window.clone(),
        assignments: timetable.meetings(),
        skipped: timetable.skipped_requirements(),
        warnings: warnings.into_vec(),
        diagnostics: timetable.diagnostics.clone(),
        breaks,
        stats: timetable.stats().clone(),
    };

    if !output.skipped.is_empty() {
        warn!(
            "[PARTIAL SOLUTION] {} requirement(s) could not be scheduled.",
            output.skipped.len()
        );
    }
    info!(
        "Scheduled {} meetings, skipped {} requirements in {:.2?}",
        output.assignments.len(),
        output.skipped.len(),
        start_time.elapsed()
    );
    Ok(output)
}

/// Builds the model and runs the pre-solve checks without searching.
pub fn diagnose(input: &SchedulingInput) -> Result<DiagnosticsReport, SolveError> {
    let mut warnings = WarningLog::new();
    let problem = Problem::from_input(input, &mut warnings)?;
    let diagnostics = diagnostics::analyse(&problem, &mut warnings);
    normalise_breaks(&input.breaks, &mut warnings);

    info!(
        "Diagnosed {} variables with {} warning(s).",
        problem.variables.len(),
        warnings.len()
    );
    Ok(DiagnosticsReport {
        variables: problem.variables.len(),
        warnings: warnings.into_vec(),
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: serde_json::Value) -> SchedulingInput {
        serde_json::from_value(value).unwrap()
    }

    fn two_section_input() -> SchedulingInput {
        input(json!({
            "window": {"startDate": "2025-06-02", "endDate": "2025-10-10"},
            "days": ["Mon", "Tue"],
            "timeslots": [
                {"slotId": "AM", "startTime": "09:00", "endTime": "10:00"},
                {"slotId": "PM", "startTime": "01:00 PM", "endTime": "02:30 PM"}
            ],
            "requirements": [
                {"courseCode": "CS101", "curriculum": "BSCS", "semester": "1", "sectionId": "A",
                 "teacher": "Reyes", "slotsRequired": 2, "minTotalHours": 2, "availableRooms": "Room-101"},
                {"courseCode": "CS102", "curriculum": "BSCS", "semester": "1", "sectionId": "B",
                 "teacher": "Cruz", "slotsRequired": 1, "minTotalHours": 1, "availableRooms": ["Online-1"]}
            ],
            "breaks": [
                {"curriculum": "BSCS", "semester": "1", "sectionId": "A", "day": "Mon",
                 "breakFrom": "12:00 PM", "breakTo": "1 PM"},
                {"curriculum": "BSCS", "semester": "1", "sectionId": "B", "day": "Mon",
                 "breakFrom": "13:00", "breakTo": "12:00"}
            ]
        }))
    }

    #[test]
    fn test_solve_builds_sorted_output() {
        let output = solve(&two_section_input(), &SolverConfig::default()).unwrap();

        assert_eq!(output.window.start_date, "2025-06-02");
        assert_eq!(output.assignments.len(), 3);
        let keys: Vec<(&str, u32)> = output
            .assignments
            .iter()
            .map(|m| (m.course_code.as_str(), m.meeting_index))
            .collect();
        assert_eq!(keys, vec![("CS101", 0), ("CS101", 1), ("CS102", 0)]);
        assert_ne!(output.assignments[0].day, output.assignments[1].day);
        assert_eq!(output.assignments[2].room.as_deref(), Some("Online-1"));
        assert!(output.skipped.is_empty());

        assert_eq!(output.breaks.len(), 1);
        assert_eq!(output.breaks[0].break_from, "12:00:00");
        assert_eq!(output.breaks[0].break_to, "13:00:00");
        assert!(matches!(
            &output.warnings[..],
            [Warning::MalformedTime { source, .. }] if source == "break"
        ));
    }

    #[test]
    fn test_timetable_views() {
        let timetable = Timetable::build(&two_section_input(), &SolverConfig::strict()).unwrap();

        let assignment = timetable.assignment();
        assert_eq!(assignment.len(), 3);
        let key = VariableKey {
            course_code: "CS102".into(),
            section_id: "B".into(),
            meeting_index: 0,
        };
        assert_eq!(assignment[&key].room.as_deref(), Some("Online-1"));
        assert_eq!(timetable.domain(&key).map(|d| d.len()), Some(4));

        let day = assignment[&key].day.clone();
        let teachers = timetable.teacher_occupancy(&day).unwrap();
        assert_eq!(teachers["Cruz"], vec![assignment[&key].slot_id.clone()]);
        // the online room is never tracked
        for day in ["Mon", "Tue"] {
            assert!(!timetable.room_occupancy(day).unwrap().contains_key("Online-1"));
        }
        let sections: usize = ["Mon", "Tue"]
            .iter()
            .map(|day| timetable.section_occupancy(day).unwrap().values().map(Vec::len).sum::<usize>())
            .sum();
        assert_eq!(sections, 3);
        assert!(timetable.teacher_occupancy("Sun").is_none());
        assert_eq!(timetable.skip_log().count(), 0);
    }

    #[test]
    fn test_partial_solution_warning_per_skip() {
        let input = input(json!({
            "days": ["Mon"],
            "timeslots": [{"slotId": "AM", "startTime": "09:00", "endTime": "10:00"}],
            "requirements": [
                {"courseCode": "CS101", "curriculum": "BSCS", "semester": "1", "sectionId": "A",
                 "teacher": "Reyes", "slotsRequired": 1, "minTotalHours": 1},
                {"courseCode": "CS102", "curriculum": "BSCS", "semester": "1", "sectionId": "B",
                 "teacher": "Reyes", "slotsRequired": 1, "minTotalHours": 1}
            ]
        }));
        let output = solve(&input, &SolverConfig::default()).unwrap();

        assert_eq!(output.assignments.len(), 1);
        assert_eq!(output.skipped.len(), 1);
        assert_eq!(output.skipped[0].course_code, "CS102");
        assert!(output.skipped[0].reason.starts_with("No feasible timeslots"));
        assert_eq!(output.stats.skipped_requirements, 1);
        assert!(output.warnings.iter().any(|w| matches!(
            w,
            Warning::PartialSolution { course_code, .. } if course_code == "CS102"
        )));
    }

    #[test]
    fn test_diagnose_does_not_search() {
        let report = diagnose(&two_section_input()).unwrap();
        assert_eq!(report.variables, 3);
        assert!(report.diagnostics.is_clean());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_configuration_error_surfaces() {
        let input = input(json!({
            "timeslots": [{"slotId": "AM", "startTime": "09:00", "endTime": "10:00"}],
            "requirements": [
                {"courseCode": "CS101", "curriculum": "BSCS", "semester": "1", "sectionId": "A",
                 "teacher": "Reyes", "slotsRequired": 1, "minTotalHours": 1}
            ],
            "teacherAvailability": [
                {"teacher": "Reyes", "day": "Mon", "availableFrom": "09:30", "availableTo": "11:00"},
                {"teacher": "Reyes", "day": "Tue", "availableFrom": "08:00", "availableTo": "09:30"}
            ]
        }));
        // no slot fits, so the fallback leaves Reyes unconstrained
        let output = solve(&input, &SolverConfig::strict()).unwrap();
        assert!(output.warnings.iter().any(|w| matches!(w, Warning::AvailabilityIgnored { .. })));

        let empty = SchedulingInput {
            timeslots: Vec::new(),
            ..input
        };
        let err = solve(&empty, &SolverConfig::default()).unwrap_err();
        assert!(err.is_configuration());
    }
}
