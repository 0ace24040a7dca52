//! Advisory pre-solve checks. Nothing here changes how the search runs.

use serde::{Deserialize, Serialize};

use crate::error::{Warning, WarningLog};
use crate::model::Problem;

/// A requirement that cannot be satisfied whatever the other requirements do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementIssue {
    pub course_code: String,
    pub section_id: String,
    pub teacher: String,
    pub curriculum: String,
    pub semester: String,
    /// `(day, timeslot)` pairs the teacher may use.
    pub options: usize,
    pub min_minutes: u32,
    pub max_possible_minutes: u64,
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherLoad {
    pub teacher: String,
    pub demand_slots: u64,
    pub supply_slots: usize,
    pub demand_minutes: u64,
    pub supply_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionLoad {
    pub curriculum: String,
    pub section_id: String,
    pub demand_slots: u64,
    pub supply_slots: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub requirement_issues: Vec<RequirementIssue>,
    pub teacher_oversubscription: Vec<TeacherLoad>,
    pub section_oversubscription: Vec<SectionLoad>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.requirement_issues.is_empty()
            && self.teacher_oversubscription.is_empty()
            && self.section_oversubscription.is_empty()
    }
}

/// Runs every check against `problem`. Each finding is also pushed to
/// `warnings` as [`Warning::Diagnostic`].
pub fn analyse(problem: &Problem, warnings: &mut WarningLog) -> Diagnostics {
    let diagnostics = Diagnostics {
        requirement_issues: requirement_issues(problem),
        teacher_oversubscription: teacher_oversubscription(problem),
        section_oversubscription: section_oversubscription(problem),
    };

    for issue in &diagnostics.requirement_issues {
        warnings.push(Warning::Diagnostic {
            detail: format!(
                "course={} section={} teacher={} curriculum={} semester={}: {}",
                issue.course_code,
                issue.section_id,
                issue.teacher,
                issue.curriculum,
                issue.semester,
                issue.problems.join("; ")
            ),
        });
    }
    for load in &diagnostics.teacher_oversubscription {
        warnings.push(Warning::Diagnostic {
            detail: format!(
                "teacher={} demand_slots={} supply_slots={} demand_minutes={} supply_minutes={}",
                load.teacher,
                load.demand_slots,
                load.supply_slots,
                load.demand_minutes,
                load.supply_minutes
            ),
        });
    }
    for load in &diagnostics.section_oversubscription {
        warnings.push(Warning::Diagnostic {
            detail: format!(
                "curriculum={} section={} demand_slots={} exceeds weekly_supply={}",
                load.curriculum, load.section_id, load.demand_slots, load.supply_slots
            ),
        });
    }
    diagnostics
}

fn weekly_slots(problem: &Problem) -> usize {
    problem.days.len() * problem.timeslots.len()
}

fn requirement_issues(problem: &Problem) -> Vec<RequirementIssue> {
    problem
        .requirements
        .iter()
        .filter_map(|req| {
            let options = problem
                .teacher_allowed_pairs(req.teacher_idx)
                .map_or_else(|| weekly_slots(problem), |pairs| pairs.len());
            let max_possible_minutes =
                u64::from(req.slots_required) * u64::from(problem.max_slot_minutes);

            let mut problems = Vec::new();
            if options == 0 {
                problems.push("no (day, timeslot) fits teacher availability".to_string());
            }
            if max_possible_minutes < u64::from(req.min_minutes) {
                problems.push(format!(
                    "insufficient total minutes: need {}, have at most {} from {} slot(s)",
                    req.min_minutes, max_possible_minutes, req.slots_required
                ));
            }
            if problems.is_empty() {
                return None;
            }
            Some(RequirementIssue {
                course_code: req.course_code.clone(),
                section_id: req.section_id.clone(),
                teacher: req.teacher.clone(),
                curriculum: req.curriculum.clone(),
                semester: req.semester.clone(),
                options,
                min_minutes: req.min_minutes,
                max_possible_minutes,
                problems,
            })
        })
        .collect()
}

fn teacher_oversubscription(problem: &Problem) -> Vec<TeacherLoad> {
    // totals are widened: summed minimums can exceed u32 even when each fits
    let mut demand = vec![(0u64, 0u64); problem.teachers.len()];
    for req in &problem.requirements {
        let entry = &mut demand[req.teacher_idx];
        entry.0 += u64::from(req.slots_required);
        entry.1 += u64::from(req.min_minutes);
    }

    let minutes_per_day: u64 = (0..problem.timeslots.len())
        .map(|slot| u64::from(problem.slot_minutes(slot)))
        .sum();
    let full_supply_minutes = minutes_per_day * problem.days.len() as u64;

    problem
        .teachers
        .iter()
        .zip(demand)
        .enumerate()
        .filter_map(|(teacher_idx, (teacher, (demand_slots, demand_minutes)))| {
            let (supply_slots, supply_minutes) = match problem.teacher_allowed_pairs(teacher_idx) {
                Some(pairs) => (
                    pairs.len(),
                    pairs
                        .iter()
                        .map(|&(_, slot)| u64::from(problem.slot_minutes(slot)))
                        .sum::<u64>(),
                ),
                None => (weekly_slots(problem), full_supply_minutes),
            };
            let oversubscribed =
                demand_slots > supply_slots as u64 || demand_minutes > supply_minutes;
            oversubscribed.then(|| TeacherLoad {
                teacher: teacher.clone(),
                demand_slots,
                supply_slots,
                demand_minutes,
                supply_minutes,
            })
        })
        .collect()
}

fn section_oversubscription(problem: &Problem) -> Vec<SectionLoad> {
    let mut demand = vec![0u64; problem.sections.len()];
    for req in &problem.requirements {
        demand[req.section_idx] += u64::from(req.slots_required);
    }
    let supply_slots = weekly_slots(problem);

    problem
        .sections
        .iter()
        .zip(demand)
        .filter(|&(_, demand_slots)| demand_slots > supply_slots as u64)
        .map(|((curriculum, section_id), demand_slots)| SectionLoad {
            curriculum: curriculum.clone(),
            section_id: section_id.clone(),
            demand_slots,
            supply_slots,
        })
        .collect()
}
