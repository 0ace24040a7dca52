use serde::{Deserialize, Serialize};
use std::fmt;

/// Fatal outcomes: the run did not produce a timetable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// A variable has an empty domain after availability filtering.
    Configuration {
        variable: String,
        teacher: String,
        message: String,
    },
    DuplicateRequirement {
        course_code: String,
        section_id: String,
    },
    /// Strict mode only. `dead_ends` lists variables that were selected
    /// with no feasible candidate at some point during the search.
    Unsatisfiable {
        zero_option_variables: Vec<String>,
        dead_ends: Vec<String>,
    },
    /// Strict mode only: the step or time budget ran out.
    Interrupted { steps: u64 },
}

impl SolveError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SolveError::Configuration { .. } | SolveError::DuplicateRequirement { .. }
        )
    }
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Configuration {
                variable, message, ..
            } => write!(f, "Empty domain for {variable}. {message}"),
            SolveError::DuplicateRequirement {
                course_code,
                section_id,
            } => write!(
                f,
                "Requirement course={course_code} section={section_id} is listed more than once"
            ),
            SolveError::Unsatisfiable {
                zero_option_variables,
                dead_ends,
            } => {
                write!(f, "No feasible timetable found with current inputs/constraints.")?;
                if zero_option_variables.is_empty() {
                    write!(
                        f,
                        " No variable is out of options; check section/teacher/room conflicts or hour requirements."
                    )?;
                } else {
                    write!(
                        f,
                        " Variables with 0 feasible options: {}.",
                        zero_option_variables.join(", ")
                    )?;
                }
                if !dead_ends.is_empty() {
                    write!(f, " Dead ends during search: {}.", dead_ends.join(", "))?;
                }
                Ok(())
            }
            SolveError::Interrupted { steps } => {
                write!(f, "Search budget exhausted after {steps} steps without a complete timetable")
            }
        }
    }
}

impl std::error::Error for SolveError {}

/// Non-fatal findings accumulated during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Warning {
    /// A timeslot, break, or availability row was dropped.
    MalformedTime { source: String, detail: String },
    TeacherAvailability { teacher: String, detail: String },
    /// No usable `(day, timeslot)` pair came out of this teacher's windows,
    /// so the teacher is treated as available everywhere.
    AvailabilityIgnored {
        teacher: String,
        cause: FallbackCause,
    },
    PartialSolution {
        course_code: String,
        section_id: String,
        reason: String,
    },
    Diagnostic { detail: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MalformedTime { source, detail } => {
                write!(f, "dropped {source} row: {detail}")
            }
            Warning::TeacherAvailability { teacher, detail } => {
                write!(f, "teacher={teacher}: {detail}")
            }
            Warning::AvailabilityIgnored { teacher, cause } => write!(
                f,
                "teacher={teacher}: {cause}; teacher is treated as UNCONSTRAINED \
                 (check the availability rows)"
            ),
            Warning::PartialSolution {
                course_code,
                section_id,
                reason,
            } => write!(f, "skipped course={course_code} section={section_id}: {reason}"),
            Warning::Diagnostic { detail } => write!(f, "{detail}"),
        }
    }
}

/// Why a teacher's declared availability was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FallbackCause {
    /// Every window had an unknown day, a missing bound or a non-positive range.
    InvalidWindows,
    /// Valid windows exist but no timeslot fits inside any of them.
    NoMatchingTimeslot,
}

impl fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackCause::InvalidWindows => write!(f, "every availability window was invalid"),
            FallbackCause::NoMatchingTimeslot => {
                write!(f, "availability windows do not match any defined timeslot")
            }
        }
    }
}

/// Ordered warning log. Every pushed warning is also emitted through `log`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarningLog {
    entries: Vec<Warning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.entries.push(warning);
    }

    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.entries
    }
}
