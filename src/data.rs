use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SolverConfig;
use crate::diagnostics::Diagnostics;
use crate::error::Warning;

/// Teaching window the timetable applies to. Carried through for the exporter.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub start_date: String,
    pub end_date: String,
}

/// One row of the timeslot table. Times are raw clock text.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeslotRow {
    pub slot_id: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

/// Rooms arrive either as a comma-separated cell or as a list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RoomList {
    Text(String),
    List(Vec<String>),
}

impl Default for RoomList {
    fn default() -> Self {
        RoomList::List(Vec::new())
    }
}

impl RoomList {
    /// Trimmed, non-blank room names in input order.
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            RoomList::Text(text) => text.split(',').collect(),
            RoomList::List(items) => items.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One course-section scheduling need.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementRow {
    pub course_code: String,
    pub curriculum: String,
    pub semester: String,
    pub section_id: String,
    pub teacher: String,
    pub slots_required: u32,
    pub min_total_hours: f64,
    #[serde(default)]
    pub available_rooms: RoomList,
}

/// Break period for a section. The solver validates and passes these through.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakRow {
    pub curriculum: String,
    pub semester: String,
    pub section_id: String,
    pub day: String,
    pub break_from: String,
    #[serde(default)]
    pub break_to: String,
}

/// Availability window(s) for a teacher. `day` may list several days
/// separated by `/`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAvailabilityRow {
    pub teacher: String,
    pub day: String,
    #[serde(default)]
    pub available_from: String,
    #[serde(default)]
    pub available_to: String,
}

/// The complete input for one timetable run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInput {
    #[serde(default)]
    pub window: Window,
    pub timeslots: Vec<TimeslotRow>,
    pub requirements: Vec<RequirementRow>,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub breaks: Vec<BreakRow>,
    #[serde(default)]
    pub teacher_availability: Vec<TeacherAvailabilityRow>,
}

/// Request body accepted by the HTTP surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    #[serde(flatten)]
    pub input: SchedulingInput,
    #[serde(default)]
    pub config: SolverConfig,
}

/// A single placed meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMeeting {
    pub course_code: String,
    pub section_id: String,
    pub meeting_index: u32,
    pub curriculum: String,
    pub semester: String,
    pub teacher: String,
    pub day: String,
    pub slot_id: String,
    pub start: String,
    pub end: String,
    pub room: Option<String>,
}

/// A requirement that was abandoned in partial mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRequirement {
    pub course_code: String,
    pub section_id: String,
    pub curriculum: String,
    pub semester: String,
    pub teacher: String,
    pub slots_required: u32,
    pub min_total_hours: f64,
    pub available_rooms: Vec<String>,
    pub reason: String,
}

impl fmt::Display for SkippedRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "course={} section={} teacher={}: {}",
            self.course_code, self.section_id, self.teacher, self.reason
        )
    }
}

/// A validated break period, normalised to `HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakPeriod {
    pub curriculum: String,
    pub semester: String,
    pub section_id: String,
    pub day: String,
    pub break_from: String,
    pub break_to: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub steps: u64,
    pub backtracks: u64,
    pub skipped_requirements: usize,
    pub elapsed_ms: u64,
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingOutput {
    pub window: Window,
    pub assignments: Vec<ScheduledMeeting>,
    pub skipped: Vec<SkippedRequirement>,
    pub warnings: Vec<Warning>,
    pub diagnostics: Diagnostics,
    pub breaks: Vec<BreakPeriod>,
    pub stats: SearchStats,
}

/// Output of a diagnose-only run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub variables: usize,
    pub warnings: Vec<Warning>,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_room_list_accepts_text_and_list() {
        let text: RoomList = serde_json::from_value(json!("Room-101, Online-1 ,,")).unwrap();
        assert_eq!(text.names(), vec!["Room-101", "Online-1"]);

        let list: RoomList = serde_json::from_value(json!(["Lab A", "  "])).unwrap();
        assert_eq!(list.names(), vec!["Lab A"]);

        assert!(RoomList::default().names().is_empty());
    }

    #[test]
    fn test_requirement_row_defaults_rooms() {
        let row: RequirementRow = serde_json::from_value(json!({
            "courseCode": "CS101",
            "curriculum": "BSCS",
            "semester": "1",
            "sectionId": "A",
            "teacher": "Reyes",
            "slotsRequired": 2,
            "minTotalHours": 2.5
        }))
        .unwrap();
        assert!(row.available_rooms.names().is_empty());
        assert_eq!(row.slots_required, 2);
    }

    #[test]
    fn test_solve_request_flattens_input() {
        let req: SolveRequest = serde_json::from_value(json!({
            "timeslots": [{"slotId": "S1", "startTime": "09:00", "endTime": "10:00"}],
            "requirements": [],
            "config": {"allowPartial": false}
        }))
        .unwrap();
        assert_eq!(req.input.timeslots.len(), 1);
        assert!(req.input.days.is_empty());
        assert!(!req.config.allow_partial);
        assert_eq!(req.config.max_attempts_per_variable, 200);
    }
}
