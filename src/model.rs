//! Search variables and their domains.
//!
//! Every requirement expands into one variable per required meeting. A
//! variable's domain is `days x timeslots x rooms`, with the `(day, timeslot)`
//! part cut down to the teacher's legal pairs when the teacher is
//! constrained. Resources are interned to indices so the search works on
//! plain integers.

use itertools::Itertools;
use log::info;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;

use crate::availability::{self, AvailabilityIndex, DayIdx};
use crate::data::{RequirementRow, SchedulingInput};
use crate::error::{SolveError, WarningLog};
use crate::timeslot::{self, ConflictGraph, SlotIdx, Timeslot};

pub type ReqIdx = usize;
pub type VarIdx = usize;
pub type RoomIdx = usize;
pub type TeacherIdx = usize;
pub type SectionIdx = usize;

pub const DEFAULT_DAYS: [&str; 5] = ["Mon", "Tue", "Wed", "Thu", "Fri"];

const VIRTUAL_ROOM_KEYWORDS: [&str; 7] =
    ["online", "virtual", "zoom", "teams", "meet", "webex", "remote"];

/// Online venues have unlimited concurrent capacity.
pub fn is_virtual_room(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    VIRTUAL_ROOM_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub name: String,
    pub is_virtual: bool,
}

/// A point in a variable's domain. `room == None` is the no-room sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate {
    pub day: DayIdx,
    pub slot: SlotIdx,
    pub room: Option<RoomIdx>,
}

#[derive(Debug, Clone)]
pub struct Requirement {
    pub course_code: String,
    pub curriculum: String,
    pub semester: String,
    pub section_id: String,
    pub teacher: String,
    pub slots_required: u32,
    pub min_total_hours: f64,
    pub available_rooms: Vec<String>,
    /// `int(min_total_hours * 60)`, truncated toward zero.
    pub min_minutes: u32,
    pub teacher_idx: TeacherIdx,
    pub section_idx: SectionIdx,
    pub rooms: Vec<RoomIdx>,
    pub variables: Range<VarIdx>,
}

/// One required meeting of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable {
    pub requirement: ReqIdx,
    pub meeting_index: u32,
}

/// External identity of a variable: `(course_code, section_id, meeting_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableKey {
    pub course_code: String,
    pub section_id: String,
    pub meeting_index: u32,
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.course_code, self.section_id, self.meeting_index
        )
    }
}

/// External form of a candidate: `(day, slot_id, room)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateValue {
    pub day: String,
    pub slot_id: String,
    pub room: Option<String>,
}

/// Read-only model shared by feasibility checks and the search.
#[derive(Debug, Clone)]
pub struct Problem {
    pub days: Vec<String>,
    pub timeslots: Vec<Timeslot>,
    pub conflicts: ConflictGraph,
    pub rooms: Vec<Room>,
    pub teachers: Vec<String>,
    pub sections: Vec<(String, String)>,
    pub requirements: Vec<Requirement>,
    pub variables: Vec<Variable>,
    pub max_slot_minutes: u32,
    teacher_allowed: Vec<Option<HashSet<(DayIdx, SlotIdx)>>>,
    domains: Vec<Vec<Candidate>>,
}

#[derive(Default)]
struct Interner {
    ids: HashMap<String, usize>,
    names: Vec<String>,
}

impl Interner {
    fn intern(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.ids.get(name) {
            return idx;
        }
        let idx = self.names.len();
        self.ids.insert(name.to_string(), idx);
        self.names.push(name.to_string());
        idx
    }
}

impl Problem {
    /// Normalises raw input rows and builds the model. Dropped rows are
    /// recorded in `warnings`.
    pub fn from_input(input: &SchedulingInput, warnings: &mut WarningLog) -> Result<Self, SolveError> {
        let mut days: Vec<String> = input
            .days
            .iter()
            .map(|day| day.trim().to_string())
            .filter(|day| !day.is_empty())
            .unique()
            .collect();
        if days.is_empty() {
            days = DEFAULT_DAYS.iter().map(|day| day.to_string()).collect();
        }

        let timeslots = timeslot::timeslots_from_rows(&input.timeslots, warnings);
        let windows = availability::windows_from_rows(&input.teacher_availability, warnings);
        let availability = AvailabilityIndex::build(&windows, &days, &timeslots, warnings);
        info!(
            "Availability restricts {} teacher(s) over {} day(s) x {} timeslot(s)",
            availability.constrained_teachers(),
            days.len(),
            timeslots.len()
        );

        Self::build(days, timeslots, &input.requirements, &availability)
    }

    pub fn build(
        days: Vec<String>,
        timeslots: Vec<Timeslot>,
        rows: &[RequirementRow],
        availability: &AvailabilityIndex,
    ) -> Result<Self, SolveError> {
        let conflicts = ConflictGraph::build(&timeslots);
        let max_slot_minutes = timeslots
            .iter()
            .map(Timeslot::duration_minutes)
            .max()
            .unwrap_or(0);

        let mut rooms = Interner::default();
        let mut teachers = Interner::default();
        let mut sections: Vec<(String, String)> = Vec::new();
        let mut section_ids: HashMap<(String, String), SectionIdx> = HashMap::new();
        let mut keys: HashSet<(String, String)> = HashSet::new();
        let mut requirements = Vec::with_capacity(rows.len());
        let mut variables = Vec::new();

        for row in rows {
            let course_code = row.course_code.trim().to_string();
            let section_id = row.section_id.trim().to_string();
            if !keys.insert((course_code.clone(), section_id.clone())) {
                return Err(SolveError::DuplicateRequirement {
                    course_code,
                    section_id,
                });
            }

            let curriculum = row.curriculum.trim().to_string();
            let section_key = (curriculum.clone(), section_id.clone());
            let section_idx = *section_ids.entry(section_key.clone()).or_insert_with(|| {
                sections.push(section_key);
                sections.len() - 1
            });

            let teacher = row.teacher.trim().to_string();
            let available_rooms = row.available_rooms.names();
            let req_idx = requirements.len();
            let first_var = variables.len();
            variables.extend((0..row.slots_required).map(|meeting_index| Variable {
                requirement: req_idx,
                meeting_index,
            }));

            requirements.push(Requirement {
                teacher_idx: teachers.intern(&teacher),
                rooms: available_rooms.iter().map(|r| rooms.intern(r)).collect(),
                course_code,
                curriculum,
                semester: row.semester.trim().to_string(),
                section_id,
                teacher,
                slots_required: row.slots_required,
                min_total_hours: row.min_total_hours,
                min_minutes: (row.min_total_hours * 60.0) as u32,
                available_rooms,
                section_idx,
                variables: first_var..variables.len(),
            });
        }

        let teacher_allowed = teachers
            .names
            .iter()
            .map(|name| availability.allowed_pairs(name).cloned())
            .collect();
        let rooms = rooms
            .names
            .into_iter()
            .map(|name| Room {
                is_virtual: is_virtual_room(&name),
                name,
            })
            .collect();

        let mut problem = Self {
            days,
            timeslots,
            conflicts,
            rooms,
            teachers: teachers.names,
            sections,
            requirements,
            variables,
            max_slot_minutes,
            teacher_allowed,
            domains: Vec::new(),
        };
        problem.domains = problem.build_domains();
        problem.check_domains()?;

        info!(
            "Built model with {} days, {} timeslots, {} requirements, {} variables and {} candidate values.",
            problem.days.len(),
            problem.timeslots.len(),
            problem.requirements.len(),
            problem.variables.len(),
            problem.domains.iter().map(Vec::len).sum::<usize>()
        );
        Ok(problem)
    }

    fn build_domains(&self) -> Vec<Vec<Candidate>> {
        // variables of one requirement share a domain
        let per_requirement: Vec<Vec<Candidate>> = self
            .requirements
            .iter()
            .map(|req| {
                let room_choices: Vec<Option<RoomIdx>> = if req.rooms.is_empty() {
                    vec![None]
                } else {
                    req.rooms.iter().copied().map(Some).collect()
                };
                (0..self.days.len())
                    .cartesian_product(0..self.timeslots.len())
                    .filter(|&(day, slot)| self.teacher_allows(req.teacher_idx, day, slot))
                    .cartesian_product(room_choices)
                    .map(|((day, slot), room)| Candidate { day, slot, room })
                    .collect()
            })
            .collect();

        self.variables
            .iter()
            .map(|var| per_requirement[var.requirement].clone())
            .collect()
    }

    fn check_domains(&self) -> Result<(), SolveError> {
        let Some(var) = self.domains.iter().position(Vec::is_empty) else {
            return Ok(());
        };
        let req = self.requirement_of(var);
        let message = if self.timeslots.is_empty() {
            "No valid timeslots are defined.".to_string()
        } else {
            format!(
                "Likely no timeslot fits teacher availability for teacher={}.",
                req.teacher
            )
        };
        Err(SolveError::Configuration {
            variable: self.variable_key(var).to_string(),
            teacher: req.teacher.clone(),
            message,
        })
    }

    #[inline]
    pub fn requirement_of(&self, var: VarIdx) -> &Requirement {
        &self.requirements[self.variables[var].requirement]
    }

    #[inline]
    pub fn domain(&self, var: VarIdx) -> &[Candidate] {
        &self.domains[var]
    }

    #[inline]
    pub fn slot_minutes(&self, slot: SlotIdx) -> u32 {
        self.timeslots[slot].duration_minutes()
    }

    /// True when the teacher is unconstrained or the pair is legal for them.
    #[inline]
    pub fn teacher_allows(&self, teacher: TeacherIdx, day: DayIdx, slot: SlotIdx) -> bool {
        match &self.teacher_allowed[teacher] {
            Some(pairs) => pairs.contains(&(day, slot)),
            None => true,
        }
    }

    pub fn teacher_allowed_pairs(&self, teacher: TeacherIdx) -> Option<&HashSet<(DayIdx, SlotIdx)>> {
        self.teacher_allowed[teacher].as_ref()
    }

    /// A physical room whose occupancy is tracked.
    #[inline]
    pub fn physical_room(&self, room: Option<RoomIdx>) -> Option<RoomIdx> {
        room.filter(|&idx| !self.rooms[idx].is_virtual)
    }

    pub fn variable_key(&self, var: VarIdx) -> VariableKey {
        let variable = self.variables[var];
        let req = &self.requirements[variable.requirement];
        VariableKey {
            course_code: req.course_code.clone(),
            section_id: req.section_id.clone(),
            meeting_index: variable.meeting_index,
        }
    }

    pub fn candidate_value(&self, candidate: Candidate) -> CandidateValue {
        CandidateValue {
            day: self.days[candidate.day].clone(),
            slot_id: self.timeslots[candidate.slot].id.clone(),
            room: candidate.room.map(|idx| self.rooms[idx].name.clone()),
        }
    }
}
