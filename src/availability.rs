use chrono::NaiveTime;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::clock::{self, ClockRange};
use crate::data::TeacherAvailabilityRow;
use crate::error::{FallbackCause, Warning, WarningLog};
use crate::timeslot::{SlotIdx, Timeslot};

/// Position of a day in the model's day list.
pub type DayIdx = usize;

/// A declared availability window. Bounds are `None` when the cell was blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub day: String,
    pub from: Option<NaiveTime>,
    pub to: Option<NaiveTime>,
}

/// Groups availability rows by teacher, expanding `Mon / Wed` day cells into
/// one window per day. Rows with unparseable times are dropped.
pub fn windows_from_rows(
    rows: &[TeacherAvailabilityRow],
    warnings: &mut WarningLog,
) -> BTreeMap<String, Vec<AvailabilityWindow>> {
    let mut windows: BTreeMap<String, Vec<AvailabilityWindow>> = BTreeMap::new();

    for row in rows {
        let teacher = row.teacher.trim().to_string();
        let (from, to) = match clock::parse_range(&row.available_from, &row.available_to) {
            ClockRange::Valid(from, to) | ClockRange::NonPositive(from, to) => {
                (Some(from), Some(to))
            }
            ClockRange::Missing => {
                let (from, to) = clock::split_range_cells(&row.available_from, &row.available_to);
                (clock::parse_clock(&from), clock::parse_clock(&to))
            }
            ClockRange::Unparseable(detail) => {
                warnings.push(Warning::MalformedTime {
                    source: "teacher availability".to_string(),
                    detail: format!("teacher={teacher} day={} {detail}", row.day.trim()),
                });
                continue;
            }
        };

        let entry = windows.entry(teacher).or_default();
        for day in row
            .day
            .split(['/', '\\'])
            .map(str::trim)
            .filter(|day| !day.is_empty())
        {
            entry.push(AvailabilityWindow {
                day: day.to_string(),
                from,
                to,
            });
        }
    }
    windows
}

/// Per-teacher set of legal `(day, timeslot)` pairs. Teachers absent from
/// the index are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityIndex {
    allowed: HashMap<String, HashSet<(DayIdx, SlotIdx)>>,
}

impl AvailabilityIndex {
    pub fn build(
        windows: &BTreeMap<String, Vec<AvailabilityWindow>>,
        days: &[String],
        timeslots: &[Timeslot],
        warnings: &mut WarningLog,
    ) -> Self {
        let day_index: HashMap<&str, DayIdx> = days
            .iter()
            .enumerate()
            .map(|(idx, day)| (day.as_str(), idx))
            .collect();
        let mut allowed = HashMap::new();

        for (teacher, declared) in windows {
            let mut normalized: Vec<(DayIdx, NaiveTime, NaiveTime)> = Vec::new();
            for window in declared {
                let mut reject = |detail: String| {
                    warnings.push(Warning::TeacherAvailability {
                        teacher: teacher.clone(),
                        detail,
                    })
                };
                let Some(&day) = day_index.get(window.day.as_str()) else {
                    reject(format!(
                        "day '{}' not found in the day list; skipping this availability window",
                        window.day
                    ));
                    continue;
                };
                let (Some(from), Some(to)) = (window.from, window.to) else {
                    reject(format!(
                        "availability window on {} has missing start/end; skipping",
                        window.day
                    ));
                    continue;
                };
                if to <= from {
                    reject(format!(
                        "availability window on {} has non-positive duration; skipping",
                        window.day
                    ));
                    continue;
                }
                normalized.push((day, from, to));
            }

            let pairs: HashSet<(DayIdx, SlotIdx)> = normalized
                .iter()
                .flat_map(|&(day, from, to)| {
                    timeslots
                        .iter()
                        .enumerate()
                        .filter(move |(_, slot)| slot.within(from, to))
                        .map(move |(slot, _)| (day, slot))
                })
                .collect();

            if pairs.is_empty() {
                let cause = if normalized.is_empty() {
                    FallbackCause::InvalidWindows
                } else {
                    FallbackCause::NoMatchingTimeslot
                };
                warnings.push(Warning::AvailabilityIgnored {
                    teacher: teacher.clone(),
                    cause,
                });
                continue;
            }
            allowed.insert(teacher.clone(), pairs);
        }

        Self { allowed }
    }

    pub fn allowed_pairs(&self, teacher: &str) -> Option<&HashSet<(DayIdx, SlotIdx)>> {
        self.allowed.get(teacher)
    }

    pub fn constrained_teachers(&self) -> usize {
        self.allowed.len()
    }
}
