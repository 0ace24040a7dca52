//! Backtracking search over meeting placements.
//!
//! The engine runs on an explicit stack with one [`Frame`] per variable
//! decision, so search depth is bounded by memory and not by the call stack.
//!
//! - Variable selection is minimum-remaining-values over live state; ties go
//!   to the first variable in model order.
//! - Candidates are ordered to spread a requirement over distinct days and
//!   to keep crowded `(day, timeslot)` cells free.
//! - In partial mode an over-constrained requirement is abandoned as a whole
//!   (all of its meetings are skipped and any placed ones released) once one
//!   of its meetings runs out of candidates or exceeds its attempt budget.

use log::{debug, info, trace, warn};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::time::Instant;

use crate::config::SolverConfig;
use crate::data::SearchStats;
use crate::error::SolveError;
use crate::feasibility::{self, conflict_count};
use crate::model::{Candidate, Problem, ReqIdx, VarIdx};
use crate::state::SearchState;

const STRUGGLE_MILESTONES: [u32; 3] = [100, 250, 400];
const DEADLINE_CHECK_INTERVAL: u64 = 64;
const MAX_REPORTED_DEAD_ENDS: usize = 20;

/// Why a requirement was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoFeasibleTimeslot,
    AttemptBudgetExceeded { limit: u32 },
    /// Zero meetings requested against a positive minimum.
    MinimumUnreachable,
    SearchBudgetExhausted,
    SearchExhausted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoFeasibleTimeslot => write!(
                f,
                "No feasible timeslots available (teacher busy, section conflict, or room occupied)"
            ),
            SkipReason::AttemptBudgetExceeded { limit } => write!(
                f,
                "Could not place after {limit} attempts (likely over-constrained or conflicting requirements)"
            ),
            SkipReason::MinimumUnreachable => write!(
                f,
                "No meetings requested but a positive minimum of hours is required"
            ),
            SkipReason::SearchBudgetExhausted => {
                write!(f, "Search budget exhausted before this requirement was placed")
            }
            SkipReason::SearchExhausted => write!(
                f,
                "Search exhausted without satisfying this requirement alongside the others"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipEntry {
    pub requirement: ReqIdx,
    pub reason: SkipReason,
}

/// Final state of a search. Skipped variables hold no value in `state`.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub state: SearchState,
    pub skipped: Vec<SkipEntry>,
    pub skipped_vars: Vec<bool>,
    pub stats: SearchStats,
}

impl SearchOutcome {
    pub fn is_skipped(&self, var: VarIdx) -> bool {
        self.skipped_vars[var]
    }
}

#[derive(Debug)]
struct Frame {
    var: VarIdx,
    candidates: Vec<Candidate>,
    next: usize,
    placed: bool,
    /// The owning requirement was skipped; the frame only unwinds.
    spent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Select,
    Advance,
}

enum Selection {
    Complete,
    Backtrack,
    Skipped,
    Pushed,
}

pub struct Search<'a> {
    problem: &'a Problem,
    config: &'a SolverConfig,
    state: SearchState,
    skipped_vars: Vec<bool>,
    skipped_reqs: Vec<bool>,
    skip_log: Vec<SkipEntry>,
    attempts: Vec<u32>,
    stack: Vec<Frame>,
    rng: Option<ChaCha8Rng>,
    dead_ends: Vec<VarIdx>,
    steps: u64,
    backtracks: u64,
    started: Instant,
    last_progress: Option<usize>,
}

impl<'a> Search<'a> {
    pub fn new(problem: &'a Problem, config: &'a SolverConfig) -> Self {
        Self {
            problem,
            config,
            state: SearchState::new(problem),
            skipped_vars: vec![false; problem.variables.len()],
            skipped_reqs: vec![false; problem.requirements.len()],
            skip_log: Vec::new(),
            attempts: vec![0; problem.variables.len()],
            stack: Vec::new(),
            rng: config.seed.map(ChaCha8Rng::seed_from_u64),
            dead_ends: Vec::new(),
            steps: 0,
            backtracks: 0,
            started: Instant::now(),
            last_progress: None,
        }
    }

    pub fn run(mut self) -> Result<SearchOutcome, SolveError> {
        info!(
            "Starting search over {} variables (partial mode: {}).",
            self.problem.variables.len(),
            self.config.allow_partial
        );
        self.skip_empty_requirements()?;

        let mut step = Step::Select;
        loop {
            if self.budget_exhausted() {
                return self.interrupt();
            }
            self.steps += 1;

            step = match step {
                Step::Select => match self.select() {
                    Selection::Complete => return Ok(self.finish()),
                    Selection::Skipped => Step::Select,
                    Selection::Backtrack | Selection::Pushed => Step::Advance,
                },
                Step::Advance => {
                    if self.stack.is_empty() {
                        return self.exhausted();
                    }
                    if self.advance() {
                        Step::Select
                    } else {
                        Step::Advance
                    }
                }
            };
        }
    }

    /// Requirements with no meetings can never reach a positive minimum.
    fn skip_empty_requirements(&mut self) -> Result<(), SolveError> {
        let unreachable: Vec<ReqIdx> = self
            .problem
            .requirements
            .iter()
            .enumerate()
            .filter(|(_, req)| req.variables.is_empty() && req.min_minutes > 0)
            .map(|(idx, _)| idx)
            .collect();
        if unreachable.is_empty() {
            return Ok(());
        }
        if !self.config.allow_partial {
            return Err(SolveError::Unsatisfiable {
                zero_option_variables: unreachable
                    .iter()
                    .map(|&idx| {
                        let req = &self.problem.requirements[idx];
                        format!("({}, {}, -)", req.course_code, req.section_id)
                    })
                    .collect(),
                dead_ends: Vec::new(),
            });
        }
        for req in unreachable {
            self.skip_requirement(req, SkipReason::MinimumUnreachable);
        }
        Ok(())
    }

    fn select(&mut self) -> Selection {
        let Some((var, options)) = self.select_variable() else {
            // every active variable holds a value
            return if self.minimums_met() {
                Selection::Complete
            } else {
                Selection::Backtrack
            };
        };
        self.report_progress();

        let problem = self.problem;
        let req_idx = problem.variables[var].requirement;
        self.attempts[var] += 1;
        let attempts = self.attempts[var];

        if attempts == 1 {
            let req = &problem.requirements[req_idx];
            debug!(
                "Processing: course={} section={} teacher={} meeting={}/{}",
                req.course_code,
                req.section_id,
                req.teacher,
                problem.variables[var].meeting_index,
                req.slots_required
            );
        } else if STRUGGLE_MILESTONES.contains(&attempts) {
            debug!(
                "Struggling with {} (attempt {attempts})",
                problem.variable_key(var)
            );
        }

        if options == 0 && !self.dead_ends.contains(&var) {
            self.dead_ends.push(var);
        }

        if self.config.allow_partial {
            if attempts > self.config.max_attempts_per_variable {
                let reason = if options == 0 {
                    SkipReason::NoFeasibleTimeslot
                } else {
                    SkipReason::AttemptBudgetExceeded {
                        limit: self.config.max_attempts_per_variable,
                    }
                };
                self.skip_requirement(req_idx, reason);
                return Selection::Skipped;
            }
            if options == 0 {
                self.skip_requirement(req_idx, SkipReason::NoFeasibleTimeslot);
                return Selection::Skipped;
            }
        }

        let mut candidates = feasibility::feasible_candidates(problem, &self.state, var);
        self.order_candidates(var, &mut candidates);
        if self.config.allow_partial && candidates.len() > self.config.branching_cap {
            debug!(
                "Limiting candidates from {} to {} for {}",
                candidates.len(),
                self.config.branching_cap,
                problem.variable_key(var)
            );
            candidates.truncate(self.config.branching_cap);
        }

        self.stack.push(Frame {
            var,
            candidates,
            next: 0,
            placed: false,
            spent: false,
        });
        Selection::Pushed
    }

    /// Moves the top frame to its next candidate. Returns `false` when the
    /// frame is exhausted and was popped.
    fn advance(&mut self) -> bool {
        let problem = self.problem;
        let Some(frame) = self.stack.last_mut() else {
            return false;
        };
        if frame.placed {
            self.state.remove(problem, frame.var);
            frame.placed = false;
        }
        if frame.spent || frame.next >= frame.candidates.len() {
            self.stack.pop();
            self.backtracks += 1;
            return false;
        }

        let candidate = frame.candidates[frame.next];
        frame.next += 1;
        frame.placed = true;
        self.state.place(problem, frame.var, candidate);
        true
    }

    /// MRV: the active unassigned variable with the fewest feasible
    /// candidates. Stops scanning at the first variable with none.
    fn select_variable(&self) -> Option<(VarIdx, usize)> {
        let mut best: Option<(VarIdx, usize)> = None;
        for var in 0..self.problem.variables.len() {
            if self.skipped_vars[var] || self.state.is_assigned(var) {
                continue;
            }
            let count = feasibility::count_feasible(self.problem, &self.state, var);
            if best.is_none_or(|(_, best_count)| count < best_count) {
                best = Some((var, count));
                if count == 0 {
                    break;
                }
            }
        }
        if let Some((var, count)) = best {
            trace!("MRV picked {} with {count} option(s)", self.problem.variable_key(var));
        }
        best
    }

    /// Least-constraining-value style ordering, stable over the (optionally
    /// shuffled) domain order.
    fn order_candidates(&mut self, var: VarIdx, candidates: &mut [Candidate]) {
        if let Some(rng) = self.rng.as_mut() {
            candidates.shuffle(rng);
        }

        let problem = self.problem;
        let state = &self.state;
        let req_idx = problem.variables[var].requirement;
        let req = &problem.requirements[req_idx];
        let used_days = state.days_used_by(problem, req_idx);

        candidates.sort_by_cached_key(|c| {
            let day_reused = used_days.contains(&c.day);
            let conflicts = conflict_count(problem, state.sections(), c.day, req.section_idx, c.slot)
                + conflict_count(problem, state.teachers(), c.day, req.teacher_idx, c.slot)
                + c.room
                    .map_or(0, |room| conflict_count(problem, state.rooms(), c.day, room, c.slot));
            let load = state.sections().holders(c.day, c.slot)
                + state.teachers().holders(c.day, c.slot)
                + state.rooms().holders(c.day, c.slot);
            (
                day_reused,
                conflicts,
                load,
                c.day,
                problem.timeslots[c.slot].start,
            )
        });
    }

    /// Every active requirement has reached its minimum minutes.
    fn minimums_met(&self) -> bool {
        self.problem
            .requirements
            .iter()
            .enumerate()
            .filter(|&(idx, _)| !self.skipped_reqs[idx])
            .all(|(idx, req)| self.state.running_minutes(idx) >= req.min_minutes)
    }

    /// Abandons `req` for the rest of the search. Placed meetings are
    /// released and their frames left to unwind.
    fn skip_requirement(&mut self, req_idx: ReqIdx, reason: SkipReason) {
        if self.skipped_reqs[req_idx] {
            return;
        }
        let problem = self.problem;
        let req = &problem.requirements[req_idx];
        self.skipped_reqs[req_idx] = true;
        for var in req.variables.clone() {
            self.skipped_vars[var] = true;
        }
        for frame in self.stack.iter_mut() {
            if problem.variables[frame.var].requirement != req_idx {
                continue;
            }
            if frame.placed {
                self.state.remove(problem, frame.var);
                frame.placed = false;
            }
            frame.spent = true;
        }

        warn!(
            "[SKIP] course={} section={} teacher={}: {reason}",
            req.course_code, req.section_id, req.teacher
        );
        self.skip_log.push(SkipEntry {
            requirement: req_idx,
            reason,
        });
    }

    fn budget_exhausted(&self) -> bool {
        if self
            .config
            .max_steps
            .is_some_and(|max_steps| self.steps >= max_steps)
        {
            return true;
        }
        match self.config.time_limit() {
            Some(limit) if self.steps % DEADLINE_CHECK_INTERVAL == 0 => {
                self.started.elapsed() >= limit
            }
            _ => false,
        }
    }

    fn interrupt(mut self) -> Result<SearchOutcome, SolveError> {
        warn!("Search budget exhausted after {} steps.", self.steps);
        if !self.config.allow_partial {
            return Err(SolveError::Interrupted { steps: self.steps });
        }
        let problem = self.problem;
        for (idx, req) in problem.requirements.iter().enumerate() {
            let incomplete = self.state.assigned_count(idx) < req.slots_required
                || self.state.running_minutes(idx) < req.min_minutes;
            if !self.skipped_reqs[idx] && incomplete {
                self.skip_requirement(idx, SkipReason::SearchBudgetExhausted);
            }
        }
        Ok(self.finish())
    }

    fn exhausted(mut self) -> Result<SearchOutcome, SolveError> {
        if !self.config.allow_partial {
            let zero_option_variables = (0..self.problem.variables.len())
                .filter(|&var| !self.skipped_vars[var] && !self.state.is_assigned(var))
                .filter(|&var| feasibility::count_feasible(self.problem, &self.state, var) == 0)
                .map(|var| self.problem.variable_key(var).to_string())
                .collect();
            let dead_ends = self
                .dead_ends
                .iter()
                .take(MAX_REPORTED_DEAD_ENDS)
                .map(|&var| self.problem.variable_key(var).to_string())
                .collect();
            return Err(SolveError::Unsatisfiable {
                zero_option_variables,
                dead_ends,
            });
        }

        warn!("[PARTIAL SOLUTION] Search exhausted; remaining requirements are left unscheduled.");
        for idx in 0..self.problem.requirements.len() {
            self.skip_requirement(idx, SkipReason::SearchExhausted);
        }
        Ok(self.finish())
    }

    fn report_progress(&mut self) {
        let placed = self.state.placed_count();
        if placed % 10 == 0 && self.last_progress != Some(placed) {
            let active = self.skipped_vars.iter().filter(|&&skipped| !skipped).count();
            debug!("[PROGRESS] Assigned {placed}/{active} variables");
            self.last_progress = Some(placed);
        }
    }

    fn finish(self) -> SearchOutcome {
        let stats = SearchStats {
            steps: self.steps,
            backtracks: self.backtracks,
            skipped_requirements: self.skip_log.len(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        };
        info!(
            "Search finished after {} steps and {} backtracks in {:.2?}.",
            stats.steps,
            stats.backtracks,
            self.started.elapsed()
        );
        SearchOutcome {
            state: self.state,
            skipped: self.skip_log,
            skipped_vars: self.skipped_vars,
            stats,
        }
    }
}

/// Runs the search for `problem` under `config`.
pub fn search(problem: &Problem, config: &SolverConfig) -> Result<SearchOutcome, SolveError> {
    Search::new(problem, config).run()
}
