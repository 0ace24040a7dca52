//! Course timetabling as a constraint satisfaction problem.
//!
//! Every required meeting of a course section is a variable whose domain is
//! `day x timeslot x room`. A backtracking search places meetings so that no
//! section, teacher or physical room is double-booked and every course
//! reaches its minimum weekly hours. In partial mode requirements that cannot
//! be placed are skipped and reported instead of failing the run.

pub mod availability;
pub mod clock;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod feasibility;
pub mod model;
pub mod search;
pub mod server;
pub mod solver;
pub mod state;
pub mod timeslot;

pub use config::{ServerConfig, SolverConfig};
pub use data::{SchedulingInput, SchedulingOutput, SolveRequest};
pub use error::{SolveError, Warning};
pub use solver::{Timetable, diagnose, solve};
