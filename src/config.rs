use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 200;
pub const DEFAULT_BRANCHING_CAP: usize = 20;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const BIND_ADDR_ENV: &str = "TIMETABLE_BIND_ADDR";

/// Tunables for one `solve` call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    /// Skip over-constrained requirements instead of failing the run.
    pub allow_partial: bool,
    /// Placement attempts on one variable before its requirement is abandoned.
    pub max_attempts_per_variable: u32,
    /// Candidates tried per variable in partial mode.
    pub branching_cap: usize,
    /// Seeds the tie-break shuffle. `None` keeps domain order for ties.
    pub seed: Option<u64>,
    pub max_steps: Option<u64>,
    pub time_limit_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            allow_partial: true,
            max_attempts_per_variable: DEFAULT_MAX_ATTEMPTS,
            branching_cap: DEFAULT_BRANCHING_CAP,
            seed: None,
            max_steps: None,
            time_limit_ms: None,
        }
    }
}

impl SolverConfig {
    pub fn strict() -> Self {
        Self {
            allow_partial: false,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var(BIND_ADDR_ENV)
            .ok()
            .filter(|addr| !addr.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        Self { bind_addr }
    }
}
