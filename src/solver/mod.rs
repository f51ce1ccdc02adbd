pub mod multistart;
pub mod projected;

pub use multistart::*;
pub use projected::*;

use std::time::Instant;

use crate::model::{DecisionState, ScheduleModel};

/// Outcome of one backend invocation. "Optimal" means the backend converged
/// to a point it accepts; for nonconvex models that is a local optimum.
#[derive(Debug, Clone)]
pub enum SolveStatus {
    Optimal(DecisionState),
    Infeasible,
    Unbounded,
    Error(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Wall-clock cutoff for this attempt; exceeded means the attempt is
    /// abandoned, not the whole orchestration.
    pub deadline: Option<Instant>,
    /// Maximum constraint violation accepted in a returned solution.
    pub tolerance: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            deadline: None,
            tolerance: 1e-6,
        }
    }
}

/// Capability interface over numerical backends. The core depends only on
/// this contract: given a model and a starting rate matrix, return a status
/// and, on `Optimal`, a value for every decision variable.
pub trait Solver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, model: &ScheduleModel, start: &[Vec<f64>], options: &SolveOptions)
        -> SolveStatus;
}
