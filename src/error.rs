use thiserror::Error;

/// Failure modes of one scheduling run, from config validation through
/// result extraction.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid configuration: cohort {cohort} lists hour {hour}, outside [0, {horizon})")]
    InvalidConfiguration {
        cohort: usize,
        hour: i64,
        horizon: usize,
    },

    #[error("invalid configuration: cohort {cohort}: {reason}")]
    BadCohort { cohort: usize, reason: String },

    #[error("no variable assignment satisfies the constraints")]
    Infeasible,

    #[error("objective is unbounded below (check price influence signs)")]
    Unbounded,

    #[error("solver error: {0}")]
    SolverError(String),

    #[error("no feasible solution found in {attempts} restart(s)")]
    NoFeasibleSolution { attempts: usize },

    #[error("cohort {cohort} delivered zero net energy; average price is undefined")]
    DivisionUndefined { cohort: usize },
}
