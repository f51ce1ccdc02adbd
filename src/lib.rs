pub mod config;
pub mod error;
pub mod model;
pub mod price;
pub mod report;
pub mod solver;
pub mod telemetry;
pub mod validate;

pub use config::{CohortConfig, PriceConfig, SolveConfig, StudyConfig};
pub use error::ScheduleError;
pub use model::{DecisionState, ScheduleModel};
pub use price::base_prices;
pub use report::{extract, ScheduleReport};
pub use solver::{Multistart, ProjectedGradientSolver, SolveOptions, SolveStatus, Solver};
pub use validate::validate_cohorts;
