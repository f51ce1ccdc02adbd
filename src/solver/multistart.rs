use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::SolveConfig;
use crate::error::ScheduleError;
use crate::model::{DecisionState, ScheduleModel};

use super::{SolveOptions, SolveStatus, Solver};

/// Multistart orchestration over a nonconvex model: the backend is invoked
/// once per restart from a fresh randomized starting point, and the feasible
/// solution with the lowest cost wins. Individual restarts that come back
/// infeasible, unbounded, errored, or over their deadline are skipped; the
/// orchestration fails only when every restart failed.
pub struct Multistart {
    solver: Box<dyn Solver>,
    restarts: usize,
    seed: u64,
    per_restart_timeout: Option<Duration>,
    suppress_unbounded_warning: bool,
    tolerance: f64,
}

/// The promoted best-of-all-restarts solution.
#[derive(Debug, Clone)]
pub struct SolvedSchedule {
    pub state: DecisionState,
    pub total_cost: f64,
    pub best_restart: usize,
    pub restarts_attempted: usize,
    pub restarts_converged: usize,
}

impl Multistart {
    pub fn new(solver: Box<dyn Solver>, config: &SolveConfig) -> Self {
        Self {
            solver,
            restarts: config.restarts.max(1),
            seed: config.seed,
            per_restart_timeout: config.per_restart_timeout(),
            suppress_unbounded_warning: config.suppress_unbounded_warning,
            tolerance: config.tolerance,
        }
    }

    /// Starting rates for one restart: independently drawn uniform values
    /// within each cohort's rate bounds on its available hours, zero
    /// elsewhere. Deterministic in (seed, restart).
    pub fn start_rates(&self, model: &ScheduleModel, restart: usize) -> Vec<Vec<f64>> {
        let mut rng =
            StdRng::seed_from_u64(self.seed ^ (restart as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        model
            .cohorts()
            .iter()
            .map(|cohort| {
                let mut rates = vec![0.0; model.horizon()];
                for t in cohort.available_hours() {
                    rates[t] = rng.gen_range(-cohort.max_rate_kw..=cohort.max_rate_kw);
                }
                rates
            })
            .collect()
    }

    pub fn run(&self, model: &ScheduleModel) -> Result<SolvedSchedule, ScheduleError> {
        let mut best: Option<SolvedSchedule> = None;
        let mut converged = 0;

        for restart in 0..self.restarts {
            let start = self.start_rates(model, restart);
            let options = SolveOptions {
                deadline: self.per_restart_timeout.map(|t| Instant::now() + t),
                tolerance: self.tolerance,
            };

            match self.solver.solve(model, &start, &options) {
                SolveStatus::Optimal(state) => {
                    let violation = model.max_violation(&state);
                    if violation > self.tolerance {
                        warn!(restart, violation, "discarding out-of-tolerance solution");
                        continue;
                    }
                    converged += 1;
                    let cost = model.total_cost(&state);
                    debug!(restart, cost, solver = self.solver.name(), "restart converged");
                    let better = best
                        .as_ref()
                        .map_or(true, |b| OrderedFloat(cost) < OrderedFloat(b.total_cost));
                    if better {
                        best = Some(SolvedSchedule {
                            state,
                            total_cost: cost,
                            best_restart: restart,
                            restarts_attempted: self.restarts,
                            restarts_converged: 0,
                        });
                    }
                }
                SolveStatus::Infeasible => {
                    debug!(restart, "restart reported infeasible");
                }
                SolveStatus::Unbounded => {
                    if self.suppress_unbounded_warning {
                        debug!(restart, "restart reported unbounded");
                    } else {
                        warn!(restart, "restart reported unbounded");
                    }
                }
                SolveStatus::Error(message) => {
                    warn!(restart, %message, "restart failed");
                }
            }
        }

        match best {
            Some(mut solved) => {
                solved.restarts_converged = converged;
                info!(
                    cost = solved.total_cost,
                    best_restart = solved.best_restart,
                    converged,
                    attempted = self.restarts,
                    "multistart finished"
                );
                Ok(solved)
            }
            None => Err(ScheduleError::NoFeasibleSolution {
                attempts: self.restarts,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CohortConfig;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Scripted backend: pops one prepared status per invocation.
    struct ScriptedSolver {
        script: Mutex<Vec<SolveStatus>>,
    }

    impl ScriptedSolver {
        fn new(mut script: Vec<SolveStatus>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
            }
        }
    }

    impl Solver for ScriptedSolver {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn solve(
            &self,
            _model: &ScheduleModel,
            _start: &[Vec<f64>],
            _options: &SolveOptions,
        ) -> SolveStatus {
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(SolveStatus::Infeasible)
        }
    }

    fn tiny_model() -> ScheduleModel {
        let cohorts = vec![CohortConfig {
            initial_storage_kwh: 0.0,
            max_storage_kwh: 1.0,
            max_rate_kw: 1.0,
            availability: [0i64, 1].into_iter().collect::<BTreeSet<_>>(),
            price_influence: 0.0,
        }];
        ScheduleModel::new(2, &cohorts, vec![1.0, 2.0]).unwrap()
    }

    fn config(restarts: usize) -> SolveConfig {
        SolveConfig {
            restarts,
            seed: 7,
            per_restart_timeout_ms: None,
            suppress_unbounded_warning: true,
            tolerance: 1e-6,
        }
    }

    #[test]
    fn keeps_the_cheapest_feasible_restart() {
        let model = tiny_model();
        // charge early (cost 1) vs charge late (cost 2); both feasible
        let cheap = model.state_from_rates(vec![vec![1.0, 0.0]]);
        let dear = model.state_from_rates(vec![vec![0.0, 1.0]]);
        let orchestrator = Multistart::new(
            Box::new(ScriptedSolver::new(vec![
                SolveStatus::Optimal(dear),
                SolveStatus::Optimal(cheap),
            ])),
            &config(2),
        );
        let solved = orchestrator.run(&model).unwrap();
        assert!((solved.total_cost - 1.0).abs() < 1e-12);
        assert_eq!(solved.best_restart, 1);
        assert_eq!(solved.restarts_converged, 2);
    }

    #[test]
    fn failures_are_skipped_not_fatal() {
        let model = tiny_model();
        let good = model.state_from_rates(vec![vec![0.0, 1.0]]);
        let orchestrator = Multistart::new(
            Box::new(ScriptedSolver::new(vec![
                SolveStatus::Infeasible,
                SolveStatus::Unbounded,
                SolveStatus::Error("solver crashed".into()),
                SolveStatus::Optimal(good),
            ])),
            &config(4),
        );
        let solved = orchestrator.run(&model).unwrap();
        assert_eq!(solved.restarts_converged, 1);
        assert_eq!(solved.best_restart, 3);
    }

    #[test]
    fn all_failed_restarts_is_no_feasible_solution() {
        let model = tiny_model();
        let orchestrator = Multistart::new(
            Box::new(ScriptedSolver::new(vec![
                SolveStatus::Infeasible,
                SolveStatus::Error("diverged".into()),
                SolveStatus::Unbounded,
            ])),
            &config(3),
        );
        let err = orchestrator.run(&model).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::NoFeasibleSolution { attempts: 3 }
        ));
    }

    #[test]
    fn out_of_tolerance_solutions_are_discarded() {
        let model = tiny_model();
        // terminal storage misses the full-charge target by 0.5
        let bad = model.state_from_rates(vec![vec![0.5, 0.0]]);
        let orchestrator = Multistart::new(
            Box::new(ScriptedSolver::new(vec![SolveStatus::Optimal(bad)])),
            &config(1),
        );
        assert!(orchestrator.run(&model).is_err());
    }

    #[test]
    fn start_rates_are_deterministic_and_in_bounds() {
        let model = tiny_model();
        let orchestrator = Multistart::new(
            Box::new(ScriptedSolver::new(Vec::new())),
            &config(2),
        );
        let a = orchestrator.start_rates(&model, 0);
        let b = orchestrator.start_rates(&model, 0);
        let c = orchestrator.start_rates(&model, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
        for rates in &a {
            for &r in rates {
                assert!(r.abs() <= 1.0);
            }
        }
    }
}
