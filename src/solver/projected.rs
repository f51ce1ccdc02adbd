use std::time::Instant;

use tracing::{debug, trace};

use crate::model::ScheduleModel;

use super::{SolveOptions, SolveStatus, Solver};

/// In-tree nonlinear backend: projected gradient descent on the bilinear
/// objective.
///
/// Only the rates are free variables; storage follows the recurrence and
/// price follows the feedback equation, so every equality row of the model
/// holds by construction. The per-cohort feasible set (rate box, storage
/// corridor expressed as prefix-sum slabs, and the terminal full-charge sum)
/// is handled by cyclic projections; each gradient step is re-projected, so
/// every iterate is feasible and the best-cost iterate is returned.
///
/// The objective is indefinite whenever price influences differ across
/// cohorts, so a single descent run only finds a local optimum; the
/// multistart orchestrator owns the global search.
pub struct ProjectedGradientSolver {
    pub max_iterations: usize,
    /// Cap on cyclic-projection passes per projection call.
    pub projection_passes: usize,
    /// Residual at which a point counts as projected.
    pub projection_tolerance: f64,
    /// Weight of the quadratic penalty steering the price away from
    /// negative territory (the projection does not see the price rows).
    pub price_penalty: f64,
}

impl Default for ProjectedGradientSolver {
    fn default() -> Self {
        Self {
            max_iterations: 1_500,
            projection_passes: 2_000,
            projection_tolerance: 1e-10,
            price_penalty: 100.0,
        }
    }
}

/// One cohort's feasible set, compacted to its available hours.
struct Window {
    /// Available hours, ascending.
    hours: Vec<usize>,
    max_rate: f64,
    /// Prefix sums must stay in `[prefix_lo, prefix_hi]` (storage corridor
    /// shifted by the initial storage).
    prefix_lo: f64,
    prefix_hi: f64,
    /// The full sum must hit this exactly (terminal full charge).
    target: f64,
}

impl Window {
    fn of(cohort: &crate::model::ModelCohort) -> Self {
        Self {
            hours: cohort.available_hours().collect(),
            max_rate: cohort.max_rate_kw,
            prefix_lo: -cohort.initial_kwh,
            prefix_hi: cohort.max_kwh - cohort.initial_kwh,
            target: cohort.required_energy_kwh(),
        }
    }

    /// The window can deliver the required energy at all.
    fn is_satisfiable(&self) -> bool {
        self.max_rate * self.hours.len() as f64 + 1e-12 >= self.target
    }

    /// Cyclic projection onto box ∩ prefix slabs ∩ sum hyperplane. Returns
    /// the worst residual after the final pass.
    fn project(&self, rates: &mut [f64], passes: usize, tolerance: f64) -> f64 {
        let k = rates.len();
        if k == 0 {
            return self.target.abs();
        }
        let mut residual = f64::INFINITY;
        for _ in 0..passes {
            for r in rates.iter_mut() {
                *r = r.clamp(-self.max_rate, self.max_rate);
            }
            // interior prefixes stay inside the storage corridor
            let mut prefix = 0.0;
            for j in 0..k - 1 {
                prefix += rates[j];
                let bound = prefix.clamp(self.prefix_lo, self.prefix_hi);
                if bound != prefix {
                    let shift = (bound - prefix) / (j + 1) as f64;
                    for r in rates.iter_mut().take(j + 1) {
                        *r += shift;
                    }
                    prefix = bound;
                }
            }
            // terminal sum lands exactly on the required energy
            let sum: f64 = rates.iter().sum();
            let shift = (self.target - sum) / k as f64;
            for r in rates.iter_mut() {
                *r += shift;
            }

            residual = self.residual(rates);
            if residual < tolerance {
                break;
            }
        }
        residual
    }

    fn residual(&self, rates: &[f64]) -> f64 {
        let mut worst: f64 = 0.0;
        let mut prefix = 0.0;
        for (j, &r) in rates.iter().enumerate() {
            worst = worst.max(r.abs() - self.max_rate);
            prefix += r;
            if j + 1 < rates.len() {
                worst = worst
                    .max(self.prefix_lo - prefix)
                    .max(prefix - self.prefix_hi);
            }
        }
        worst.max((prefix - self.target).abs())
    }
}

impl ProjectedGradientSolver {
    /// Expands compact per-window rates into the full rate matrix (offline
    /// hours exactly zero).
    fn expand(windows: &[Window], compact: &[Vec<f64>], horizon: usize) -> Vec<Vec<f64>> {
        windows
            .iter()
            .zip(compact)
            .map(|(w, r)| {
                let mut full = vec![0.0; horizon];
                for (&t, &value) in w.hours.iter().zip(r) {
                    full[t] = value;
                }
                full
            })
            .collect()
    }
}

impl Solver for ProjectedGradientSolver {
    fn name(&self) -> &'static str {
        "projected-gradient"
    }

    fn solve(
        &self,
        model: &ScheduleModel,
        start: &[Vec<f64>],
        options: &SolveOptions,
    ) -> SolveStatus {
        let horizon = model.horizon();
        let cohorts = model.cohorts();
        let windows: Vec<Window> = cohorts.iter().map(Window::of).collect();

        if windows.iter().any(|w| !w.is_satisfiable()) {
            return SolveStatus::Infeasible;
        }

        // compact the starting point and land it on the feasible set
        let mut rates: Vec<Vec<f64>> = windows
            .iter()
            .zip(start)
            .map(|(w, full)| w.hours.iter().map(|&t| full[t]).collect::<Vec<f64>>())
            .collect();
        for (window, r) in windows.iter().zip(rates.iter_mut()) {
            let residual = window.project(r, self.projection_passes, self.projection_tolerance);
            if residual > options.tolerance {
                return SolveStatus::Error(format!(
                    "projection did not converge (residual {residual:.3e})"
                ));
            }
        }

        let influences: Vec<f64> = cohorts.iter().map(|c| c.price_influence).collect();
        let lipschitz = {
            let sum: f64 = influences.iter().sum();
            influences
                .iter()
                .map(|p| p * cohorts.len() as f64 + sum)
                .fold(0.0, f64::max)
        };
        let step0 = 1.0 / (lipschitz + 1.0);

        let mut best = rates.clone();
        let mut best_cost = f64::INFINITY;
        let mut gradient: Vec<Vec<f64>> = rates.iter().map(|r| vec![0.0; r.len()]).collect();

        for iteration in 0..self.max_iterations {
            if let Some(deadline) = options.deadline {
                if Instant::now() >= deadline {
                    debug!(iteration, "restart hit its deadline");
                    return SolveStatus::Error("restart deadline exceeded".into());
                }
            }

            // realized price and aggregate rate per hour
            let mut total = vec![0.0; horizon];
            for (window, r) in windows.iter().zip(&rates) {
                for (&t, &value) in window.hours.iter().zip(r) {
                    total[t] += value;
                }
            }
            let mut price = vec![0.0; horizon];
            let mut cost = 0.0;
            for t in 0..horizon {
                let mut p = model.base_price()[t];
                for (i, window) in windows.iter().enumerate() {
                    if let Ok(slot) = window.hours.binary_search(&t) {
                        p += influences[i] * rates[i][slot];
                    }
                }
                price[t] = p;
                cost += p * total[t];
            }
            if cost < best_cost {
                best_cost = cost;
                best.clone_from(&rates);
            }

            // d cost / d rate[i][t] = price[t] + influence_i * total[t],
            // plus the penalty pushing negative prices back up
            for (i, window) in windows.iter().enumerate() {
                for (slot, &t) in window.hours.iter().enumerate() {
                    let mut g = price[t] + influences[i] * total[t];
                    if price[t] < 0.0 {
                        g += 2.0 * self.price_penalty * price[t] * influences[i];
                    }
                    gradient[i][slot] = g;
                }
            }

            let step = step0 / (1.0 + (iteration as f64 / 100.0).sqrt());
            for ((window, r), g) in windows.iter().zip(rates.iter_mut()).zip(&gradient) {
                for (value, grad) in r.iter_mut().zip(g) {
                    *value -= step * grad;
                }
                let residual = window.project(r, self.projection_passes, self.projection_tolerance);
                if residual > options.tolerance {
                    return SolveStatus::Error(format!(
                        "projection did not converge (residual {residual:.3e})"
                    ));
                }
            }
            trace!(iteration, cost, "descent step");
        }

        let state = model.state_from_rates(Self::expand(&windows, &best, horizon));
        let violation = model.max_violation(&state);
        if violation > options.tolerance {
            return SolveStatus::Error(format!(
                "converged point violates constraints by {violation:.3e}"
            ));
        }
        SolveStatus::Optimal(state)
    }
}
