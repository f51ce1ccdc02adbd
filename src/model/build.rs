use serde::Serialize;

use crate::config::CohortConfig;
use crate::error::ScheduleError;
use crate::validate::validate_cohorts;

use super::constraints::{Constraint, LinearExpr, Var};
use super::state::DecisionState;

/// A validated cohort, reindexed for the model: availability as a dense
/// hour mask plus the terminal hour at which full charge is due.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCohort {
    pub initial_kwh: f64,
    pub max_kwh: f64,
    pub max_rate_kw: f64,
    pub price_influence: f64,
    pub available: Vec<bool>,
    /// `max(availability) + 1`: storage must equal `max_kwh` here. This is
    /// per cohort, not the horizon end.
    pub target_hour: usize,
}

impl ModelCohort {
    pub fn available_hours(&self) -> impl Iterator<Item = usize> + '_ {
        self.available
            .iter()
            .enumerate()
            .filter_map(|(t, &on)| on.then_some(t))
    }

    pub fn window_len(&self) -> usize {
        self.available.iter().filter(|&&on| on).count()
    }

    pub fn required_energy_kwh(&self) -> f64 {
        self.max_kwh - self.initial_kwh
    }
}

/// The assembled optimization problem: decision variables, the declarative
/// constraint list, and the bilinear objective.
///
/// Construction is a pure function of (cohorts, base prices, horizon); the
/// model encodes constraints for a solver to evaluate but proves nothing
/// about their joint feasibility.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleModel {
    horizon: usize,
    cohorts: Vec<ModelCohort>,
    base_price: Vec<f64>,
    constraints: Vec<Constraint>,
}

impl ScheduleModel {
    /// Validates the cohorts and builds the constraint system.
    pub fn new(
        horizon: usize,
        cohorts: &[CohortConfig],
        base_price: Vec<f64>,
    ) -> Result<Self, ScheduleError> {
        validate_cohorts(horizon, cohorts)?;
        assert_eq!(base_price.len(), horizon, "base price must cover the horizon");

        let cohorts: Vec<ModelCohort> = cohorts
            .iter()
            .map(|c| {
                let mut available = vec![false; horizon];
                for &hour in &c.availability {
                    available[hour as usize] = true;
                }
                // last_available_hour is Some for every validated cohort
                let last = c.last_available_hour().unwrap_or_default() as usize;
                ModelCohort {
                    initial_kwh: c.initial_storage_kwh,
                    max_kwh: c.max_storage_kwh,
                    max_rate_kw: c.max_rate_kw,
                    price_influence: c.price_influence,
                    available,
                    target_hour: last + 1,
                }
            })
            .collect();

        let constraints = build_constraints(horizon, &cohorts, &base_price);

        Ok(Self {
            horizon,
            cohorts,
            base_price,
            constraints,
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn cohorts(&self) -> &[ModelCohort] {
        &self.cohorts
    }

    pub fn base_price(&self) -> &[f64] {
        &self.base_price
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Clearing price at `hour` implied by the feedback equation for the
    /// given per-cohort rates.
    pub fn clearing_price(&self, hour: usize, rate_at_hour: impl Fn(usize) -> f64) -> f64 {
        self.base_price[hour]
            + self
                .cohorts
                .iter()
                .enumerate()
                .map(|(i, c)| c.price_influence * rate_at_hour(i))
                .sum::<f64>()
    }

    /// Completes a rate matrix into a full assignment: storage follows the
    /// recurrence, price follows the feedback equation, so those equality
    /// rows hold exactly by construction.
    pub fn state_from_rates(&self, rate: Vec<Vec<f64>>) -> DecisionState {
        let storage = self
            .cohorts
            .iter()
            .zip(&rate)
            .map(|(cohort, rates)| {
                let mut series = Vec::with_capacity(self.horizon + 1);
                let mut held = cohort.initial_kwh;
                series.push(held);
                for &r in rates {
                    held += r;
                    series.push(held);
                }
                series
            })
            .collect();
        let price = (0..self.horizon)
            .map(|t| self.clearing_price(t, |i| rate[i][t]))
            .collect();
        DecisionState {
            storage,
            rate,
            price,
        }
    }

    /// Total cost of the schedule: `Σ_i Σ_t price[t]·rate[i][t]`, the
    /// quantity being minimized. Bilinear: price is itself linear in the
    /// rates whenever any price influence is nonzero.
    pub fn total_cost(&self, state: &DecisionState) -> f64 {
        (0..self.horizon)
            .map(|t| state.price[t] * state.total_rate(t))
            .sum()
    }

    /// Cost attributable to one cohort at realized prices.
    pub fn cohort_cost(&self, state: &DecisionState, cohort: usize) -> f64 {
        (0..self.horizon)
            .map(|t| state.price[t] * state.rate[cohort][t])
            .sum()
    }

    /// Worst absolute violation across the whole constraint list.
    pub fn max_violation(&self, state: &DecisionState) -> f64 {
        self.constraints
            .iter()
            .map(|c| c.violation(state))
            .fold(0.0, f64::max)
    }
}

/// Declarative constraint generation (no solver involved):
/// boundary rows, window rows, storage corridor, the storage recurrence,
/// and the price-feedback rows.
fn build_constraints(
    horizon: usize,
    cohorts: &[ModelCohort],
    base_price: &[f64],
) -> Vec<Constraint> {
    let mut rows = Vec::new();

    for (i, cohort) in cohorts.iter().enumerate() {
        // storage starts at the initial value
        rows.push(Constraint::Equality(
            LinearExpr::with_constant(-cohort.initial_kwh)
                .plus(1.0, Var::Storage { cohort: i, hour: 0 }),
        ));
        // full charge one hour past the cohort's own last available hour
        rows.push(Constraint::Equality(
            LinearExpr::with_constant(-cohort.max_kwh).plus(
                1.0,
                Var::Storage {
                    cohort: i,
                    hour: cohort.target_hour,
                },
            ),
        ));
    }

    for t in 0..horizon {
        for (i, cohort) in cohorts.iter().enumerate() {
            let rate = Var::Rate { cohort: i, hour: t };
            if cohort.available[t] {
                rows.push(Constraint::Bounds {
                    var: rate,
                    lo: -cohort.max_rate_kw,
                    hi: cohort.max_rate_kw,
                });
            } else {
                // offline hours hold the rate at exactly zero
                rows.push(Constraint::Equality(LinearExpr::default().plus(1.0, rate)));
            }
            rows.push(Constraint::Bounds {
                var: Var::Storage { cohort: i, hour: t },
                lo: 0.0,
                hi: cohort.max_kwh,
            });
            // update rule: storage at the next hour is storage plus rate
            rows.push(Constraint::Equality(
                LinearExpr::default()
                    .plus(1.0, Var::Storage { cohort: i, hour: t + 1 })
                    .plus(-1.0, Var::Storage { cohort: i, hour: t })
                    .plus(-1.0, rate),
            ));
        }
        // price feedback: clearing price is the base price plus the
        // demand-driven increment, and may not go negative
        let mut feedback = LinearExpr::with_constant(-base_price[t]).plus(1.0, Var::Price { hour: t });
        for (i, cohort) in cohorts.iter().enumerate() {
            feedback = feedback.plus(-cohort.price_influence, Var::Rate { cohort: i, hour: t });
        }
        rows.push(Constraint::Equality(feedback));
        rows.push(Constraint::Bounds {
            var: Var::Price { hour: t },
            lo: 0.0,
            hi: f64::INFINITY,
        });
    }

    // the terminal storage slot is bounded too
    for (i, cohort) in cohorts.iter().enumerate() {
        rows.push(Constraint::Bounds {
            var: Var::Storage { cohort: i, hour: horizon },
            lo: 0.0,
            hi: cohort.max_kwh,
        });
    }

    rows
}
