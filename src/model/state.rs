use serde::Serialize;

use super::constraints::Var;

/// Dense value assignment for every decision variable of one solve attempt.
///
/// `storage[i]` has `horizon + 1` entries, `rate[i]` and `price` have
/// `horizon`. Each restart works on its own copy; only the best-found state
/// outlives the multistart loop.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionState {
    pub storage: Vec<Vec<f64>>,
    pub rate: Vec<Vec<f64>>,
    pub price: Vec<f64>,
}

impl DecisionState {
    pub fn horizon(&self) -> usize {
        self.price.len()
    }

    pub fn cohort_count(&self) -> usize {
        self.rate.len()
    }

    pub fn value(&self, var: Var) -> f64 {
        match var {
            Var::Storage { cohort, hour } => self.storage[cohort][hour],
            Var::Rate { cohort, hour } => self.rate[cohort][hour],
            Var::Price { hour } => self.price[hour],
        }
    }

    /// Aggregate rate across all cohorts at `hour`.
    pub fn total_rate(&self, hour: usize) -> f64 {
        self.rate.iter().map(|r| r[hour]).sum()
    }
}
