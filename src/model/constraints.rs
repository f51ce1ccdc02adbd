use serde::Serialize;

use super::state::DecisionState;

/// One decision variable of the schedule model.
///
/// Storage hours run over `[0, horizon]` (the extra slot is the
/// post-horizon terminal state); rate and price hours over `[0, horizon)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Var {
    Storage { cohort: usize, hour: usize },
    Rate { cohort: usize, hour: usize },
    Price { hour: usize },
}

/// `constant + Σ coefficient·variable`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinearExpr {
    pub terms: Vec<(Var, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn with_constant(constant: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant,
        }
    }

    pub fn plus(mut self, coefficient: f64, var: Var) -> Self {
        self.terms.push((var, coefficient));
        self
    }

    pub fn eval(&self, state: &DecisionState) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|&(var, coefficient)| coefficient * state.value(var))
                .sum::<f64>()
    }
}

/// One row of the constraint system, as inspectable data. The model is a
/// pure function into a list of these; no solver is needed to evaluate them.
#[derive(Debug, Clone, Serialize)]
pub enum Constraint {
    /// `expr == 0`
    Equality(LinearExpr),
    /// `lo <= var <= hi`
    Bounds { var: Var, lo: f64, hi: f64 },
}

impl Constraint {
    /// How far `state` is from satisfying this row (0 when satisfied).
    pub fn violation(&self, state: &DecisionState) -> f64 {
        match self {
            Constraint::Equality(expr) => expr.eval(state).abs(),
            Constraint::Bounds { var, lo, hi } => {
                let value = state.value(*var);
                (lo - value).max(value - hi).max(0.0)
            }
        }
    }
}
