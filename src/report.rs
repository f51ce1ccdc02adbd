use chrono::{DateTime, Utc};
use itertools::izip;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::model::{DecisionState, ScheduleModel};

/// Solver noise below this magnitude is reported as exactly zero.
const ZERO_SNAP: f64 = 1e-16;

/// Reporting-ready view of one solved schedule. Plain structured data;
/// rendering (tables, colors) belongs to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub horizon: usize,
    /// Base (EV-independent) price per hour.
    pub base_price: Vec<f64>,
    /// Realized clearing price per hour.
    pub price: Vec<f64>,
    pub total_cost: f64,
    pub cohorts: Vec<CohortSeries>,
}

/// Per-cohort time series and summary figures.
#[derive(Debug, Clone, Serialize)]
pub struct CohortSeries {
    pub cohort: usize,
    /// Energy held at each hour boundary; `horizon + 1` entries.
    pub storage_kwh: Vec<f64>,
    pub rate_kw: Vec<f64>,
    /// `Σ_t price[t]·rate[t]` at realized prices.
    pub cost: f64,
    pub net_energy_kwh: f64,
    /// `cost / net_energy_kwh`; absent when the cohort delivered zero net
    /// energy (see [`CohortSeries::average_price_per_kwh`]).
    pub average_price: Option<f64>,
}

impl CohortSeries {
    /// Average price paid per unit of net energy delivered.
    pub fn average_price_per_kwh(&self) -> Result<f64, ScheduleError> {
        self.average_price
            .ok_or(ScheduleError::DivisionUndefined { cohort: self.cohort })
    }
}

/// Reshapes the solved assignment into per-cohort series. Pure
/// post-processing; a cohort with zero net energy only loses its average
/// price, never the rest of the result.
pub fn extract(model: &ScheduleModel, state: &DecisionState) -> ScheduleReport {
    let cohorts = izip!(0.., &state.storage, &state.rate)
        .map(|(cohort, storage, rate)| {
            let cost = snap(model.cohort_cost(state, cohort));
            let net_energy_kwh = snap(rate.iter().sum());
            CohortSeries {
                cohort,
                storage_kwh: storage.iter().copied().map(snap).collect(),
                rate_kw: rate.iter().copied().map(snap).collect(),
                cost,
                net_energy_kwh,
                average_price: (net_energy_kwh != 0.0).then(|| cost / net_energy_kwh),
            }
        })
        .collect();

    ScheduleReport {
        id: Uuid::new_v4(),
        generated_at: Utc::now(),
        horizon: model.horizon(),
        base_price: model.base_price().to_vec(),
        price: state.price.iter().copied().map(snap).collect(),
        total_cost: snap(model.total_cost(state)),
        cohorts,
    }
}

fn snap(value: f64) -> f64 {
    if value.abs() < ZERO_SNAP {
        0.0
    } else {
        value
    }
}
