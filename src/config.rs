use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Full description of one scheduling study: the horizon, the base price
/// shape, the solve strategy, and the EV cohorts to schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    pub horizon: usize,
    pub price: PriceConfig,
    pub solve: SolveConfig,
    pub cohorts: Vec<CohortConfig>,
}

/// One EV population sharing identical charging behavior.
///
/// `availability` hours are kept signed so an out-of-range entry survives
/// deserialization and reaches the validator instead of wrapping silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortConfig {
    /// Energy held at the start of the horizon [kWh].
    pub initial_storage_kwh: f64,
    /// Storage capacity; must be reached one hour after the last
    /// available hour [kWh].
    pub max_storage_kwh: f64,
    /// Symmetric charge/discharge bound [kW].
    pub max_rate_kw: f64,
    /// Hours during which the rate may be nonzero.
    pub availability: BTreeSet<i64>,
    /// Price increment per unit of this cohort's rate [$/kWh^2]. Zero makes
    /// the clearing price independent of this cohort's demand.
    pub price_influence: f64,
}

impl CohortConfig {
    /// Last hour the cohort may charge; `None` for an empty window.
    pub fn last_available_hour(&self) -> Option<i64> {
        self.availability.iter().next_back().copied()
    }

    /// Energy the window must deliver to satisfy the terminal condition [kWh].
    pub fn required_energy_kwh(&self) -> f64 {
        self.max_storage_kwh - self.initial_storage_kwh
    }
}

/// Shape of the EV-independent base price curve: a Gaussian bump of height
/// `scale` centered on `peak_hour`, on top of a constant `floor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    pub scale: f64,
    pub peak_hour: f64,
    pub spread: f64,
    pub floor: f64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        // Evening peak at 6pm, wide shoulder, never below the floor.
        Self {
            scale: 5.0,
            peak_hour: 17.0,
            spread: 26.0,
            floor: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveConfig {
    /// Number of independent multistart attempts.
    pub restarts: usize,
    /// RNG seed for the per-restart starting points.
    pub seed: u64,
    /// Wall-clock budget per restart, in milliseconds. A restart that runs
    /// over is skipped, not fatal.
    pub per_restart_timeout_ms: Option<u64>,
    /// Demote the per-restart unbounded warning to debug level.
    pub suppress_unbounded_warning: bool,
    /// Acceptance tolerance on constraint violation.
    pub tolerance: f64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            restarts: 10,
            seed: 0,
            per_restart_timeout_ms: Some(5_000),
            suppress_unbounded_warning: true,
            tolerance: 1e-6,
        }
    }
}

impl SolveConfig {
    pub fn per_restart_timeout(&self) -> Option<Duration> {
        self.per_restart_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for StudyConfig {
    /// The reference three-cohort study: a commuter fleet gone by 7am, a
    /// morning-window fleet, and a large depot fleet online from 4am.
    fn default() -> Self {
        Self {
            horizon: 24,
            price: PriceConfig::default(),
            solve: SolveConfig::default(),
            cohorts: vec![
                CohortConfig {
                    initial_storage_kwh: 0.0,
                    max_storage_kwh: 5.0,
                    max_rate_kw: 1.0,
                    availability: (0..7).collect(),
                    price_influence: 0.5,
                },
                CohortConfig {
                    initial_storage_kwh: 2.0,
                    max_storage_kwh: 10.0,
                    max_rate_kw: 2.0,
                    availability: (5..10).collect(),
                    price_influence: 0.5,
                },
                CohortConfig {
                    initial_storage_kwh: 5.0,
                    max_storage_kwh: 20.0,
                    max_rate_kw: 3.0,
                    availability: (4..24).collect(),
                    price_influence: 0.5,
                },
            ],
        }
    }
}

impl StudyConfig {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("config/study.toml"))
            .merge(Env::prefixed("EVSCHED__").split("__"));
        Ok(figment.extract()?)
    }
}
