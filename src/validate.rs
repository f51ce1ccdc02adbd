use crate::config::CohortConfig;
use crate::error::ScheduleError;

/// Rejects cohort configurations the model cannot encode. Runs before model
/// construction; no side effects beyond the pass/fail signal.
///
/// A cohort fails when any availability hour lies outside `[0, horizon)`,
/// when its window is empty (the terminal boundary condition needs a last
/// available hour), or when a numeric field is negative, non-finite, or a
/// zero capacity/rate.
pub fn validate_cohorts(horizon: usize, cohorts: &[CohortConfig]) -> Result<(), ScheduleError> {
    for (i, cohort) in cohorts.iter().enumerate() {
        for &hour in &cohort.availability {
            if hour < 0 || hour >= horizon as i64 {
                return Err(ScheduleError::InvalidConfiguration {
                    cohort: i,
                    hour,
                    horizon,
                });
            }
        }
        if cohort.availability.is_empty() {
            return Err(bad(i, "availability window is empty"));
        }
        for (name, value) in [
            ("initial_storage_kwh", cohort.initial_storage_kwh),
            ("max_storage_kwh", cohort.max_storage_kwh),
            ("max_rate_kw", cohort.max_rate_kw),
            ("price_influence", cohort.price_influence),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(bad(i, format!("{name} must be finite and non-negative")));
            }
        }
        if cohort.max_storage_kwh == 0.0 {
            return Err(bad(i, "max_storage_kwh must be positive"));
        }
        if cohort.max_rate_kw == 0.0 {
            return Err(bad(i, "max_rate_kw must be positive"));
        }
        if cohort.initial_storage_kwh > cohort.max_storage_kwh {
            return Err(bad(i, "initial_storage_kwh exceeds max_storage_kwh"));
        }
    }
    Ok(())
}

fn bad(cohort: usize, reason: impl Into<String>) -> ScheduleError {
    ScheduleError::BadCohort {
        cohort,
        reason: reason.into(),
    }
}
