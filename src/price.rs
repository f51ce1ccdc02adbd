use crate::config::PriceConfig;

/// Base clearing price for each hour of the horizon, absent any EV demand
/// [$ per kWh]. Single Gaussian bump over a constant floor; nonnegative as
/// long as the config fields are.
pub fn base_prices(horizon: usize, config: &PriceConfig) -> Vec<f64> {
    (0..horizon)
        .map(|t| config.scale * gaussian(t as f64, config.peak_hour, config.spread) + config.floor)
        .collect()
}

fn gaussian(x: f64, mu: f64, sigma: f64) -> f64 {
    (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}
