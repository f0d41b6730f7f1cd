use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Photovoltaic array parameters.
///
/// Output in a given hour is `yield × installed capacity × degradation factor`,
/// where the factor compounds once per elapsed year of the array's life.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvSpec {
    /// Fractional capacity lost per year (e.g., 0.01 = 1 %/yr).
    pub degradation_rate: f64,
}

impl Default for PvSpec {
    fn default() -> Self {
        Self {
            degradation_rate: 0.01,
        }
    }
}

impl PvSpec {
    /// Validates every field, prefixing field paths with `section`.
    pub fn validate(&self, section: &str) -> Vec<ConfigError> {
        if (0.0..1.0).contains(&self.degradation_rate) {
            Vec::new()
        } else {
            vec![ConfigError::new(
                format!("{section}.degradation_rate"),
                "must be in [0.0, 1.0)",
            )]
        }
    }

    /// Capacity remaining after `years_elapsed` full years.
    pub fn degraded_capacity_kwp(&self, initial_kwp: f64, years_elapsed: u32) -> f64 {
        initial_kwp * (1.0 - self.degradation_rate).powi(years_elapsed as i32)
    }

    /// Energy generated in one hour from a per-kWp `yield_kw`.
    pub fn generation_kwh(&self, yield_kw: f64, capacity_kwp: f64) -> f64 {
        (yield_kw * capacity_kwp).max(0.0)
    }
}
