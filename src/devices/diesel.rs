use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Diesel generator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DieselSpec {
    /// Fuel burned per kWh generated (litres/kWh).
    pub fuel_consumption: f64,
    /// Lowest allowed output as a fraction of rated capacity (0.0–1.0).
    pub minimum_load: f64,
}

impl Default for DieselSpec {
    fn default() -> Self {
        Self {
            fuel_consumption: 0.4,
            minimum_load: 0.35,
        }
    }
}

/// What a generator of a given size does to cover one hour's deficit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DieselOutput {
    /// Energy delivered to the load (kWh).
    pub delivered_kwh: f64,
    /// Energy generated, including any forced minimum-load excess (kWh).
    pub generated_kwh: f64,
    /// Generated energy with nowhere to go (kWh).
    pub dumped_kwh: f64,
    /// Fuel burned (litres).
    pub fuel_litres: f64,
}

impl DieselSpec {
    /// Validates every field, prefixing field paths with `section`.
    pub fn validate(&self, section: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.fuel_consumption.is_nan() || self.fuel_consumption < 0.0 {
            errors.push(ConfigError::new(
                format!("{section}.fuel_consumption"),
                "must be >= 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.minimum_load) {
            errors.push(ConfigError::new(
                format!("{section}.minimum_load"),
                "must be in [0.0, 1.0]",
            ));
        }
        errors
    }

    /// Runs a generator of `capacity_kw` for one hour against `deficit_kwh`.
    ///
    /// Output below the minimum load is raised to it and the difference dumped.
    pub fn serve(&self, deficit_kwh: f64, capacity_kw: f64) -> DieselOutput {
        let delivered = deficit_kwh.clamp(0.0, capacity_kw.max(0.0));
        let generated = if delivered > 0.0 {
            delivered.max(self.minimum_load * capacity_kw)
        } else {
            0.0
        };
        DieselOutput {
            delivered_kwh: delivered,
            generated_kwh: generated,
            dumped_kwh: generated - delivered,
            fuel_litres: generated * self.fuel_consumption,
        }
    }
}
