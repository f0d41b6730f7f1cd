//! Seeded synthetic source profiles.
//!
//! Every generator takes the random source from the caller, so a fixed seed
//! always yields the same profile and the simulator itself stays free of
//! randomness.

use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{LoadProfile, SourceProfiles};
use crate::error::ConfigError;
use crate::sim::types::HOURS_PER_YEAR;

const HOURS_PER_DAY: usize = 24;

/// Cloud multiplier bounds (heavy overcast, cloud-edge enhancement).
const CLOUD_MIN: f64 = 0.2;
const CLOUD_MAX: f64 = 1.2;

/// Solar yield shape: half-cosine daylight, seasonal swing and AR(1) cloud.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarShape {
    /// Peak yield on a clear midsummer day (kW/kWp).
    pub peak_yield: f64,
    /// First daylight hour (inclusive).
    pub sunrise_hour: usize,
    /// Last daylight hour (exclusive).
    pub sunset_hour: usize,
    /// Relative amplitude of the annual swing in peak yield (0 = none).
    pub seasonal_swing: f64,
    /// AR(1) persistence of the cloud multiplier.
    pub cloud_alpha: f64,
    /// Standard deviation of the cloud innovation.
    pub cloud_noise_std: f64,
}

impl Default for SolarShape {
    fn default() -> Self {
        Self {
            peak_yield: 0.85,
            sunrise_hour: 6,
            sunset_hour: 18,
            seasonal_swing: 0.15,
            cloud_alpha: 0.8,
            cloud_noise_std: 0.25,
        }
    }
}

/// Demand shape for one load category: a base, an evening peak and noise.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadShape {
    /// Demand outside the peak (kW).
    pub base_kw: f64,
    /// Extra demand at the centre of the peak (kW).
    pub peak_kw: f64,
    /// Hour of day at the centre of the peak.
    pub peak_hour: usize,
    /// Half-width of the peak (hours).
    pub peak_width: usize,
    /// Standard deviation of hourly noise (kW).
    pub noise_std: f64,
}

impl Default for LoadShape {
    fn default() -> Self {
        Self {
            base_kw: 0.0,
            peak_kw: 0.0,
            peak_hour: 19,
            peak_width: 3,
            noise_std: 0.0,
        }
    }
}

/// Parameters for a complete synthetic profile set.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticSpec {
    pub solar: SolarShape,
    /// Probability that the grid is available, one value per hour of the day.
    pub grid_availability: Vec<f64>,
    pub domestic: LoadShape,
    pub commercial: LoadShape,
    pub public: LoadShape,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            solar: SolarShape::default(),
            grid_availability: vec![0.9; HOURS_PER_DAY],
            domestic: LoadShape {
                base_kw: 4.0,
                peak_kw: 10.0,
                noise_std: 0.5,
                ..LoadShape::default()
            },
            commercial: LoadShape {
                base_kw: 1.0,
                peak_kw: 3.0,
                peak_hour: 13,
                peak_width: 4,
                noise_std: 0.2,
            },
            public: LoadShape {
                base_kw: 0.5,
                peak_kw: 1.0,
                peak_hour: 20,
                peak_width: 2,
                noise_std: 0.05,
            },
        }
    }
}

impl SyntheticSpec {
    /// Validates generator parameters, prefixing field paths with `section`.
    pub fn validate(&self, section: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.solar;
        if !(s.peak_yield >= 0.0) {
            errors.push(ConfigError::new(format!("{section}.solar.peak_yield"), "must be >= 0"));
        }
        if s.sunrise_hour >= s.sunset_hour || s.sunset_hour > HOURS_PER_DAY {
            errors.push(ConfigError::new(
                format!("{section}.solar.sunrise_hour"),
                "must be < solar.sunset_hour, and sunset_hour must be <= 24",
            ));
        }
        if !(0.0..1.0).contains(&s.seasonal_swing) {
            errors.push(ConfigError::new(
                format!("{section}.solar.seasonal_swing"),
                "must be in [0.0, 1.0)",
            ));
        }
        if !(0.0..=1.0).contains(&s.cloud_alpha) {
            errors.push(ConfigError::new(
                format!("{section}.solar.cloud_alpha"),
                "must be in [0.0, 1.0]",
            ));
        }
        if !(s.cloud_noise_std >= 0.0) {
            errors.push(ConfigError::new(
                format!("{section}.solar.cloud_noise_std"),
                "must be >= 0",
            ));
        }
        if self.grid_availability.len() != HOURS_PER_DAY {
            errors.push(ConfigError::new(
                format!("{section}.grid_availability"),
                "must have exactly 24 values",
            ));
        }
        if self
            .grid_availability
            .iter()
            .any(|p| !(0.0..=1.0).contains(p))
        {
            errors.push(ConfigError::new(
                format!("{section}.grid_availability"),
                "values must be in [0.0, 1.0]",
            ));
        }
        for (name, shape) in [
            ("domestic", &self.domestic),
            ("commercial", &self.commercial),
            ("public", &self.public),
        ] {
            if !(shape.base_kw >= 0.0 && shape.peak_kw >= 0.0 && shape.noise_std >= 0.0) {
                errors.push(ConfigError::new(
                    format!("{section}.{name}"),
                    "base_kw, peak_kw and noise_std must be >= 0",
                ));
            }
            if shape.peak_hour >= HOURS_PER_DAY {
                errors.push(ConfigError::new(
                    format!("{section}.{name}.peak_hour"),
                    "must be < 24",
                ));
            }
        }
        errors
    }

    /// Generates `years` whole years of aligned profiles.
    pub fn generate(&self, years: u32, rng: &mut impl Rng) -> SourceProfiles {
        let hours = years as usize * HOURS_PER_YEAR;
        let solar = solar_yield(&self.solar, hours, rng);
        let grid = grid_availability(&self.grid_availability, hours, rng);
        let load = LoadProfile {
            domestic: category_load(&self.domestic, hours, rng),
            commercial: category_load(&self.commercial, hours, rng),
            public: category_load(&self.public, hours, rng),
        };
        SourceProfiles::new(solar, grid, load)
    }
}

/// Standard-normal sample via Box-Muller, scaled by `std_dev`.
pub fn gaussian_noise(rng: &mut impl Rng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().max(1e-12);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}

/// Fraction of peak output at `hour_of_day` (0 at night, 1 at solar noon).
fn daylight_fraction(hour_of_day: usize, sunrise: usize, sunset: usize) -> f64 {
    if hour_of_day < sunrise || hour_of_day >= sunset {
        return 0.0;
    }
    let day_len = (sunset - sunrise) as f64;
    let pos = (hour_of_day - sunrise) as f64 + 0.5;
    (PI * pos / day_len).sin()
}

/// Hourly PV yield per kWp.
pub fn solar_yield(shape: &SolarShape, hours: usize, rng: &mut impl Rng) -> Vec<f64> {
    let mut cloud = 1.0;
    (0..hours)
        .map(|h| {
            let epsilon = gaussian_noise(rng, shape.cloud_noise_std);
            cloud = (shape.cloud_alpha * cloud + (1.0 - shape.cloud_alpha) * (1.0 + epsilon))
                .clamp(CLOUD_MIN, CLOUD_MAX);

            let day_of_year = (h % HOURS_PER_YEAR) / HOURS_PER_DAY;
            let season = 1.0 - shape.seasonal_swing * (2.0 * PI * day_of_year as f64 / 365.0).cos();
            let frac = daylight_fraction(h % HOURS_PER_DAY, shape.sunrise_hour, shape.sunset_hour);
            (shape.peak_yield * season * frac * cloud).max(0.0)
        })
        .collect()
}

/// Hourly grid availability drawn from a daily probability profile.
pub fn grid_availability(daily: &[f64], hours: usize, rng: &mut impl Rng) -> Vec<bool> {
    if daily.is_empty() {
        return vec![false; hours];
    }
    (0..hours)
        .map(|h| {
            let p = daily[h % daily.len()].clamp(0.0, 1.0);
            rng.random_bool(p)
        })
        .collect()
}

/// Hourly demand for one category (kW, never negative).
pub fn category_load(shape: &LoadShape, hours: usize, rng: &mut impl Rng) -> Vec<f64> {
    let width = shape.peak_width.max(1) as f64;
    (0..hours)
        .map(|h| {
            let hod = (h % HOURS_PER_DAY) as i64;
            let raw = (hod - shape.peak_hour as i64).rem_euclid(HOURS_PER_DAY as i64);
            let distance = raw.min(HOURS_PER_DAY as i64 - raw) as f64;
            let peak = if distance < width {
                shape.peak_kw * 0.5 * (1.0 + (PI * distance / width).cos())
            } else {
                0.0
            };
            (shape.base_kw + peak + gaussian_noise(rng, shape.noise_std)).max(0.0)
        })
        .collect()
}
