use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Energies below this magnitude (kWh) are treated as zero.
pub const ENERGY_EPSILON: f64 = 1e-9;

/// Immutable electrochemical parameters of a battery bank.
///
/// Charge fractions are relative to the usable (health-scaled) capacity; C-rates
/// are fractions of that capacity transferable per hour.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatterySpec {
    /// Upper state-of-charge bound (0.0–1.0).
    pub max_charge: f64,
    /// Lower state-of-charge bound (0.0–1.0), strictly below `max_charge`.
    pub min_charge: f64,
    /// Fraction of stored energy lost per hour.
    pub leakage: f64,
    /// Fraction of charging energy that ends up stored.
    pub conversion_in: f64,
    /// Fraction of drawn energy that is delivered when discharging.
    pub conversion_out: f64,
    /// Maximum charge per hour as a fraction of capacity.
    pub c_rate_charging: f64,
    /// Maximum discharge per hour as a fraction of capacity.
    pub c_rate_discharging: f64,
    /// Rated number of full depth-of-discharge cycles.
    pub cycle_lifetime: f64,
    /// Fraction of capacity lost once `cycle_lifetime` cycles have been run.
    pub lifetime_loss: f64,
}

impl Default for BatterySpec {
    fn default() -> Self {
        Self {
            max_charge: 0.9,
            min_charge: 0.4,
            leakage: 0.004,
            conversion_in: 0.95,
            conversion_out: 0.95,
            c_rate_charging: 0.33,
            c_rate_discharging: 0.33,
            cycle_lifetime: 1500.0,
            lifetime_loss: 0.2,
        }
    }
}

impl BatterySpec {
    /// Depth of discharge: `max_charge - min_charge`.
    pub fn depth_of_discharge(&self) -> f64 {
        self.max_charge - self.min_charge
    }

    /// Energy that can pass through a bank of `capacity_kwh` over its rated life.
    pub fn lifetime_throughput_kwh(&self, capacity_kwh: f64) -> f64 {
        self.cycle_lifetime * capacity_kwh * self.depth_of_discharge()
    }

    /// Validates every field, prefixing field paths with `section`.
    pub fn validate(&self, section: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let field = |name: &str| format!("{section}.{name}");

        for (name, value) in [
            ("max_charge", self.max_charge),
            ("min_charge", self.min_charge),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigError::new(field(name), "must be in [0.0, 1.0]"));
            }
        }
        if self.min_charge >= self.max_charge {
            errors.push(ConfigError::new(
                field("min_charge"),
                format!("must be < {section}.max_charge"),
            ));
        }
        if !(0.0..1.0).contains(&self.leakage) {
            errors.push(ConfigError::new(field("leakage"), "must be in [0.0, 1.0)"));
        }
        for (name, value) in [
            ("conversion_in", self.conversion_in),
            ("conversion_out", self.conversion_out),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                errors.push(ConfigError::new(field(name), "must be in (0.0, 1.0]"));
            }
        }
        for (name, value) in [
            ("c_rate_charging", self.c_rate_charging),
            ("c_rate_discharging", self.c_rate_discharging),
        ] {
            if value.is_nan() || value < 0.0 {
                errors.push(ConfigError::new(field(name), "must be >= 0"));
            }
        }
        if self.cycle_lifetime.is_nan() || self.cycle_lifetime <= 0.0 {
            errors.push(ConfigError::new(field("cycle_lifetime"), "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.lifetime_loss) {
            errors.push(ConfigError::new(field("lifetime_loss"), "must be in [0.0, 1.0]"));
        }
        errors
    }
}

/// Mutable state of one battery bank, carried hour to hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryState {
    /// Nominal (as-installed) capacity in kWh.
    pub capacity_kwh: f64,
    /// Energy currently stored in kWh.
    pub stored_kwh: f64,
    /// Cumulative energy moved in or out of the bank in kWh.
    pub throughput_kwh: f64,
}

/// Outcome of one [`BatteryState::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStep {
    /// Energy accepted from the bus while charging (kWh, >= 0).
    pub charged_kwh: f64,
    /// Energy delivered to the bus while discharging (kWh, >= 0).
    pub delivered_kwh: f64,
    /// Part of a charge request the bank could not accept (kWh).
    pub dumped_kwh: f64,
    /// Part of a discharge request the bank could not supply (kWh).
    pub unmet_kwh: f64,
    /// Energy lost to self-discharge and capacity fade this step (kWh).
    pub leaked_kwh: f64,
    /// State after the step.
    pub state: BatteryState,
}

impl BatteryState {
    /// A newly commissioned bank, charged to its upper bound.
    pub fn fresh(spec: &BatterySpec, capacity_kwh: f64) -> Self {
        let capacity_kwh = capacity_kwh.max(0.0);
        Self {
            capacity_kwh,
            stored_kwh: capacity_kwh * spec.max_charge,
            throughput_kwh: 0.0,
        }
    }

    /// A new bank of `capacity_kwh` that inherits `stored_kwh` from a previous
    /// bank, clamped into the new state-of-charge window.
    pub fn carried(spec: &BatterySpec, capacity_kwh: f64, stored_kwh: f64) -> Self {
        let mut state = Self::fresh(spec, capacity_kwh);
        state.stored_kwh =
            stored_kwh.clamp(state.min_storage_kwh(spec), state.max_storage_kwh(spec));
        state
    }

    /// Fraction of nominal capacity still usable, derived from throughput.
    ///
    /// Non-increasing in throughput and never negative.
    pub fn health(&self, spec: &BatterySpec) -> f64 {
        let lifetime = spec.lifetime_throughput_kwh(self.capacity_kwh);
        if lifetime <= 0.0 {
            return 1.0;
        }
        (1.0 - spec.lifetime_loss * self.throughput_kwh / lifetime).max(0.0)
    }

    /// Nominal capacity scaled by health (kWh).
    pub fn usable_capacity_kwh(&self, spec: &BatterySpec) -> f64 {
        self.capacity_kwh * self.health(spec)
    }

    /// Upper bound on stored energy (kWh).
    pub fn max_storage_kwh(&self, spec: &BatterySpec) -> f64 {
        spec.max_charge * self.usable_capacity_kwh(spec)
    }

    /// Lower bound on stored energy (kWh).
    pub fn min_storage_kwh(&self, spec: &BatterySpec) -> f64 {
        spec.min_charge * self.usable_capacity_kwh(spec)
    }

    /// Applies a signed energy request over `hours`.
    ///
    /// Positive `request_kwh` charges the bank with energy offered from the bus,
    /// negative discharges it to deliver energy to the bus. The request is first
    /// limited by the C-rate, then by the state-of-charge window, with the
    /// conversion efficiency applied to the energy actually transferred. Leakage
    /// follows the transfer and acts only on the energy above the minimum-charge
    /// floor, so the undeliverable reserve never leaks.
    /// Whatever cannot be honoured comes back as `dumped_kwh` or `unmet_kwh`.
    pub fn step(&self, spec: &BatterySpec, request_kwh: f64, hours: f64) -> BatteryStep {
        let usable = self.usable_capacity_kwh(spec);
        let max_storage = spec.max_charge * usable;
        let min_storage = spec.min_charge * usable;
        let mut stored = self.stored_kwh.min(max_storage);

        let mut charged = 0.0;
        let mut delivered = 0.0;
        let mut dumped = 0.0;
        let mut unmet = 0.0;

        if request_kwh > 0.0 {
            let rate_limit = spec.c_rate_charging * usable * hours;
            let headroom = ((max_storage - stored) / spec.conversion_in).max(0.0);
            charged = request_kwh.min(rate_limit).min(headroom);
            stored += charged * spec.conversion_in;
            dumped = request_kwh - charged;
        } else if request_kwh < 0.0 {
            let wanted = -request_kwh;
            let rate_limit = spec.c_rate_discharging * usable * hours;
            let available = ((stored - min_storage) * spec.conversion_out).max(0.0);
            delivered = wanted.min(rate_limit).min(available);
            stored -= delivered / spec.conversion_out;
            unmet = wanted - delivered;
        }

        let leak_fraction = 1.0 - (1.0 - spec.leakage).powf(hours);
        let mut leaked = (stored - min_storage).max(0.0) * leak_fraction;
        stored -= leaked;

        let mut next = Self {
            capacity_kwh: self.capacity_kwh,
            stored_kwh: stored,
            throughput_kwh: self.throughput_kwh + charged + delivered,
        };

        // Fade shrinks the window; energy above the new ceiling is lost.
        let ceiling = next.max_storage_kwh(spec);
        if next.stored_kwh > ceiling {
            leaked += next.stored_kwh - ceiling;
            next.stored_kwh = ceiling;
        }

        BatteryStep {
            charged_kwh: charged,
            delivered_kwh: delivered,
            dumped_kwh: zero_if_negligible(dumped),
            unmet_kwh: zero_if_negligible(unmet),
            leaked_kwh: leaked,
            state: next,
        }
    }
}

/// Snaps values within [`ENERGY_EPSILON`] of zero to exactly zero.
pub fn zero_if_negligible(kwh: f64) -> f64 {
    if kwh.abs() < ENERGY_EPSILON { 0.0 } else { kwh }
}
