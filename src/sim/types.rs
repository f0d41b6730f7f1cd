//! Core simulation types: scenario switches, hourly records, traces and sizing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hours in a simulated year (no leap days).
pub const HOURS_PER_YEAR: usize = 8760;

/// Which source meets load first each hour. Storage always comes last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePriority {
    /// Renewables, then grid, then storage.
    #[default]
    SelfGeneration,
    /// Grid, then renewables, then storage.
    Grid,
}

/// Losses between generation and the consumer, composed multiplicatively.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkEfficiency {
    /// Distribution network transmission efficiency (0.0–1.0].
    pub transmission: f64,
    /// Power conversion efficiency between supply bus and network (0.0–1.0].
    pub conversion: f64,
}

impl Default for NetworkEfficiency {
    fn default() -> Self {
        Self {
            transmission: 0.95,
            conversion: 0.95,
        }
    }
}

impl NetworkEfficiency {
    /// Combined efficiency of the whole chain.
    pub fn combined(&self) -> f64 {
        self.transmission * self.conversion
    }

    /// Energy the supply side must provide to serve `demand_kwh` at the consumer.
    pub fn supply_required_kwh(&self, demand_kwh: f64) -> f64 {
        demand_kwh / self.combined()
    }
}

/// Which demand categories contribute to the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadCategories {
    pub domestic: bool,
    pub commercial: bool,
    pub public: bool,
}

impl Default for LoadCategories {
    fn default() -> Self {
        Self {
            domestic: true,
            commercial: true,
            public: true,
        }
    }
}

/// Technology switches and dispatch policy for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Whether a PV array is present.
    pub pv: bool,
    /// Whether battery storage is present.
    pub battery: bool,
    /// Whether a diesel backup generator is present.
    pub diesel: bool,
    /// Whether a grid connection is present.
    pub grid: bool,
    /// Maximum acceptable blackout fraction before diesel backup steps in.
    pub backup_threshold: f64,
    /// Source ordering applied every hour.
    pub priority: SourcePriority,
    /// Distribution network losses.
    pub efficiency: NetworkEfficiency,
    /// Demand categories included in the load.
    pub loads: LoadCategories,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            pv: true,
            battery: true,
            diesel: true,
            grid: false,
            backup_threshold: 0.1,
            priority: SourcePriority::SelfGeneration,
            efficiency: NetworkEfficiency::default(),
            loads: LoadCategories::default(),
        }
    }
}

impl ScenarioConfig {
    /// Validates every field, prefixing field paths with `section`.
    pub fn validate(&self, section: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.backup_threshold) {
            errors.push(ConfigError::new(
                format!("{section}.backup_threshold"),
                "must be in [0.0, 1.0]",
            ));
        }
        for (name, value) in [
            ("transmission", self.efficiency.transmission),
            ("conversion", self.efficiency.conversion),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                errors.push(ConfigError::new(
                    format!("{section}.efficiency.{name}"),
                    "must be in (0.0, 1.0]",
                ));
            }
        }
        errors
    }
}

/// Energy flows for one simulated hour. All energies are in kWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyRecord {
    /// Hour index from the start of the investigation.
    pub hour: usize,
    /// Year index from the start of the investigation.
    pub year: u32,
    /// Consumer-side demand before network losses.
    pub demand_kwh: f64,
    /// Supply-side load including network losses.
    pub load_kwh: f64,
    /// Renewable energy generated this hour.
    pub renewables_generated_kwh: f64,
    /// Renewable energy used directly by the load.
    pub renewables_used_kwh: f64,
    /// Energy delivered by the battery.
    pub storage_kwh: f64,
    /// Energy taken by the battery from renewable surplus.
    pub battery_charge_kwh: f64,
    /// Energy imported from the grid.
    pub grid_kwh: f64,
    /// Energy delivered by the diesel generator.
    pub diesel_kwh: f64,
    /// Load that no source could serve.
    pub unmet_kwh: f64,
    /// `unmet_kwh > 0`.
    pub blackout: bool,
    /// Surplus that neither the load nor the battery could take.
    pub dumped_kwh: f64,
    /// Energy lost from storage to leakage and capacity fade.
    pub leaked_kwh: f64,
    /// Energy held in the battery at the end of the hour.
    pub stored_kwh: f64,
    /// Battery health at the end of the hour (1.0 = as new).
    pub battery_health: f64,
    /// Whether the diesel generator ran this hour.
    pub diesel_on: bool,
    /// Diesel fuel burned (litres).
    pub fuel_litres: f64,
}

impl HourlyRecord {
    /// Energy supplied to the load by all sources.
    pub fn total_energy_used_kwh(&self) -> f64 {
        self.renewables_used_kwh + self.storage_kwh + self.grid_kwh + self.diesel_kwh
    }
}

impl fmt::Display for HourlyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "h={:>6} y={:>2} | load={:>6.2}  pv={:>6.2}  bat={:>6.2}  grid={:>6.2}  \
             diesel={:>6.2}  unmet={:>6.2}  dump={:>6.2} | stored={:>6.2} kWh (health={:.3})",
            self.hour,
            self.year,
            self.load_kwh,
            self.renewables_used_kwh,
            self.storage_kwh,
            self.grid_kwh,
            self.diesel_kwh,
            self.unmet_kwh,
            self.dumped_kwh,
            self.stored_kwh,
            self.battery_health,
        )
    }
}

/// Ordered hourly records of one simulation window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SimulationTrace {
    records: Vec<HourlyRecord>,
}

impl SimulationTrace {
    pub fn new(records: Vec<HourlyRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[HourlyRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<HourlyRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HourlyRecord> {
        self.records.iter()
    }

    /// Number of hours with unmet load.
    pub fn blackout_hours(&self) -> usize {
        self.records.iter().filter(|r| r.blackout).count()
    }

    /// Fraction of hours with unmet load (0.0 for an empty trace).
    pub fn blackout_fraction(&self) -> f64 {
        if self.records.is_empty() {
            0.0
        } else {
            self.blackout_hours() as f64 / self.records.len() as f64
        }
    }
}

impl<'a> IntoIterator for &'a SimulationTrace {
    type Item = &'a HourlyRecord;
    type IntoIter = std::slice::Iter<'a, HourlyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Installed capacities of a system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSizing {
    /// PV capacity (kWp).
    pub pv_kwp: f64,
    /// Battery capacity (kWh).
    pub storage_kwh: f64,
    /// Diesel capacity (kW), derived from backup needs.
    pub diesel_kw: f64,
}

impl SystemSizing {
    pub fn new(pv_kwp: f64, storage_kwh: f64) -> Self {
        Self {
            pv_kwp,
            storage_kwh,
            diesel_kw: 0.0,
        }
    }

    /// PV plus storage, used to rank otherwise equal systems.
    pub fn total_capacity(&self) -> f64 {
        self.pv_kwp + self.storage_kwh
    }

    /// Validates capacities, prefixing field paths with `section`.
    pub fn validate(&self, section: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("pv_kwp", self.pv_kwp),
            ("storage_kwh", self.storage_kwh),
            ("diesel_kw", self.diesel_kw),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(ConfigError::new(format!("{section}.{name}"), "must be >= 0"));
            }
        }
        errors
    }
}

impl fmt::Display for SystemSizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PV {:.2} kWp, storage {:.2} kWh, diesel {:.2} kW",
            self.pv_kwp, self.storage_kwh, self.diesel_kw
        )
    }
}
