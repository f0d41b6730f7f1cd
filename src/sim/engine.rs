//! Single-horizon simulator: drives the hourly dispatch across a year window.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::devices::{BatterySpec, BatteryState, DieselSpec, PvSpec};
use crate::error::{ConfigError, Error};
use crate::profiles::SourceProfiles;

use super::backup::{BackupOutcome, BackupSelection, apply_backup};
use super::clock::Clock;
use super::dispatch::{HourInput, STEP_HOURS, dispatch_hour};
use super::kpi::TraceSummary;
use super::types::{HourlyRecord, ScenarioConfig, SimulationTrace, SystemSizing};

/// Component parameters shared by every run of a [`Simulator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Technologies {
    pub pv: PvSpec,
    pub battery: BatterySpec,
    pub diesel: DieselSpec,
    pub backup_selection: BackupSelection,
}

impl Technologies {
    /// Validates every component.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = self.pv.validate("pv");
        errors.extend(self.battery.validate("battery"));
        errors.extend(self.diesel.validate("diesel"));
        errors
    }
}

/// Everything one simulation run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    /// First simulated year (inclusive).
    pub start_year: u32,
    /// Last simulated year (exclusive).
    pub end_year: u32,
    /// Hourly records after diesel backup.
    pub trace: SimulationTrace,
    /// Capacities at the start of the window.
    pub initial_sizing: SystemSizing,
    /// Degraded capacities at the end of the window, with the derived diesel size.
    pub final_sizing: SystemSizing,
    /// Battery after the final hour.
    pub final_battery: BatteryState,
    /// What the diesel backup pass did.
    pub backup: BackupOutcome,
    /// Summary statistics of `trace`.
    pub summary: TraceSummary,
}

/// Runs the hourly recurrence over read-only source profiles.
///
/// A simulator holds no mutable state, so one instance can serve many
/// concurrent runs.
#[derive(Debug, Clone)]
pub struct Simulator<'a> {
    profiles: &'a SourceProfiles,
    scenario: ScenarioConfig,
    tech: Technologies,
}

impl<'a> Simulator<'a> {
    /// Creates a simulator after validating the scenario and components.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing every invalid field.
    pub fn new(
        profiles: &'a SourceProfiles,
        scenario: ScenarioConfig,
        tech: Technologies,
    ) -> Result<Self, Error> {
        let mut errors = scenario.validate("scenario");
        errors.extend(tech.validate());
        Error::check(errors)?;
        Ok(Self {
            profiles,
            scenario,
            tech,
        })
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    pub fn technologies(&self) -> &Technologies {
        &self.tech
    }

    pub fn profiles(&self) -> &SourceProfiles {
        self.profiles
    }

    /// Simulates `[start_year, end_year)` with the given installed capacities.
    ///
    /// `initial_stored_kwh` carries stored energy from a previous window; `None`
    /// commissions a full battery.
    ///
    /// # Errors
    ///
    /// Fails on an empty window, negative capacities, or a profile that ends
    /// before the window does.
    pub fn run(
        &self,
        sizing: &SystemSizing,
        start_year: u32,
        end_year: u32,
        initial_stored_kwh: Option<f64>,
    ) -> Result<SimulationOutcome, Error> {
        if start_year >= end_year {
            return Err(Error::InvalidHorizon {
                start_year,
                end_year,
            });
        }
        Error::check(sizing.validate("system"))?;
        let clock = Clock::new(start_year, end_year);
        self.profiles.ensure_covers(clock.end_hour())?;

        let spec = &self.tech.battery;
        let storage_kwh = if self.scenario.battery {
            sizing.storage_kwh
        } else {
            0.0
        };
        let battery = match initial_stored_kwh {
            Some(stored) => BatteryState::carried(spec, storage_kwh, stored),
            None => BatteryState::fresh(spec, storage_kwh),
        };

        debug!(
            start_year,
            end_year,
            pv_kwp = sizing.pv_kwp,
            storage_kwh,
            hours = clock.len(),
            "simulation started"
        );

        let hours = clock.len();
        let (records, final_battery) = clock.fold(
            (Vec::with_capacity(hours), battery),
            |(mut records, battery): (Vec<HourlyRecord>, BatteryState), slot| {
                let pv_kwp = self
                    .tech
                    .pv
                    .degraded_capacity_kwp(sizing.pv_kwp, slot.years_elapsed);
                let demand_kwh =
                    self.profiles.load.total_kw(slot.hour, &self.scenario.loads) * STEP_HOURS;
                let input = HourInput {
                    hour: slot.hour,
                    year: slot.year,
                    demand_kwh,
                    load_kwh: self.scenario.efficiency.supply_required_kwh(demand_kwh),
                    renewables_kwh: self
                        .tech
                        .pv
                        .generation_kwh(self.profiles.solar[slot.hour], pv_kwp),
                    grid_available: self.profiles.grid[slot.hour],
                };
                let (record, next) = dispatch_hour(&input, &battery, spec, &self.scenario);
                records.push(record);
                (records, next)
            },
        );

        let diesel_free = SimulationTrace::new(records);
        let (trace, backup) = if self.scenario.diesel {
            apply_backup(
                diesel_free,
                self.scenario.backup_threshold,
                &self.tech.diesel,
                self.tech.backup_selection,
            )
        } else {
            let fraction = diesel_free.blackout_fraction();
            let outcome = BackupOutcome {
                blackout_fraction_before: fraction,
                blackout_fraction_after: fraction,
                ..BackupOutcome::default()
            };
            (diesel_free, outcome)
        };

        let final_sizing = SystemSizing {
            pv_kwp: self
                .tech
                .pv
                .degraded_capacity_kwp(sizing.pv_kwp, end_year - start_year),
            storage_kwh: final_battery.usable_capacity_kwh(spec),
            diesel_kw: backup.capacity_kw,
        };
        let summary = TraceSummary::from_trace(&trace, storage_kwh);

        debug!(
            start_year,
            end_year,
            blackout_fraction = summary.blackout_fraction,
            diesel_kw = backup.capacity_kw,
            final_health = summary.final_battery_health,
            "simulation finished"
        );

        Ok(SimulationOutcome {
            start_year,
            end_year,
            trace,
            initial_sizing: SystemSizing {
                storage_kwh,
                ..*sizing
            },
            final_sizing,
            final_battery,
            backup,
            summary,
        })
    }
}
