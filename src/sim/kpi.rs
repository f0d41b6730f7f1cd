//! Post-hoc summary statistics of a simulation trace.

use std::fmt;

use serde::Serialize;

use super::types::SimulationTrace;

/// Aggregate indicators derived from a complete trace.
///
/// Computed post-hoc from the records so reported figures always agree with
/// the hourly data. These are the numbers the optimiser's criteria read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TraceSummary {
    /// Number of simulated hours.
    pub hours: usize,
    /// Hours with unmet load.
    pub blackout_hours: usize,
    /// `blackout_hours / hours`.
    pub blackout_fraction: f64,
    /// Supply-side load (kWh).
    pub load_kwh: f64,
    /// Renewable energy generated (kWh).
    pub renewables_generated_kwh: f64,
    /// Renewable energy used directly (kWh).
    pub renewables_used_kwh: f64,
    /// Energy delivered by storage (kWh).
    pub storage_kwh: f64,
    /// Energy imported from the grid (kWh).
    pub grid_kwh: f64,
    /// Energy delivered by diesel (kWh).
    pub diesel_kwh: f64,
    /// Load left unserved (kWh).
    pub unmet_kwh: f64,
    /// Energy dumped by the battery clamp and diesel minimum load (kWh).
    pub dumped_kwh: f64,
    /// Energy lost in storage (kWh).
    pub leaked_kwh: f64,
    /// `unmet / load`.
    pub unmet_energy_fraction: f64,
    /// `(renewables used + storage) / energy used`.
    pub renewables_fraction: f64,
    /// `diesel / energy used`.
    pub diesel_energy_fraction: f64,
    /// `dumped / (energy used + dumped)`.
    pub dumped_energy_fraction: f64,
    /// Hours with the diesel generator running.
    pub diesel_hours: usize,
    /// Diesel fuel burned (litres).
    pub diesel_fuel_litres: f64,
    /// Energy moved into and out of the battery (kWh).
    pub battery_throughput_kwh: f64,
    /// `throughput / (2 × capacity)`.
    pub battery_equivalent_full_cycles: f64,
    /// Battery health after the final hour.
    pub final_battery_health: f64,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl TraceSummary {
    /// Summarises `trace` for a battery of nominal `battery_capacity_kwh`.
    pub fn from_trace(trace: &SimulationTrace, battery_capacity_kwh: f64) -> Self {
        let mut s = Self {
            hours: trace.len(),
            final_battery_health: 1.0,
            ..Self::default()
        };

        for r in trace {
            s.load_kwh += r.load_kwh;
            s.renewables_generated_kwh += r.renewables_generated_kwh;
            s.renewables_used_kwh += r.renewables_used_kwh;
            s.storage_kwh += r.storage_kwh;
            s.grid_kwh += r.grid_kwh;
            s.diesel_kwh += r.diesel_kwh;
            s.unmet_kwh += r.unmet_kwh;
            s.dumped_kwh += r.dumped_kwh;
            s.leaked_kwh += r.leaked_kwh;
            s.diesel_fuel_litres += r.fuel_litres;
            s.battery_throughput_kwh += r.battery_charge_kwh + r.storage_kwh;
            if r.blackout {
                s.blackout_hours += 1;
            }
            if r.diesel_on {
                s.diesel_hours += 1;
            }
            s.final_battery_health = r.battery_health;
        }

        let used = s.renewables_used_kwh + s.storage_kwh + s.grid_kwh + s.diesel_kwh;
        s.blackout_fraction = ratio(s.blackout_hours as f64, s.hours as f64);
        s.unmet_energy_fraction = ratio(s.unmet_kwh, s.load_kwh);
        s.renewables_fraction = ratio(s.renewables_used_kwh + s.storage_kwh, used);
        s.diesel_energy_fraction = ratio(s.diesel_kwh, used);
        s.dumped_energy_fraction = ratio(s.dumped_kwh, used + s.dumped_kwh);
        s.battery_equivalent_full_cycles =
            ratio(s.battery_throughput_kwh, 2.0 * battery_capacity_kwh);
        s
    }

    /// Energy supplied to the load by all sources (kWh).
    pub fn energy_used_kwh(&self) -> f64 {
        self.renewables_used_kwh + self.storage_kwh + self.grid_kwh + self.diesel_kwh
    }
}

impl fmt::Display for TraceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Hours simulated:       {}", self.hours)?;
        writeln!(
            f,
            "Blackout hours:        {} ({:.4})",
            self.blackout_hours, self.blackout_fraction
        )?;
        writeln!(f, "Load:                  {:.2} kWh", self.load_kwh)?;
        writeln!(
            f,
            "Renewables used:       {:.2} kWh (generated {:.2} kWh)",
            self.renewables_used_kwh, self.renewables_generated_kwh
        )?;
        writeln!(f, "Storage delivered:     {:.2} kWh", self.storage_kwh)?;
        writeln!(f, "Grid imported:         {:.2} kWh", self.grid_kwh)?;
        writeln!(
            f,
            "Diesel delivered:      {:.2} kWh over {} h ({:.2} l fuel)",
            self.diesel_kwh, self.diesel_hours, self.diesel_fuel_litres
        )?;
        writeln!(
            f,
            "Unmet energy:          {:.2} kWh ({:.4})",
            self.unmet_kwh, self.unmet_energy_fraction
        )?;
        writeln!(f, "Renewables fraction:   {:.4}", self.renewables_fraction)?;
        writeln!(f, "Diesel fraction:       {:.4}", self.diesel_energy_fraction)?;
        writeln!(
            f,
            "Dumped energy:         {:.2} kWh ({:.4})",
            self.dumped_kwh, self.dumped_energy_fraction
        )?;
        writeln!(
            f,
            "Battery throughput:    {:.2} kWh ({:.2} equiv. cycles)",
            self.battery_throughput_kwh, self.battery_equivalent_full_cycles
        )?;
        write!(f, "Battery health:        {:.4}", self.final_battery_health)
    }
}
