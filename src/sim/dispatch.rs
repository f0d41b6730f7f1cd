//! One hour of energy balance: source ordering, battery and shortfall.

use crate::devices::battery::{BatterySpec, BatteryState, zero_if_negligible};
use crate::sim::types::{HourlyRecord, ScenarioConfig, SourcePriority};

/// Length of one dispatch step in hours.
pub const STEP_HOURS: f64 = 1.0;

/// Everything the dispatcher needs to know about one hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourInput {
    /// Hour index from the start of the investigation.
    pub hour: usize,
    /// Year index from the start of the investigation.
    pub year: u32,
    /// Consumer-side demand (kWh).
    pub demand_kwh: f64,
    /// Supply-side load after network losses (kWh).
    pub load_kwh: f64,
    /// Renewable energy generated this hour (kWh).
    pub renewables_kwh: f64,
    /// Whether the grid can supply this hour.
    pub grid_available: bool,
}

/// Dispatches one hour and returns the diesel-free record plus the battery
/// state to carry into the next hour.
///
/// Sources are drawn in priority order (renewables then grid, or grid then
/// renewables), and the battery always comes last. A renewable surplus
/// charges the battery and whatever it cannot take is dumped. A deficit
/// discharges the battery and whatever it cannot cover is unmet. The battery
/// is stepped every hour, even when idle, so leakage and fade always apply.
pub fn dispatch_hour(
    input: &HourInput,
    battery: &BatteryState,
    spec: &BatterySpec,
    scenario: &ScenarioConfig,
) -> (HourlyRecord, BatteryState) {
    let load = input.load_kwh.max(0.0);
    let renewables = if scenario.pv {
        input.renewables_kwh.max(0.0)
    } else {
        0.0
    };
    // An available grid is treated as unconstrained.
    let grid_cap = if scenario.grid && input.grid_available {
        f64::INFINITY
    } else {
        0.0
    };

    let (renewables_used, grid) = match scenario.priority {
        SourcePriority::SelfGeneration => {
            let r = load.min(renewables);
            (r, (load - r).min(grid_cap))
        }
        SourcePriority::Grid => {
            let g = load.min(grid_cap);
            ((load - g).min(renewables), g)
        }
    };

    let surplus = zero_if_negligible(renewables - renewables_used);
    let deficit = zero_if_negligible(load - renewables_used - grid);

    let request = if !scenario.battery {
        0.0
    } else if surplus > 0.0 {
        surplus
    } else {
        -deficit
    };
    let step = battery.step(spec, request, STEP_HOURS);

    let (charged, dumped, delivered, unmet) = if scenario.battery {
        let dumped = if surplus > 0.0 { step.dumped_kwh } else { 0.0 };
        let unmet = if deficit > 0.0 { step.unmet_kwh } else { 0.0 };
        (step.charged_kwh, dumped, step.delivered_kwh, unmet)
    } else {
        (0.0, surplus, 0.0, deficit)
    };
    let next = step.state;

    let record = HourlyRecord {
        hour: input.hour,
        year: input.year,
        demand_kwh: input.demand_kwh,
        load_kwh: load,
        renewables_generated_kwh: renewables,
        renewables_used_kwh: renewables_used,
        storage_kwh: delivered,
        battery_charge_kwh: charged,
        grid_kwh: grid,
        diesel_kwh: 0.0,
        unmet_kwh: unmet,
        blackout: unmet > 0.0,
        dumped_kwh: dumped,
        leaked_kwh: step.leaked_kwh,
        stored_kwh: next.stored_kwh,
        battery_health: next.health(spec),
        diesel_on: false,
        fuel_litres: 0.0,
    };
    (record, next)
}
