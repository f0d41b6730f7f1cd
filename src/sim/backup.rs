//! Retroactive diesel backup over a finished, diesel-free trace.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::devices::diesel::DieselSpec;
use crate::sim::types::SimulationTrace;

/// Order in which blackout hours are handed to the diesel generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupSelection {
    /// Largest unmet energy first; ties go to the earlier hour.
    #[default]
    LargestDeficitFirst,
    /// Earliest blackout first.
    Chronological,
}

/// What the backup pass did to a trace.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BackupOutcome {
    /// Generator size needed to serve every backed-up hour (kW).
    pub capacity_kw: f64,
    /// Number of hours moved from blackout to diesel.
    pub hours_served: usize,
    /// Fuel burned across all served hours (litres).
    pub fuel_litres: f64,
    /// Blackout fraction of the diesel-free trace.
    pub blackout_fraction_before: f64,
    /// Blackout fraction after backup.
    pub blackout_fraction_after: f64,
}

/// Number of blackout hours a trace of `hours` may keep under `threshold`.
pub fn allowed_blackout_hours(threshold: f64, hours: usize) -> usize {
    // The small slack keeps e.g. 0.1 * 8760 from flooring to 875.
    (threshold.clamp(0.0, 1.0) * hours as f64 + 1e-9).floor() as usize
}

/// Serves enough blackout hours with diesel to bring the blackout fraction of
/// the whole trace down to `threshold`.
///
/// If the trace is already at or below the threshold it is returned untouched
/// with zero diesel capacity. Otherwise the selected hours are served in full;
/// the generator is sized to the largest of their deficits, and each served
/// hour burns fuel for at least the generator's minimum load, with the excess
/// above the deficit booked as dumped energy.
pub fn apply_backup(
    trace: SimulationTrace,
    threshold: f64,
    diesel: &DieselSpec,
    selection: BackupSelection,
) -> (SimulationTrace, BackupOutcome) {
    let before = trace.blackout_fraction();
    let allowed = allowed_blackout_hours(threshold, trace.len());
    let blackout_hours = trace.blackout_hours();

    if before <= threshold || blackout_hours <= allowed {
        let outcome = BackupOutcome {
            blackout_fraction_before: before,
            blackout_fraction_after: before,
            ..BackupOutcome::default()
        };
        return (trace, outcome);
    }

    let mut records = trace.into_records();
    let mut candidates: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.blackout)
        .map(|(i, _)| i)
        .collect();
    if selection == BackupSelection::LargestDeficitFirst {
        // Stable sort keeps chronological order among equal deficits.
        candidates.sort_by(|&a, &b| records[b].unmet_kwh.total_cmp(&records[a].unmet_kwh));
    }
    candidates.truncate(blackout_hours - allowed);

    let capacity_kw = candidates
        .iter()
        .map(|&i| records[i].unmet_kwh)
        .fold(0.0, f64::max);

    let mut fuel_litres = 0.0;
    for &i in &candidates {
        let record = &mut records[i];
        let output = diesel.serve(record.unmet_kwh, capacity_kw);
        record.diesel_kwh = output.delivered_kwh;
        record.unmet_kwh = 0.0;
        record.blackout = false;
        record.diesel_on = true;
        record.fuel_litres = output.fuel_litres;
        record.dumped_kwh += output.dumped_kwh;
        fuel_litres += output.fuel_litres;
    }

    let trace = SimulationTrace::new(records);
    let outcome = BackupOutcome {
        capacity_kw,
        hours_served: candidates.len(),
        fuel_litres,
        blackout_fraction_before: before,
        blackout_fraction_after: trace.blackout_fraction(),
    };
    debug!(
        capacity_kw,
        hours_served = outcome.hours_served,
        before,
        after = outcome.blackout_fraction_after,
        "diesel backup applied"
    );
    (trace, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::HourlyRecord;
    use approx::assert_relative_eq;

    fn record(hour: usize, unmet_kwh: f64) -> HourlyRecord {
        HourlyRecord {
            hour,
            year: 0,
            demand_kwh: 5.0,
            load_kwh: 5.0,
            renewables_generated_kwh: 0.0,
            renewables_used_kwh: 5.0 - unmet_kwh,
            storage_kwh: 0.0,
            battery_charge_kwh: 0.0,
            grid_kwh: 0.0,
            diesel_kwh: 0.0,
            unmet_kwh,
            blackout: unmet_kwh > 0.0,
            dumped_kwh: 0.0,
            leaked_kwh: 0.0,
            stored_kwh: 0.0,
            battery_health: 1.0,
            diesel_on: false,
            fuel_litres: 0.0,
        }
    }

    /// 20 hours with blackouts at the given (hour, unmet) pairs.
    fn trace_with(blackouts: &[(usize, f64)]) -> SimulationTrace {
        SimulationTrace::new(
            (0..20)
                .map(|h| {
                    let unmet = blackouts
                        .iter()
                        .find(|(bh, _)| *bh == h)
                        .map_or(0.0, |(_, u)| *u);
                    record(h, unmet)
                })
                .collect(),
        )
    }

    fn no_min_load() -> DieselSpec {
        DieselSpec {
            fuel_consumption: 0.4,
            minimum_load: 0.0,
        }
    }

    #[test]
    fn below_threshold_is_untouched() {
        let trace = trace_with(&[(3, 1.0)]);
        let (out, outcome) = apply_backup(
            trace.clone(),
            0.1,
            &no_min_load(),
            BackupSelection::default(),
        );
        assert_eq!(out, trace);
        assert_eq!(outcome.capacity_kw, 0.0);
        assert_eq!(outcome.hours_served, 0);
    }

    #[test]
    fn no_blackouts_means_no_diesel() {
        let (out, outcome) = apply_backup(
            trace_with(&[]),
            0.0,
            &no_min_load(),
            BackupSelection::default(),
        );
        assert_eq!(out.blackout_hours(), 0);
        assert_eq!(outcome.capacity_kw, 0.0);
    }

    #[test]
    fn drives_fraction_exactly_to_threshold() {
        // 4 of 20 hours = 0.20, threshold 0.10 leaves 2.
        let trace = trace_with(&[(1, 0.5), (5, 2.0), (9, 1.0), (15, 3.0)]);
        let (out, outcome) = apply_backup(trace, 0.1, &no_min_load(), BackupSelection::default());
        assert_relative_eq!(out.blackout_fraction(), 0.1);
        assert_eq!(outcome.hours_served, 2);
        assert_relative_eq!(outcome.capacity_kw, 3.0);
        assert!(out.records()[15].diesel_on);
        assert!(out.records()[5].diesel_on);
        assert!(out.records()[1].blackout);
    }

    #[test]
    fn chronological_serves_earliest() {
        let trace = trace_with(&[(1, 0.5), (5, 2.0), (9, 1.0), (15, 3.0)]);
        let (out, outcome) =
            apply_backup(trace, 0.1, &no_min_load(), BackupSelection::Chronological);
        assert!(out.records()[1].diesel_on);
        assert!(out.records()[5].diesel_on);
        assert!(out.records()[15].blackout);
        assert_relative_eq!(outcome.capacity_kw, 2.0);
    }

    #[test]
    fn zero_threshold_covers_every_blackout() {
        let trace = trace_with(&[(2, 1.0), (4, 2.5), (6, 0.25)]);
        let (out, outcome) = apply_backup(trace, 0.0, &no_min_load(), BackupSelection::default());
        assert_eq!(out.blackout_hours(), 0);
        assert_eq!(outcome.hours_served, 3);
        assert_relative_eq!(outcome.capacity_kw, 2.5);
    }

    #[test]
    fn served_hours_balance_and_burn_fuel() {
        let trace = trace_with(&[(2, 1.0), (4, 4.0)]);
        let diesel = DieselSpec {
            fuel_consumption: 0.5,
            minimum_load: 0.5,
        };
        let (out, outcome) = apply_backup(trace, 0.0, &diesel, BackupSelection::default());
        let small = &out.records()[2];
        // Capacity 4 kW, minimum load 2 kWh: 1 kWh delivered, 1 kWh dumped.
        assert_relative_eq!(small.diesel_kwh, 1.0);
        assert_relative_eq!(small.dumped_kwh, 1.0);
        assert_relative_eq!(small.fuel_litres, 1.0);
        for r in out.records() {
            assert_relative_eq!(r.load_kwh, r.total_energy_used_kwh() + r.unmet_kwh);
        }
        assert_relative_eq!(outcome.fuel_litres, 1.0 + 2.0);
    }

    #[test]
    fn ties_break_chronologically() {
        let trace = trace_with(&[(3, 1.0), (7, 1.0), (11, 1.0)]);
        // Allowed 2 of 20 at 0.1, so one hour is served.
        let (out, _) = apply_backup(trace, 0.1, &no_min_load(), BackupSelection::default());
        assert!(out.records()[3].diesel_on);
        assert!(!out.records()[7].diesel_on);
    }

    #[test]
    fn allowed_hours_tolerate_rounding() {
        assert_eq!(allowed_blackout_hours(0.1, 8760), 876);
        assert_eq!(allowed_blackout_hours(0.0, 8760), 0);
        assert_eq!(allowed_blackout_hours(1.0, 24), 24);
    }
}
