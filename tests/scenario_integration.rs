//! End-to-end runs on hand-built profiles with known answers.

mod common;

use approx::assert_relative_eq;

use minigrid_sim::Error;
use minigrid_sim::devices::BatterySpec;
use minigrid_sim::profiles::{LoadProfile, SourceProfiles};
use minigrid_sim::sim::types::{HOURS_PER_YEAR, NetworkEfficiency, SourcePriority};
use minigrid_sim::sim::{ScenarioConfig, Simulator, SystemSizing, Technologies};

#[test]
fn grid_serves_everything_without_pv_or_storage() {
    let profiles = common::flat_profiles(1, 0.0, true, 1.0);
    let scenario = ScenarioConfig {
        grid: true,
        diesel: false,
        ..common::lossless_scenario()
    };
    let sim = Simulator::new(&profiles, scenario, Technologies::default()).unwrap();
    let outcome = sim.run(&SystemSizing::new(0.0, 0.0), 0, 1, None).unwrap();

    for r in outcome.trace.iter().take(24) {
        assert_relative_eq!(r.grid_kwh, 1.0);
        assert_eq!(r.unmet_kwh, 0.0);
        assert_eq!(r.renewables_used_kwh, 0.0);
        assert_eq!(r.storage_kwh, 0.0);
        assert!(!r.blackout);
    }
    assert_eq!(outcome.summary.blackout_hours, 0);
    assert_relative_eq!(outcome.summary.grid_kwh, HOURS_PER_YEAR as f64);
}

#[test]
fn grid_priority_draws_grid_before_pv() {
    let profiles = common::flat_profiles(1, 0.5, true, 1.0);
    let scenario = ScenarioConfig {
        grid: true,
        priority: SourcePriority::Grid,
        battery: false,
        ..common::lossless_scenario()
    };
    let sim = Simulator::new(&profiles, scenario, Technologies::default()).unwrap();
    let outcome = sim.run(&SystemSizing::new(10.0, 0.0), 0, 1, None).unwrap();

    let first = &outcome.trace.records()[0];
    assert_relative_eq!(first.grid_kwh, 1.0);
    assert_eq!(first.renewables_used_kwh, 0.0);
    assert_relative_eq!(first.dumped_kwh, 5.0);
}

#[test]
fn diesel_backup_halves_blackout_fraction() {
    // Every fifth hour carries load; nothing can serve it without diesel.
    let hours = HOURS_PER_YEAR;
    let load: Vec<f64> = (0..hours)
        .map(|h| if h % 5 == 0 { 1.0 + (h % 7) as f64 } else { 0.0 })
        .collect();
    let profiles = SourceProfiles::new(
        vec![0.0; hours],
        vec![false; hours],
        LoadProfile::domestic_only(load),
    );
    let scenario = ScenarioConfig {
        battery: false,
        backup_threshold: 0.1,
        ..common::lossless_scenario()
    };
    let sim = Simulator::new(&profiles, scenario, Technologies::default()).unwrap();
    let outcome = sim.run(&SystemSizing::new(0.0, 0.0), 0, 1, None).unwrap();

    assert_relative_eq!(outcome.backup.blackout_fraction_before, 0.2);
    assert_relative_eq!(outcome.summary.blackout_fraction, 0.1);
    assert_eq!(outcome.backup.hours_served, 876);

    let largest_served = outcome
        .trace
        .iter()
        .filter(|r| r.diesel_on)
        .map(|r| r.diesel_kwh)
        .fold(0.0, f64::max);
    assert_relative_eq!(outcome.final_sizing.diesel_kw, largest_served);
    assert_relative_eq!(outcome.final_sizing.diesel_kw, 7.0);
}

#[test]
fn battery_discharge_is_clamped_by_c_rate_then_floor() {
    let profiles = common::flat_profiles(1, 0.0, false, 20.0);
    let scenario = ScenarioConfig {
        diesel: false,
        ..common::lossless_scenario()
    };
    let battery = BatterySpec {
        max_charge: 0.9,
        min_charge: 0.4,
        c_rate_discharging: 0.33,
        ..common::ideal_battery()
    };
    let sim = Simulator::new(&profiles, scenario, common::technologies_with(battery)).unwrap();
    let outcome = sim.run(&SystemSizing::new(0.0, 10.0), 0, 1, None).unwrap();
    let records = outcome.trace.records();

    // 9 kWh stored, 3.3 kWh/h rate limit.
    assert_relative_eq!(records[0].storage_kwh, 3.3, epsilon = 1e-9);
    assert_relative_eq!(records[0].unmet_kwh, 16.7, epsilon = 1e-9);
    // 5.7 kWh left, only 1.7 kWh above the 4 kWh floor.
    assert_relative_eq!(records[1].storage_kwh, 1.7, epsilon = 1e-9);
    assert_relative_eq!(records[1].unmet_kwh, 18.3, epsilon = 1e-9);
    assert_relative_eq!(records[2].storage_kwh, 0.0, epsilon = 1e-9);
    assert_relative_eq!(records[2].stored_kwh, 4.0, epsilon = 1e-9);
}

#[test]
fn network_losses_raise_supply_side_load() {
    let profiles = common::flat_profiles(1, 0.0, true, 1.0);
    let scenario = ScenarioConfig {
        grid: true,
        efficiency: NetworkEfficiency {
            transmission: 0.9,
            conversion: 0.9,
        },
        ..ScenarioConfig::default()
    };
    let sim = Simulator::new(&profiles, scenario, Technologies::default()).unwrap();
    let outcome = sim.run(&SystemSizing::new(0.0, 0.0), 0, 1, None).unwrap();
    let first = &outcome.trace.records()[0];
    assert_relative_eq!(first.demand_kwh, 1.0);
    assert_relative_eq!(first.load_kwh, 1.0 / 0.81, epsilon = 1e-12);
    assert_relative_eq!(first.grid_kwh, first.load_kwh);
}

#[test]
fn pv_output_degrades_from_year_to_year() {
    let profiles = common::flat_profiles(2, 0.1, false, 0.0);
    let scenario = ScenarioConfig {
        battery: false,
        diesel: false,
        ..common::lossless_scenario()
    };
    let sim = Simulator::new(&profiles, scenario, Technologies::default()).unwrap();
    let outcome = sim.run(&SystemSizing::new(10.0, 0.0), 0, 2, None).unwrap();
    let records = outcome.trace.records();

    assert_relative_eq!(records[0].renewables_generated_kwh, 1.0, epsilon = 1e-12);
    assert_relative_eq!(
        records[HOURS_PER_YEAR].renewables_generated_kwh,
        0.99,
        epsilon = 1e-12
    );
    assert_relative_eq!(outcome.final_sizing.pv_kwp, 10.0 * 0.99 * 0.99, epsilon = 1e-12);
}

#[test]
fn later_window_uses_absolute_hours() {
    let profiles = common::flat_profiles(3, 0.0, true, 1.0);
    let scenario = ScenarioConfig {
        grid: true,
        ..common::lossless_scenario()
    };
    let sim = Simulator::new(&profiles, scenario, Technologies::default()).unwrap();
    let outcome = sim.run(&SystemSizing::new(0.0, 0.0), 2, 3, None).unwrap();
    let first = &outcome.trace.records()[0];
    assert_eq!(first.hour, 2 * HOURS_PER_YEAR);
    assert_eq!(first.year, 2);
}

#[test]
fn window_past_profile_end_is_rejected() {
    let profiles = common::flat_profiles(1, 0.0, true, 1.0);
    let sim = Simulator::new(&profiles, ScenarioConfig::default(), Technologies::default()).unwrap();
    let err = sim.run(&SystemSizing::new(1.0, 1.0), 0, 2, None).unwrap_err();
    match err {
        Error::ProfileTooShort {
            required, actual, ..
        } => {
            assert_eq!(required, 2 * HOURS_PER_YEAR);
            assert_eq!(actual, HOURS_PER_YEAR);
        }
        other => panic!("expected ProfileTooShort, got {other}"),
    }
}

#[test]
fn invalid_battery_fails_construction() {
    let profiles = common::flat_profiles(1, 0.0, true, 1.0);
    let battery = BatterySpec {
        min_charge: 0.9,
        max_charge: 0.5,
        ..BatterySpec::default()
    };
    let err = Simulator::new(
        &profiles,
        ScenarioConfig::default(),
        common::technologies_with(battery),
    )
    .unwrap_err();
    assert!(err.to_string().contains("battery.min_charge"), "{err}");
}
