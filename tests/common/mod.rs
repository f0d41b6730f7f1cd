//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use rand::{SeedableRng, rngs::StdRng};

use minigrid_sim::devices::BatterySpec;
use minigrid_sim::profiles::synthetic::SyntheticSpec;
use minigrid_sim::profiles::{LoadProfile, SourceProfiles};
use minigrid_sim::sim::types::{HOURS_PER_YEAR, NetworkEfficiency};
use minigrid_sim::sim::{ScenarioConfig, Technologies};

/// Constant profiles: `solar` kWh/kWp every hour, grid always `grid`,
/// domestic load of `load_kw`.
pub fn flat_profiles(years: usize, solar: f64, grid: bool, load_kw: f64) -> SourceProfiles {
    let hours = years * HOURS_PER_YEAR;
    SourceProfiles::new(
        vec![solar; hours],
        vec![grid; hours],
        LoadProfile::domestic_only(vec![load_kw; hours]),
    )
}

/// Default synthetic profiles drawn with a fixed seed.
pub fn synthetic_profiles(years: u32, seed: u64) -> SourceProfiles {
    let mut rng = StdRng::seed_from_u64(seed);
    SyntheticSpec::default().generate(years, &mut rng)
}

/// Village scenario with a loss-free network.
pub fn lossless_scenario() -> ScenarioConfig {
    ScenarioConfig {
        efficiency: NetworkEfficiency {
            transmission: 1.0,
            conversion: 1.0,
        },
        ..ScenarioConfig::default()
    }
}

/// Ideal battery: full window, no losses, 1C, no fade.
pub fn ideal_battery() -> BatterySpec {
    BatterySpec {
        max_charge: 1.0,
        min_charge: 0.0,
        leakage: 0.0,
        conversion_in: 1.0,
        conversion_out: 1.0,
        c_rate_charging: 1.0,
        c_rate_discharging: 1.0,
        cycle_lifetime: 1500.0,
        lifetime_loss: 0.0,
    }
}

pub fn technologies_with(battery: BatterySpec) -> Technologies {
    Technologies {
        battery,
        ..Technologies::default()
    }
}
