//! TOML investigation files and built-in presets.

use std::fs;
use std::path::{Path, PathBuf};

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::devices::{BatterySpec, DieselSpec, PvSpec};
use crate::error::{ConfigError, Error};
use crate::optimiser::{
    Criterion, OptimisationSettings, SizeRange, SizingPolicy, StrategyKind, Threshold,
};
use crate::profiles::SourceProfiles;
use crate::profiles::synthetic::SyntheticSpec;
use crate::sim::backup::BackupSelection;
use crate::sim::engine::Technologies;
use crate::sim::types::{HOURS_PER_YEAR, ScenarioConfig, SourcePriority, SystemSizing};

/// Top-level investigation parsed from TOML.
///
/// Every section is optional and falls back to the `village` defaults.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvestigationConfig {
    pub simulation: SimulationSection,
    pub profiles: ProfilesSection,
    pub pv: PvSpec,
    pub battery: BatterySpec,
    pub diesel: DieselSpec,
    pub backup: BackupSection,
    pub scenario: ScenarioConfig,
    pub system: SystemSection,
    pub optimisation: OptimisationSection,
}

/// Simulation window and random seed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    /// First simulated year (inclusive) for `simulate`, first iteration year
    /// for `optimise`.
    pub start_year: u32,
    /// Last simulated year (exclusive) for `simulate`.
    pub end_year: u32,
    /// Seed for synthetic profiles.
    pub seed: u64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            start_year: 0,
            end_year: 1,
            seed: 42,
        }
    }
}

/// Where source profiles come from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilesSection {
    /// `"synthetic"` or `"csv"`.
    pub source: String,
    /// CSV file for `source = "csv"`.
    pub path: Option<PathBuf>,
    /// Treat the CSV as one year and repeat it across the horizon.
    pub repeat_year: bool,
    /// Generator parameters for `source = "synthetic"`.
    pub synthetic: SyntheticSpec,
}

impl Default for ProfilesSection {
    fn default() -> Self {
        Self {
            source: "synthetic".to_string(),
            path: None,
            repeat_year: false,
            synthetic: SyntheticSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupSection {
    /// Which blackout hours diesel serves first.
    pub selection: BackupSelection,
}

/// Installed capacities for a single `simulate` run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemSection {
    pub pv_kwp: f64,
    pub storage_kwh: f64,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            pv_kwp: 20.0,
            storage_kwh: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdSection {
    /// Criterion name from the criterion table.
    pub criterion: String,
    pub value: f64,
}

impl Default for ThresholdSection {
    fn default() -> Self {
        Self {
            criterion: "blackouts".to_string(),
            value: 0.05,
        }
    }
}

/// Capacity search settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimisationSection {
    /// Years per iteration period.
    pub iteration_length: u32,
    /// Number of iteration periods.
    pub iterations: u32,
    /// PV capacity range (kWp).
    pub pv: SizeRange,
    /// Storage capacity range (kWh).
    pub storage: SizeRange,
    pub threshold: ThresholdSection,
    /// Optimisation criterion name.
    pub criterion: String,
    /// `"coordinate_ascent"` or `"bounded_grid"`.
    pub strategy: String,
    /// Extra PV steps explored past the anchor by coordinate ascent.
    pub trade_off_steps: usize,
    pub policy: SizingPolicy,
}

impl Default for OptimisationSection {
    fn default() -> Self {
        Self {
            iteration_length: 2,
            iterations: 2,
            pv: SizeRange::new(0.0, 100.0, 10.0),
            storage: SizeRange::new(0.0, 400.0, 50.0),
            threshold: ThresholdSection::default(),
            criterion: "total_capacity".to_string(),
            strategy: "coordinate_ascent".to_string(),
            trade_off_steps: 3,
            policy: SizingPolicy::CarryForward,
        }
    }
}

impl InvestigationConfig {
    /// Off-grid village: PV, battery and diesel backup.
    pub fn village() -> Self {
        Self::default()
    }

    /// Weak grid connection with evening outages, drawn on first.
    pub fn grid_weak() -> Self {
        let mut availability = vec![0.95; 24];
        for p in &mut availability[17..23] {
            *p = 0.4;
        }
        Self {
            profiles: ProfilesSection {
                synthetic: SyntheticSpec {
                    grid_availability: availability,
                    ..SyntheticSpec::default()
                },
                ..ProfilesSection::default()
            },
            scenario: ScenarioConfig {
                grid: true,
                priority: SourcePriority::Grid,
                backup_threshold: 0.02,
                ..ScenarioConfig::default()
            },
            system: SystemSection {
                pv_kwp: 10.0,
                storage_kwh: 20.0,
            },
            optimisation: OptimisationSection {
                threshold: ThresholdSection {
                    criterion: "blackouts".to_string(),
                    value: 0.01,
                },
                ..OptimisationSection::default()
            },
            ..Self::default()
        }
    }

    /// PV and battery only, no backup of any kind.
    pub fn solar_only() -> Self {
        Self {
            scenario: ScenarioConfig {
                diesel: false,
                grid: false,
                ..ScenarioConfig::default()
            },
            system: SystemSection {
                pv_kwp: 60.0,
                storage_kwh: 300.0,
            },
            optimisation: OptimisationSection {
                pv: SizeRange::new(20.0, 120.0, 20.0),
                storage: SizeRange::new(100.0, 500.0, 100.0),
                threshold: ThresholdSection {
                    criterion: "blackouts".to_string(),
                    value: 0.1,
                },
                ..OptimisationSection::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["village", "grid_weak", "solar_only"];

    /// Loads a built-in preset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, Error> {
        match name {
            "village" => Ok(Self::village()),
            "grid_weak" => Ok(Self::grid_weak()),
            "solar_only" => Ok(Self::solar_only()),
            _ => Err(Error::config(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses an investigation from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses an investigation from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    pub fn technologies(&self) -> Technologies {
        Technologies {
            pv: self.pv,
            battery: self.battery,
            diesel: self.diesel,
            backup_selection: self.backup.selection,
        }
    }

    /// Capacities for a single simulation.
    pub fn system_sizing(&self) -> SystemSizing {
        SystemSizing::new(self.system.pv_kwp, self.system.storage_kwh)
    }

    /// Resolves criterion and strategy names into typed settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming each unknown criterion or strategy.
    pub fn optimisation_settings(&self) -> Result<OptimisationSettings, Error> {
        let o = &self.optimisation;
        let mut errors = Vec::new();
        let threshold = o.threshold.criterion.parse::<Criterion>().map_err(|e| {
            errors.push(ConfigError::new(
                "optimisation.threshold.criterion",
                e.to_string(),
            ))
        });
        let objective = o.criterion.parse::<Criterion>().map_err(|e| {
            errors.push(ConfigError::new("optimisation.criterion", e.to_string()))
        });
        let strategy = StrategyKind::from_name(&o.strategy, o.trade_off_steps);
        if strategy.is_none() {
            errors.push(ConfigError::new(
                "optimisation.strategy",
                format!(
                    "unknown strategy \"{}\", available: {}",
                    o.strategy,
                    StrategyKind::NAMES.join(", ")
                ),
            ));
        }
        match (threshold, objective, strategy) {
            (Ok(threshold), Ok(objective), Some(strategy)) => Ok(OptimisationSettings {
                start_year: self.simulation.start_year,
                iteration_length: o.iteration_length,
                iterations: o.iterations,
                pv: o.pv,
                storage: o.storage,
                threshold: Threshold::new(threshold, o.threshold.value),
                objective,
                strategy,
                policy: o.policy,
            }),
            _ => Err(Error::Config(errors)),
        }
    }

    /// Loads or generates profiles covering every hour before `end_year`.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV cannot be read or is too short.
    pub fn load_profiles(&self, end_year: u32) -> Result<SourceProfiles, Error> {
        let profiles = match (self.profiles.source.as_str(), &self.profiles.path) {
            ("csv", Some(path)) => {
                let profiles = SourceProfiles::from_csv_path(path)?;
                if self.profiles.repeat_year {
                    profiles.repeated(end_year as usize)
                } else {
                    profiles
                }
            }
            ("csv", None) => {
                return Err(Error::config(
                    "profiles.path",
                    "required when profiles.source = \"csv\"",
                ));
            }
            _ => {
                let mut rng = StdRng::seed_from_u64(self.simulation.seed);
                self.profiles.synthetic.generate(end_year, &mut rng)
            }
        };
        profiles.ensure_covers(end_year as usize * HOURS_PER_YEAR)?;
        Ok(profiles)
    }

    /// Validates every section and returns all errors found.
    ///
    /// Returns an empty vector if the investigation is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;
        if s.start_year >= s.end_year {
            errors.push(ConfigError::new(
                "simulation.start_year",
                "must be < simulation.end_year",
            ));
        }

        let p = &self.profiles;
        match p.source.as_str() {
            "synthetic" => errors.extend(p.synthetic.validate("profiles.synthetic")),
            "csv" => {
                if p.path.is_none() {
                    errors.push(ConfigError::new(
                        "profiles.path",
                        "required when profiles.source = \"csv\"",
                    ));
                }
            }
            other => errors.push(ConfigError::new(
                "profiles.source",
                format!("must be \"synthetic\" or \"csv\", got \"{other}\""),
            )),
        }

        errors.extend(self.scenario.validate("scenario"));
        errors.extend(self.technologies().validate());
        errors.extend(self.system_sizing().validate("system"));

        match self.optimisation_settings() {
            Ok(settings) => errors.extend(settings.validate()),
            Err(Error::Config(found)) => errors.extend(found),
            Err(_) => {}
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn village_preset_valid() {
        let cfg = InvestigationConfig::village();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "village should be valid: {errors:?}");
        assert!(cfg.scenario.diesel);
        assert!(!cfg.scenario.grid);
    }

    #[test]
    fn all_presets_are_valid() {
        for name in InvestigationConfig::PRESETS {
            let cfg = InvestigationConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn unknown_preset_lists_choices() {
        let err = InvestigationConfig::from_preset("city").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("preset"));
        assert!(msg.contains("solar_only"));
    }

    #[test]
    fn grid_weak_prefers_grid() {
        let cfg = InvestigationConfig::grid_weak();
        assert!(cfg.scenario.grid);
        assert_eq!(cfg.scenario.priority, SourcePriority::Grid);
        assert!(cfg.profiles.synthetic.grid_availability[19] < 0.5);
    }

    #[test]
    fn solar_only_has_no_backup() {
        let cfg = InvestigationConfig::solar_only();
        assert!(!cfg.scenario.diesel);
        assert!(!cfg.scenario.grid);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[battery]
max_charge = 0.9
bogus_field = true
"#;
        assert!(InvestigationConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[simulation]
seed = 99

[scenario]
grid = true
priority = "grid"
"#;
        let cfg = InvestigationConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.seed, 99);
        assert_eq!(cfg.simulation.end_year, 1);
        assert!(cfg.scenario.grid);
        assert_eq!(cfg.scenario.priority, SourcePriority::Grid);
        assert_eq!(cfg.battery, BatterySpec::default());
    }

    #[test]
    fn full_toml_parses() {
        let toml = r#"
[simulation]
start_year = 0
end_year = 2
seed = 7

[profiles]
source = "synthetic"

[profiles.synthetic.solar]
peak_yield = 0.9

[battery]
min_charge = 0.2
c_rate_discharging = 0.5

[diesel]
minimum_load = 0.3

[backup]
selection = "chronological"

[scenario]
backup_threshold = 0.05

[scenario.efficiency]
transmission = 0.9

[system]
pv_kwp = 15.0
storage_kwh = 30.0

[optimisation]
iteration_length = 1
iterations = 2
criterion = "renewables_fraction"
strategy = "bounded_grid"
policy = "refresh_to_initial"
pv = { min = 5.0, max = 25.0, step = 5.0 }
storage = { min = 0.0, max = 40.0, step = 10.0 }
threshold = { criterion = "unmet_energy_fraction", value = 0.02 }
"#;
        let cfg = InvestigationConfig::from_toml_str(toml).unwrap();
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
        assert_eq!(cfg.backup.selection, BackupSelection::Chronological);
        assert_eq!(cfg.scenario.efficiency.transmission, 0.9);
        assert_eq!(cfg.profiles.synthetic.solar.peak_yield, 0.9);
        let settings = cfg.optimisation_settings().unwrap();
        assert_eq!(settings.objective, Criterion::RenewablesFraction);
        assert_eq!(settings.threshold.criterion, Criterion::UnmetEnergyFraction);
        assert_eq!(settings.strategy, StrategyKind::BoundedGrid);
        assert_eq!(settings.policy, SizingPolicy::RefreshToInitial);
        assert_eq!(settings.end_year(), 2);
    }

    #[test]
    fn unknown_criterion_fails_validation() {
        let mut cfg = InvestigationConfig::village();
        cfg.optimisation.threshold.criterion = "blackout_hours".to_string();
        cfg.optimisation.criterion = "cost".to_string();
        let errors = cfg.validate();
        assert!(
            errors
                .iter()
                .any(|e| e.field == "optimisation.threshold.criterion")
        );
        assert!(errors.iter().any(|e| e.field == "optimisation.criterion"));
    }

    #[test]
    fn unknown_strategy_fails_validation() {
        let mut cfg = InvestigationConfig::village();
        cfg.optimisation.strategy = "annealing".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "optimisation.strategy"));
    }

    #[test]
    fn validation_catches_inverted_charge_window() {
        let mut cfg = InvestigationConfig::village();
        cfg.battery.min_charge = 0.95;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.min_charge"));
    }

    #[test]
    fn validation_catches_negative_capacity() {
        let mut cfg = InvestigationConfig::village();
        cfg.system.storage_kwh = -5.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "system.storage_kwh"));
    }

    #[test]
    fn csv_source_requires_path() {
        let mut cfg = InvestigationConfig::village();
        cfg.profiles.source = "csv".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "profiles.path"));
    }

    #[test]
    fn synthetic_profiles_are_seeded() {
        let cfg = InvestigationConfig::village();
        let a = cfg.load_profiles(1).unwrap();
        let b = cfg.load_profiles(1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.horizon_years(), 1);
    }

    #[test]
    fn one_year_csv_repeats_when_asked() {
        let dir = std::env::temp_dir().join(format!("minigrid-sim-cfg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("year.csv");
        let mut content = String::from("solar,grid,domestic\n");
        for h in 0..HOURS_PER_YEAR {
            content.push_str(&format!("{},1,2.0\n", (h % 24) as f64 / 24.0));
        }
        fs::write(&path, content).unwrap();

        let mut cfg = InvestigationConfig::village();
        cfg.profiles.source = "csv".to_string();
        cfg.profiles.path = Some(path);
        assert!(matches!(
            cfg.load_profiles(2),
            Err(Error::ProfileTooShort { .. })
        ));

        cfg.profiles.repeat_year = true;
        let profiles = cfg.load_profiles(2).unwrap();
        assert_eq!(profiles.horizon_years(), 2);
        assert_eq!(profiles.solar[HOURS_PER_YEAR + 12], profiles.solar[12]);

        fs::remove_dir_all(&dir).ok();
    }
}
