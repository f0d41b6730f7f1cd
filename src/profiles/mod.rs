//! Aligned hourly input series consumed by the dispatch engine.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::sim::types::{HOURS_PER_YEAR, LoadCategories};

/// Seeded generators for demo and test profiles.
pub mod synthetic;

/// Hourly demand split by category (kW, one value per hour).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadProfile {
    pub domestic: Vec<f64>,
    pub commercial: Vec<f64>,
    pub public: Vec<f64>,
}

impl LoadProfile {
    /// A profile with all demand in the domestic category.
    pub fn domestic_only(domestic: Vec<f64>) -> Self {
        let hours = domestic.len();
        Self {
            domestic,
            commercial: vec![0.0; hours],
            public: vec![0.0; hours],
        }
    }

    /// Demand of the enabled categories at `hour`.
    pub fn total_kw(&self, hour: usize, categories: &LoadCategories) -> f64 {
        let pick = |enabled: bool, series: &[f64]| if enabled { series[hour] } else { 0.0 };
        pick(categories.domestic, &self.domestic)
            + pick(categories.commercial, &self.commercial)
            + pick(categories.public, &self.public)
    }
}

/// Solar yield, grid availability and load, indexed by hour from the start of
/// the investigation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceProfiles {
    /// PV output per kWp installed (kW/kWp).
    pub solar: Vec<f64>,
    /// Whether the grid can supply power in each hour.
    pub grid: Vec<bool>,
    /// Demand by category.
    pub load: LoadProfile,
}

/// One CSV row of a profile file.
#[derive(Debug, Deserialize)]
struct ProfileRow {
    solar: f64,
    grid: u8,
    domestic: f64,
    #[serde(default)]
    commercial: f64,
    #[serde(default)]
    public: f64,
}

impl SourceProfiles {
    pub fn new(solar: Vec<f64>, grid: Vec<bool>, load: LoadProfile) -> Self {
        Self { solar, grid, load }
    }

    /// Repeats a single-year series to cover `years` years.
    ///
    /// Tiling is always explicit; the simulator itself never wraps a short profile.
    pub fn tile_years<T: Clone>(one_year: &[T], years: usize) -> Vec<T> {
        one_year
            .iter()
            .cycle()
            .take(one_year.len() * years)
            .cloned()
            .collect()
    }

    /// Every series repeated `years` times.
    pub fn repeated(&self, years: usize) -> Self {
        Self {
            solar: Self::tile_years(&self.solar, years),
            grid: Self::tile_years(&self.grid, years),
            load: LoadProfile {
                domestic: Self::tile_years(&self.load.domestic, years),
                commercial: Self::tile_years(&self.load.commercial, years),
                public: Self::tile_years(&self.load.public, years),
            },
        }
    }

    /// Number of hours covered by every series.
    pub fn horizon_hours(&self) -> usize {
        [
            self.solar.len(),
            self.grid.len(),
            self.load.domestic.len(),
            self.load.commercial.len(),
            self.load.public.len(),
        ]
        .into_iter()
        .min()
        .unwrap_or(0)
    }

    /// Whole years covered by every series.
    pub fn horizon_years(&self) -> u32 {
        (self.horizon_hours() / HOURS_PER_YEAR) as u32
    }

    /// Fails if any series ends before `required_hours`.
    pub fn ensure_covers(&self, required_hours: usize) -> Result<(), Error> {
        let series = [
            ("solar", self.solar.len()),
            ("grid", self.grid.len()),
            ("load.domestic", self.load.domestic.len()),
            ("load.commercial", self.load.commercial.len()),
            ("load.public", self.load.public.len()),
        ];
        for (profile, actual) in series {
            if actual < required_hours {
                return Err(Error::ProfileTooShort {
                    profile: profile.to_string(),
                    required: required_hours,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Reads profiles from CSV with a `solar,grid,domestic[,commercial,public]`
    /// header and one row per hour.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV is malformed or a value is negative.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self, Error> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut profiles = Self::default();
        for (hour, row) in rdr.deserialize::<ProfileRow>().enumerate() {
            let row = row?;
            for (name, value) in [
                ("solar", row.solar),
                ("domestic", row.domestic),
                ("commercial", row.commercial),
                ("public", row.public),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(Error::config(
                        format!("profiles.{name}[{hour}]"),
                        "must be a non-negative number",
                    ));
                }
            }
            if row.grid > 1 {
                return Err(Error::config(format!("profiles.grid[{hour}]"), "must be 0 or 1"));
            }
            profiles.solar.push(row.solar);
            profiles.grid.push(row.grid == 1);
            profiles.load.domestic.push(row.domestic);
            profiles.load.commercial.push(row.commercial);
            profiles.load.public.push(row.public);
        }
        Ok(profiles)
    }

    /// Reads profiles from a CSV file. See [`SourceProfiles::from_csv_reader`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn from_csv_path(path: &Path) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }
}
