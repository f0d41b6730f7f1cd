//! Named performance metrics used to accept and rank candidate systems.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::kpi::TraceSummary;
use crate::sim::types::SystemSizing;

/// Slack when comparing a metric against its threshold.
const THRESHOLD_TOLERANCE: f64 = 1e-9;

/// Whether smaller or larger values of a criterion are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Minimise,
    Maximise,
}

impl Direction {
    /// `true` if `a` is strictly better than `b`.
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            Self::Minimise => a < b,
            Self::Maximise => a > b,
        }
    }
}

/// A criterion name that is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown criterion `{0}` (expected one of: {names})", names = Criterion::names().join(", "))]
pub struct UnknownCriterion(pub String);

/// Metrics the optimiser knows how to read from a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Fraction of hours with unmet load.
    Blackouts,
    UnmetEnergyFraction,
    DieselEnergyFraction,
    /// Litres burned over the window.
    DieselFuelUsage,
    DumpedEnergyFraction,
    /// Installed PV plus storage.
    TotalCapacity,
    RenewablesFraction,
}

impl Criterion {
    pub const ALL: [Criterion; 7] = [
        Criterion::Blackouts,
        Criterion::UnmetEnergyFraction,
        Criterion::DieselEnergyFraction,
        Criterion::DieselFuelUsage,
        Criterion::DumpedEnergyFraction,
        Criterion::TotalCapacity,
        Criterion::RenewablesFraction,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Blackouts => "blackouts",
            Self::UnmetEnergyFraction => "unmet_energy_fraction",
            Self::DieselEnergyFraction => "diesel_energy_fraction",
            Self::DieselFuelUsage => "diesel_fuel_usage",
            Self::DumpedEnergyFraction => "dumped_energy_fraction",
            Self::TotalCapacity => "total_capacity",
            Self::RenewablesFraction => "renewables_fraction",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.name()).collect()
    }

    /// Fixed optimisation direction of each criterion.
    pub fn direction(self) -> Direction {
        match self {
            Self::RenewablesFraction => Direction::Maximise,
            _ => Direction::Minimise,
        }
    }

    /// Reads the criterion from a run summary and the sizing that produced it.
    pub fn evaluate(self, summary: &TraceSummary, sizing: &SystemSizing) -> f64 {
        match self {
            Self::Blackouts => summary.blackout_fraction,
            Self::UnmetEnergyFraction => summary.unmet_energy_fraction,
            Self::DieselEnergyFraction => summary.diesel_energy_fraction,
            Self::DieselFuelUsage => summary.diesel_fuel_litres,
            Self::DumpedEnergyFraction => summary.dumped_energy_fraction,
            Self::TotalCapacity => sizing.total_capacity(),
            Self::RenewablesFraction => summary.renewables_fraction,
        }
    }
}

impl FromStr for Criterion {
    type Err = UnknownCriterion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownCriterion(s.to_string()))
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Acceptance bound on one criterion.
///
/// For a minimised criterion the value is a maximum, for a maximised one a
/// minimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold {
    pub criterion: Criterion,
    pub value: f64,
}

impl Threshold {
    pub fn new(criterion: Criterion, value: f64) -> Self {
        Self { criterion, value }
    }

    pub fn is_met(&self, metric: f64) -> bool {
        match self.criterion.direction() {
            Direction::Minimise => metric <= self.value + THRESHOLD_TOLERANCE,
            Direction::Maximise => metric >= self.value - THRESHOLD_TOLERANCE,
        }
    }

    /// Distance by which `metric` misses the bound, or `None` if it is met.
    pub fn shortfall(&self, metric: f64) -> Option<f64> {
        (!self.is_met(metric)).then(|| (metric - self.value).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for c in Criterion::ALL {
            assert_eq!(c.name().parse::<Criterion>().unwrap(), c);
        }
    }

    #[test]
    fn unknown_name_lists_choices() {
        let err = "blackout".parse::<Criterion>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("`blackout`"));
        assert!(msg.contains("renewables_fraction"));
    }

    #[test]
    fn only_renewables_fraction_is_maximised() {
        for c in Criterion::ALL {
            let expected = if c == Criterion::RenewablesFraction {
                Direction::Maximise
            } else {
                Direction::Minimise
            };
            assert_eq!(c.direction(), expected, "{c}");
        }
    }

    #[test]
    fn evaluate_reads_summary_and_sizing() {
        let summary = TraceSummary {
            blackout_fraction: 0.05,
            diesel_fuel_litres: 12.0,
            renewables_fraction: 0.8,
            ..TraceSummary::default()
        };
        let sizing = SystemSizing::new(3.0, 7.0);
        assert_eq!(Criterion::Blackouts.evaluate(&summary, &sizing), 0.05);
        assert_eq!(Criterion::DieselFuelUsage.evaluate(&summary, &sizing), 12.0);
        assert_eq!(Criterion::TotalCapacity.evaluate(&summary, &sizing), 10.0);
        assert_eq!(Criterion::RenewablesFraction.evaluate(&summary, &sizing), 0.8);
    }

    #[test]
    fn minimise_threshold_is_upper_bound() {
        let t = Threshold::new(Criterion::Blackouts, 0.1);
        assert!(t.is_met(0.1));
        assert!(t.is_met(0.02));
        assert!(!t.is_met(0.15));
        let shortfall = t.shortfall(0.15).unwrap();
        assert!((shortfall - 0.05).abs() < 1e-12);
        assert_eq!(t.shortfall(0.05), None);
    }

    #[test]
    fn maximise_threshold_is_lower_bound() {
        let t = Threshold::new(Criterion::RenewablesFraction, 0.6);
        assert!(t.is_met(0.75));
        assert!(!t.is_met(0.5));
        assert!(t.shortfall(0.5).is_some());
    }

    #[test]
    fn direction_compares_strictly() {
        assert!(Direction::Minimise.is_better(1.0, 2.0));
        assert!(!Direction::Minimise.is_better(2.0, 2.0));
        assert!(Direction::Maximise.is_better(2.0, 1.0));
    }
}
