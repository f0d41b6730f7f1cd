//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Preset used when neither `--scenario` nor `--preset` is given.
pub const DEFAULT_PRESET: &str = "village";

#[derive(Debug, Parser)]
#[command(name = "minigrid-sim")]
#[command(author, version, about = "Hourly minigrid dispatch simulator and capacity optimiser")]
#[command(
    long_about = "Simulates hourly energy dispatch of a PV, battery, grid and diesel minigrid\n\
    and searches for the smallest system that meets a reliability threshold.\n\
    \nExamples:\n  \
    minigrid-sim simulate                          # Village preset, one year\n  \
    minigrid-sim simulate --preset grid_weak --json\n  \
    minigrid-sim optimise --scenario site.toml --pathway-out pathway.csv"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one simulation with the configured system sizes
    Simulate(SimulateArgs),

    /// Search capacities across successive iteration periods
    #[command(
        long_about = "Run the multi-period capacity optimisation.\n\
        \nEach iteration searches PV and storage sizes inside the configured ranges,\n\
        starting from the capacities left by the previous iteration.\n\
        Ctrl-C stops the search and reports the best result found so far."
    )]
    Optimise(OptimiseArgs),
}

/// Where the investigation comes from, plus output switches.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Load the investigation from a TOML file
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Use a built-in preset (village, grid_weak, solar_only)
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Override the profile generator seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Export the hourly trace to CSV
    #[arg(long, value_name = "PATH")]
    pub trace_out: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    /// Preset to load when no scenario file is given.
    pub fn preset_name(&self) -> &str {
        self.preset.as_deref().unwrap_or(DEFAULT_PRESET)
    }
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct OptimiseArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Export one row per iteration to CSV
    #[arg(long, value_name = "PATH")]
    pub pathway_out: Option<PathBuf>,
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Self::Simulate(args) => &args.common,
            Self::Optimise(args) => &args.common,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("minigrid-sim").chain(args.iter().copied()))
    }

    #[test]
    fn simulate_defaults_to_village() {
        let cli = parse(&["simulate"]).unwrap();
        let common = cli.command.common();
        assert_eq!(common.preset_name(), "village");
        assert!(common.scenario.is_none());
        assert!(!common.json);
    }

    #[test]
    fn supports_scenario_file() {
        let cli = parse(&["simulate", "--scenario", "site.toml"]).unwrap();
        assert_eq!(
            cli.command.common().scenario.as_deref().and_then(|p| p.to_str()),
            Some("site.toml")
        );
    }

    #[test]
    fn scenario_and_preset_are_exclusive() {
        let err = parse(&["simulate", "--scenario", "a.toml", "--preset", "village"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn optimise_accepts_pathway_and_seed() {
        let cli = parse(&[
            "optimise",
            "--preset",
            "solar_only",
            "--seed",
            "7",
            "--pathway-out",
            "p.csv",
        ])
        .unwrap();
        let Command::Optimise(args) = cli.command else {
            panic!("expected optimise");
        };
        assert_eq!(args.common.seed, Some(7));
        assert_eq!(args.common.preset_name(), "solar_only");
        assert!(args.pathway_out.is_some());
    }

    #[test]
    fn pathway_out_is_optimise_only() {
        assert!(parse(&["simulate", "--pathway-out", "p.csv"]).is_err());
    }
}
