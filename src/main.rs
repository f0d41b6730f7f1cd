//! Minigrid simulator entry point: CLI wiring and config-driven runs.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use minigrid_sim::Error;
use minigrid_sim::config::InvestigationConfig;
use minigrid_sim::io::export::{export_pathway_csv, export_trace_csv, write_json};
use minigrid_sim::optimiser::{CancelFlag, IterationResult, OptimisationResult, Optimiser};
use minigrid_sim::sim::{BackupOutcome, Simulator, SystemSizing, TraceSummary};

use cli::{Cli, Command, CommonArgs, OptimiseArgs, SimulateArgs};

/// JSON view of a single simulation.
#[derive(Serialize)]
struct SimulationReport {
    start_year: u32,
    end_year: u32,
    initial_sizing: SystemSizing,
    final_sizing: SystemSizing,
    backup: BackupOutcome,
    summary: TraceSummary,
}

/// Loads the investigation: `--scenario` first, then `--preset`, then the default preset.
fn load_config(args: &CommonArgs) -> Result<InvestigationConfig> {
    let mut cfg = match &args.scenario {
        Some(path) => InvestigationConfig::from_toml_file(path)
            .with_context(|| format!("failed to load scenario {}", path.display()))?,
        None => InvestigationConfig::from_preset(args.preset_name())?,
    };
    if let Some(seed) = args.seed {
        cfg.simulation.seed = seed;
    }
    Error::check(cfg.validate()).context("invalid investigation")?;
    Ok(cfg)
}

fn simulate(args: &SimulateArgs) -> Result<()> {
    let cfg = load_config(&args.common)?;
    let (start_year, end_year) = (cfg.simulation.start_year, cfg.simulation.end_year);
    let profiles = cfg.load_profiles(end_year)?;
    let simulator = Simulator::new(&profiles, cfg.scenario, cfg.technologies())?;

    info!(start_year, end_year, sizing = %cfg.system_sizing(), "running simulation");
    let outcome = simulator.run(&cfg.system_sizing(), start_year, end_year, None)?;

    if args.common.json {
        let report = SimulationReport {
            start_year,
            end_year,
            initial_sizing: outcome.initial_sizing,
            final_sizing: outcome.final_sizing,
            backup: outcome.backup,
            summary: outcome.summary,
        };
        write_json(&report, std::io::stdout().lock())?;
    } else {
        println!("Years {start_year}..{end_year}");
        println!("Installed: {}", outcome.initial_sizing);
        println!("End of window: {}", outcome.final_sizing);
        println!("\n{}", outcome.summary);
    }

    if let Some(path) = &args.common.trace_out {
        export_trace_csv(&outcome.trace, path)
            .with_context(|| format!("failed to write trace {}", path.display()))?;
        eprintln!("Trace written to {}", path.display());
    }
    Ok(())
}

fn print_iteration(it: &IterationResult) {
    println!(
        "Iteration {} (years {}..{}): {}",
        it.index, it.start_year, it.end_year, it.initial_sizing
    );
    println!("  end of period: {}", it.final_sizing);
    println!(
        "  threshold metric {:.4}, objective {:.4}, {} candidates",
        it.threshold_metric, it.objective_value, it.candidates_evaluated
    );
    if let Some(shortfall) = it.shortfall {
        println!("  threshold missed by {shortfall:.4}");
    }
    if it.interrupted {
        println!("  search interrupted");
    }
}

async fn optimise(args: OptimiseArgs) -> Result<()> {
    let cfg = load_config(&args.common)?;
    let settings = cfg.optimisation_settings()?;
    let profiles = cfg.load_profiles(settings.end_year())?;

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current candidates");
            on_signal.cancel();
        }
    });

    let scenario = cfg.scenario;
    let tech = cfg.technologies();
    let result: OptimisationResult = tokio::task::spawn_blocking(move || {
        let simulator = Simulator::new(&profiles, scenario, tech)?;
        Optimiser::new(simulator, settings, cancel)?.run()
    })
    .await
    .context("optimisation task failed")??;

    if args.common.json {
        write_json(&result, std::io::stdout().lock())?;
    } else {
        for it in &result.iterations {
            print_iteration(it);
        }
        if result.cancelled {
            println!("Optimisation cancelled after {} iteration(s)", result.iterations.len());
        }
    }

    if let Some(path) = &args.pathway_out {
        export_pathway_csv(&result.iterations, path)
            .with_context(|| format!("failed to write pathway {}", path.display()))?;
        eprintln!("Pathway written to {}", path.display());
    }
    if let (Some(path), Some(last)) = (&args.common.trace_out, result.iterations.last()) {
        export_trace_csv(&last.trace, path)
            .with_context(|| format!("failed to write trace {}", path.display()))?;
        eprintln!("Trace of iteration {} written to {}", last.index, path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    minigrid_sim::logging::init(cli.command.common().verbose);

    match cli.command {
        Command::Simulate(args) => simulate(&args),
        Command::Optimise(args) => optimise(args).await,
    }
}
