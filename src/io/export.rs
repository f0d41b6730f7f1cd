//! CSV and JSON export of traces and optimisation pathways.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Error;
use crate::optimiser::IterationResult;
use crate::sim::types::SimulationTrace;

/// Column header of the hourly trace export.
pub const TRACE_HEADER: &str = "hour,year,demand_kwh,load_kwh,renewables_generated_kwh,\
                                renewables_used_kwh,storage_kwh,battery_charge_kwh,grid_kwh,\
                                diesel_kwh,unmet_kwh,blackout,dumped_kwh,leaked_kwh,stored_kwh,\
                                battery_health,diesel_on,fuel_litres";

/// Column header of the iteration pathway export.
pub const PATHWAY_HEADER: &str = "iteration,start_year,end_year,initial_pv_kwp,\
                                  initial_storage_kwh,final_pv_kwp,final_storage_kwh,diesel_kw,\
                                  blackout_fraction,unmet_energy_fraction,renewables_fraction,\
                                  diesel_fuel_litres,threshold_metric,objective_value,shortfall,\
                                  candidates_evaluated,interrupted";

fn header_fields(header: &str) -> impl Iterator<Item = &str> {
    header.split(',').map(str::trim)
}

/// Exports an hourly trace to a CSV file.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_trace_csv(trace: &SimulationTrace, path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    write_trace_csv(trace, io::BufWriter::new(file))
}

/// Writes an hourly trace as CSV to any writer.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_trace_csv(trace: &SimulationTrace, writer: impl Write) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header_fields(TRACE_HEADER))?;

    for r in trace {
        wtr.write_record(&[
            r.hour.to_string(),
            r.year.to_string(),
            format!("{:.4}", r.demand_kwh),
            format!("{:.4}", r.load_kwh),
            format!("{:.4}", r.renewables_generated_kwh),
            format!("{:.4}", r.renewables_used_kwh),
            format!("{:.4}", r.storage_kwh),
            format!("{:.4}", r.battery_charge_kwh),
            format!("{:.4}", r.grid_kwh),
            format!("{:.4}", r.diesel_kwh),
            format!("{:.4}", r.unmet_kwh),
            u8::from(r.blackout).to_string(),
            format!("{:.4}", r.dumped_kwh),
            format!("{:.4}", r.leaked_kwh),
            format!("{:.4}", r.stored_kwh),
            format!("{:.6}", r.battery_health),
            u8::from(r.diesel_on).to_string(),
            format!("{:.4}", r.fuel_litres),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports one row per iteration to a CSV file.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_pathway_csv(iterations: &[IterationResult], path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    write_pathway_csv(iterations, io::BufWriter::new(file))
}

/// Writes one row per iteration as CSV to any writer.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_pathway_csv(iterations: &[IterationResult], writer: impl Write) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header_fields(PATHWAY_HEADER))?;

    for it in iterations {
        wtr.write_record(&[
            it.index.to_string(),
            it.start_year.to_string(),
            it.end_year.to_string(),
            format!("{:.3}", it.initial_sizing.pv_kwp),
            format!("{:.3}", it.initial_sizing.storage_kwh),
            format!("{:.3}", it.final_sizing.pv_kwp),
            format!("{:.3}", it.final_sizing.storage_kwh),
            format!("{:.3}", it.final_sizing.diesel_kw),
            format!("{:.6}", it.summary.blackout_fraction),
            format!("{:.6}", it.summary.unmet_energy_fraction),
            format!("{:.6}", it.summary.renewables_fraction),
            format!("{:.3}", it.summary.diesel_fuel_litres),
            format!("{:.6}", it.threshold_metric),
            format!("{:.6}", it.objective_value),
            it.shortfall.map(|s| format!("{s:.6}")).unwrap_or_default(),
            it.candidates_evaluated.to_string(),
            it.interrupted.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes any serialisable summary as pretty JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialisation or writing fails.
pub fn write_json(value: &impl Serialize, mut writer: impl Write) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}
