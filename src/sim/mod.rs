/// Diesel backup applied to a finished trace.
pub mod backup;
/// Simulation clock over a year window.
pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod kpi;
pub mod types;

pub use backup::{BackupOutcome, BackupSelection};
pub use engine::{SimulationOutcome, Simulator, Technologies};
pub use kpi::TraceSummary;
pub use types::{HourlyRecord, ScenarioConfig, SimulationTrace, SystemSizing};
