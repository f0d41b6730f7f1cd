//! Hourly minigrid dispatch simulator and multi-period capacity optimiser.

pub mod config;
pub mod devices;
pub mod error;
/// Trace and pathway export.
pub mod io;
pub mod logging;
/// Capacity search across iteration periods.
pub mod optimiser;
pub mod profiles;
/// Hourly dispatch, diesel backup, and run summaries.
pub mod sim;

pub use error::{ConfigError, Error};
