//! Physical component models for the minigrid.

/// Battery storage with state-of-charge window, C-rate limits and wear.
pub mod battery;
/// Diesel backup generator fuel and minimum-load model.
pub mod diesel;
/// Photovoltaic array degradation.
pub mod solar;

pub use battery::{BatterySpec, BatteryState, BatteryStep};
pub use diesel::{DieselOutput, DieselSpec};
pub use solar::PvSpec;
