//! Crate-wide error type.

use thiserror::Error;

/// A configuration problem tied to a single field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.min_charge"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    /// Creates a new error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced before or around a simulation run.
///
/// Physical limits (C-rate, empty battery) and unreachable reliability targets
/// are never errors; they are reported through the hourly records and the
/// iteration results instead.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more configuration fields are invalid.
    #[error("{}", join_config_errors(.0))]
    Config(Vec<ConfigError>),

    /// A source profile does not cover the requested horizon.
    #[error("{profile} profile covers {actual} hours but {required} are required")]
    ProfileTooShort {
        /// Name of the offending profile (`solar`, `grid`, `load.domestic`, ...).
        profile: String,
        /// Number of hours the simulation window needs.
        required: usize,
        /// Number of hours the profile provides.
        actual: usize,
    },

    /// The simulation window is empty or reversed.
    #[error("invalid horizon: start year {start_year} must precede end year {end_year}")]
    InvalidHorizon {
        /// First simulated year (inclusive).
        start_year: u32,
        /// Last simulated year (exclusive).
        end_year: u32,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wraps a single field error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config(vec![ConfigError::new(field, message)])
    }

    /// Returns `Ok(())` when `errors` is empty, otherwise an [`Error::Config`].
    pub fn check(errors: Vec<ConfigError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::Config(errors))
        }
    }
}

fn join_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
