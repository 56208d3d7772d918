//! Planguard Usage - Monthly usage forecasting
//!
//! Deterministic, side-effect-free forecasts per billing component under an
//! environment profile. An unrecognized environment is a fatal error, never
//! silently defaulted.

#![deny(unsafe_code)]

mod forecaster;
mod profiles;

pub use forecaster::Forecaster;
pub use profiles::{EnvironmentProfile, ProfileTable};

use thiserror::Error;

/// Forecasting failures.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("UNKNOWN_ENVIRONMENT: no profile registered for {0}")]
    UnknownEnvironment(String),
}
