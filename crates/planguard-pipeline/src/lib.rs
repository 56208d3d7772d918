//! Planguard Pipeline - The estimation orchestrator
//!
//! Drives one estimation request through decomposition, forecasting, price
//! resolution, aggregation, and policy evaluation. Forecasts and price
//! lookups fan out per component under a bounded concurrency pool; every
//! other stage is sequential so results are reproducible. Cancellation and
//! stage deadlines propagate as fail-closed denials.

#![deny(unsafe_code)]

mod audit;
mod config;
mod orchestrator;
mod remote;
mod request;
mod retry;

pub use audit::{AuditLog, AuditRecord};
pub use config::{ConfigError, PlanguardConfig};
pub use orchestrator::{Pipeline, PipelineOptions};
pub use remote::{RemoteCarbonClient, RemoteCatalogClient, RemotePolicyClient};
pub use request::{request_hash, EstimationOutput, EstimationRequest};
pub use retry::RetryPolicy;

use thiserror::Error;

/// Fatal pipeline failures. Everything else accretes into the result and
/// flows through the fail-closed aggregation rules.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Graph(#[from] planguard_graph::GraphError),

    #[error(transparent)]
    Decomposition(#[from] planguard_semantics::DecompositionError),

    #[error(transparent)]
    Forecast(#[from] planguard_usage::ForecastError),

    #[error("audit log failure: {0}")]
    Audit(String),
}
