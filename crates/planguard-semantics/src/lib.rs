//! Planguard Semantics - Billing decomposition
//!
//! Converts a resource graph into an ordered list of atomic billing
//! components. Mappers are registered per resource type at startup; the
//! registry is read-only during estimation. Unmapped resources are never
//! silently skipped: they produce a synthetic component carrying an
//! `UNSUPPORTED_RESOURCE` error so the breakdown stays complete.

#![deny(unsafe_code)]

mod engine;
mod mappers;
mod registry;

pub use engine::{DecompositionEngine, DecompositionOutcome};
pub use mappers::aws::register_aws_mappers;
pub use registry::{MapperRegistry, ResourceMapper};

use thiserror::Error;

/// Decomposition-stage failures that abort the run.
#[derive(Debug, Error)]
pub enum DecompositionError {
    #[error(transparent)]
    Graph(#[from] planguard_graph::GraphError),
}
