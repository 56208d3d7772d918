//! Planguard Estimation - Cost and carbon aggregation
//!
//! Combines billing components, usage forecasts, and resolved rates into an
//! [`planguard_types::EstimationResult`]. Fail-closed: any symbolic
//! component or critical error zeroes the aggregate totals and confidence
//! while the per-driver breakdown stays visible for explainability.

#![deny(unsafe_code)]

mod engine;
mod normalize;

pub use engine::{Aggregator, ComponentEstimate, EstimationContext, PricingOutcome};
pub use normalize::{normalize_quantity, NormalizeError};
