//! Planguard Types - Shared data model for the decision pipeline
//!
//! Resource nodes, billing components, usage forecasts, cost drivers,
//! estimation results, and policy verdicts flow through the pipeline in
//! this shape. The confidence algebra and canonical units live here too.

#![deny(unsafe_code)]

pub mod attr;
pub mod component;
pub mod confidence;
pub mod estimate;
pub mod forecast;
pub mod resource;
pub mod units;
pub mod verdict;

pub use attr::{AttrError, AttrPath};
pub use component::{
    BillingComponent, BillingPeriod, ComponentKind, MappingError, MappingErrorKind, UsageMode,
    VarianceProfile,
};
pub use estimate::{AuditTrail, CostDriver, EstimationError, EstimationResult};
pub use forecast::UsageForecast;
pub use resource::{ChangeAction, ResourceNode};
pub use verdict::{Decision, PolicyVerdict, Severity, Violation, Warning};
