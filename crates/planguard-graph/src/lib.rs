//! Planguard Graph - Resource graph construction
//!
//! Parses a vendor-neutral plan document into a dependency graph of
//! resource nodes, resolves implicit dependencies by scanning attribute
//! strings for other resource addresses, and provides a deterministic
//! topological ordering. Cycles are rejected at build time.

#![deny(unsafe_code)]

mod builder;
mod error;
mod plan;

pub use builder::{GraphBuilder, GraphNode, ResourceGraph};
pub use error::GraphError;
pub use plan::{ChangeStats, PlanDocument};
