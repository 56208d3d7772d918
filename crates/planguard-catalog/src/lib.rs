//! Planguard Catalog - Versioned price catalog store
//!
//! Snapshots are append-only and immutable: activation writes a new version
//! record, never mutates a row in place. At most one snapshot is active per
//! (provider, region, alias). Lookups are deterministic for a given snapshot
//! and support time-travel via an effective time; when no rate matches the
//! caller decides whether to widen to the default region.

#![deny(unsafe_code)]

mod error;
mod hash;
mod memory;
mod model;
mod tiered;
mod traits;

pub use error::CatalogError;
pub use hash::{attribute_hash, content_hash};
pub use memory::InMemoryCatalog;
pub use model::{
    IngestOutcome, RateQuery, RateRecord, RateTier, ResolvedPricing, Snapshot, SnapshotIngest,
};
pub use tiered::{tiered_cost, TierError};
pub use traits::CatalogStore;

/// Region widened to when the caller opts into fallback.
pub const DEFAULT_REGION: &str = "us-east-1";
