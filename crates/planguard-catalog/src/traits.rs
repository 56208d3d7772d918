use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::model::{IngestOutcome, RateQuery, ResolvedPricing, Snapshot, SnapshotIngest};

/// The price catalog interface the pipeline consumes.
///
/// Implementations must be deterministic for a given snapshot version and
/// must never mutate a snapshot in place.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Ingest a snapshot payload. Identical content (by content hash) for
    /// the same (provider, region, alias) deduplicates to the existing
    /// snapshot id instead of creating a new one.
    async fn ingest(&self, payload: SnapshotIngest) -> Result<IngestOutcome, CatalogError>;

    /// Activate a snapshot: the previously active snapshot for the same
    /// (provider, region, alias) is versioned inactive first, then the new
    /// one is flipped active. Readers observe either the old or the new
    /// snapshot, never a partial state.
    async fn activate(&self, snapshot_id: Uuid) -> Result<(), CatalogError>;

    async fn snapshot(&self, snapshot_id: Uuid) -> Result<Option<Snapshot>, CatalogError>;

    async fn active_snapshot(
        &self,
        provider: &str,
        region: &str,
        alias: &str,
    ) -> Result<Option<Snapshot>, CatalogError>;

    async fn list_snapshots(
        &self,
        provider: &str,
        region: &str,
    ) -> Result<Vec<Snapshot>, CatalogError>;

    /// Resolve the best-matching rate for a query, with all of its tiers.
    /// `PRICE_NOT_FOUND` / `SNAPSHOT_UNAVAILABLE` signal missing data; the
    /// caller marks the component symbolic.
    async fn resolve(&self, query: &RateQuery) -> Result<ResolvedPricing, CatalogError>;
}
