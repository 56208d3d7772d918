use thiserror::Error;

/// Catalog store errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No rate matched the query; the caller marks the component symbolic.
    #[error("PRICE_NOT_FOUND: {0}")]
    PriceNotFound(String),

    /// No snapshot covers the requested (provider, region, alias, time).
    #[error("SNAPSHOT_UNAVAILABLE: {0}")]
    SnapshotUnavailable(String),

    #[error("snapshot not found: {0}")]
    SnapshotMissing(uuid::Uuid),

    #[error("invalid ingest payload: {0}")]
    InvalidIngest(String),

    #[error("catalog backend error: {0}")]
    Backend(String),
}

impl CatalogError {
    /// Whether the error means "no data" rather than a backend failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::PriceNotFound(_) | CatalogError::SnapshotUnavailable(_)
        )
    }
}
