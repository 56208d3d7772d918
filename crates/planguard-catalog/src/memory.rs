//! In-memory catalog store.
//!
//! Deterministic and test-friendly; production deployments point the same
//! trait at a remote catalog service. The snapshot log is append-only: every
//! activation flip appends a new version record and the head view follows
//! the latest version per id, so no record is ever mutated in place.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CatalogError;
use crate::hash::{attribute_hash, content_hash};
use crate::model::{
    IngestOutcome, RateQuery, RateRecord, RateTier, ResolvedPricing, Snapshot, SnapshotIngest,
};
use crate::traits::CatalogStore;
use crate::DEFAULT_REGION;

/// One stored rate row, keyed for lookup by its attribute hash.
#[derive(Clone, Debug)]
struct StoredRate {
    sku: String,
    service: String,
    product_family: String,
    region: String,
    attribute_hash: String,
    unit: String,
    price: Decimal,
    currency: String,
    confidence: f64,
    tier_min: Option<Decimal>,
    tier_max: Option<Decimal>,
}

#[derive(Default)]
struct CatalogState {
    /// Append-only snapshot version log
    versions: Vec<Snapshot>,
    /// snapshot id -> index of its latest version record
    heads: HashMap<Uuid, usize>,
    /// Materialized projection: (provider, region, alias) -> active snapshot
    active: HashMap<(String, String, String), Uuid>,
    /// snapshot id -> rate rows in primary order
    rates: HashMap<Uuid, Vec<StoredRate>>,
    /// Flattened attribute projection: snapshot id -> attribute hash -> row indices
    attr_index: HashMap<Uuid, HashMap<String, Vec<usize>>>,
}

impl CatalogState {
    fn head(&self, id: Uuid) -> Option<&Snapshot> {
        self.heads.get(&id).map(|&idx| &self.versions[idx])
    }

    fn push_version(&mut self, snapshot: Snapshot) {
        let id = snapshot.id;
        self.versions.push(snapshot);
        self.heads.insert(id, self.versions.len() - 1);
    }

    /// Latest snapshot for a key whose validity window covers `at`.
    fn snapshot_as_of(
        &self,
        provider: &str,
        region: &str,
        alias: &str,
        at: chrono::DateTime<Utc>,
    ) -> Option<&Snapshot> {
        self.heads
            .values()
            .map(|&idx| &self.versions[idx])
            .filter(|s| {
                s.provider == provider
                    && s.region == region
                    && s.alias == alias
                    && s.valid_from <= at
                    && s.valid_to.map(|to| to > at).unwrap_or(true)
            })
            .max_by_key(|s| (s.valid_from, s.created_at))
    }
}

/// RwLock-guarded in-memory implementation of [`CatalogStore`].
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup_in_snapshot(
        state: &CatalogState,
        snapshot: &Snapshot,
        query: &RateQuery,
        attr_hash: &str,
        region: &str,
    ) -> Option<ResolvedPricing> {
        let rows = state.rates.get(&snapshot.id)?;
        let candidates = state
            .attr_index
            .get(&snapshot.id)
            .and_then(|by_hash| by_hash.get(attr_hash))?;

        let mut tiers: Vec<(&StoredRate, RateTier)> = Vec::new();
        for &idx in candidates {
            let rate = &rows[idx];
            if rate.service == query.service
                && rate.product_family == query.product_family
                && rate.region == region
                && rate.unit == query.unit
            {
                tiers.push((
                    rate,
                    RateTier {
                        min: rate.tier_min.unwrap_or(Decimal::ZERO),
                        max: rate.tier_max,
                        price: rate.price,
                        confidence: rate.confidence,
                    },
                ));
            }
        }

        if tiers.is_empty() {
            return None;
        }
        // Rows are stored in primary order, so tiers arrive tier_min
        // ascending with NULLs first already.
        let first = tiers[0].0;
        Some(ResolvedPricing {
            sku: first.sku.clone(),
            snapshot_id: snapshot.id,
            source: snapshot.source.clone(),
            currency: first.currency.clone(),
            unit: first.unit.clone(),
            region: region.to_string(),
            tiers: tiers.into_iter().map(|(_, tier)| tier).collect(),
        })
    }

    fn select_snapshot<'a>(
        state: &'a CatalogState,
        query: &RateQuery,
        region: &str,
    ) -> Option<&'a Snapshot> {
        match query.effective_time {
            Some(at) => state.snapshot_as_of(&query.provider, region, &query.alias, at),
            None => {
                let key = (
                    query.provider.clone(),
                    region.to_string(),
                    query.alias.clone(),
                );
                state.active.get(&key).and_then(|&id| state.head(id))
            }
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn ingest(&self, payload: SnapshotIngest) -> Result<IngestOutcome, CatalogError> {
        if payload.provider.is_empty() || payload.region.is_empty() {
            return Err(CatalogError::InvalidIngest(
                "provider and region are required".to_string(),
            ));
        }
        if payload.rates.is_empty() {
            return Err(CatalogError::InvalidIngest("no rates in payload".to_string()));
        }

        let hash = content_hash(&payload.rates);
        let mut state = self
            .state
            .write()
            .map_err(|_| CatalogError::Backend("catalog lock poisoned".to_string()))?;

        // Dedup on (provider, region, alias, content hash).
        let existing = state
            .heads
            .values()
            .map(|&idx| &state.versions[idx])
            .find(|s| {
                s.provider == payload.provider
                    && s.region == payload.region
                    && s.alias == payload.alias
                    && s.content_hash == hash
            })
            .map(|s| s.id);
        if let Some(snapshot_id) = existing {
            debug!(%snapshot_id, "identical snapshot content already ingested");
            return Ok(IngestOutcome {
                snapshot_id,
                deduplicated: true,
                rates_ingested: 0,
            });
        }

        let now = Utc::now();
        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            provider: payload.provider.clone(),
            region: payload.region.clone(),
            alias: payload.alias.clone(),
            source: payload.source.clone(),
            content_hash: hash,
            fetched_at: payload.fetched_at.unwrap_or(now),
            valid_from: payload.valid_from.unwrap_or(now),
            valid_to: payload.valid_to,
            active: false,
            version: 1,
            created_at: now,
        };
        let snapshot_id = snapshot.id;

        let mut rows: Vec<StoredRate> = payload
            .rates
            .iter()
            .map(|r| stored_rate(r, &payload.region))
            .collect();
        // Primary ordering: (service, product_family, attribute hash, unit,
        // tier_min NULLs first).
        rows.sort_by(|a, b| {
            (
                &a.service,
                &a.product_family,
                &a.attribute_hash,
                &a.unit,
                a.tier_min,
            )
                .cmp(&(
                    &b.service,
                    &b.product_family,
                    &b.attribute_hash,
                    &b.unit,
                    b.tier_min,
                ))
        });

        let mut by_hash: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            by_hash
                .entry(row.attribute_hash.clone())
                .or_default()
                .push(idx);
        }

        let rates_ingested = rows.len();
        state.rates.insert(snapshot_id, rows);
        state.attr_index.insert(snapshot_id, by_hash);
        state.push_version(snapshot);

        info!(%snapshot_id, rates = rates_ingested, "ingested catalog snapshot");
        Ok(IngestOutcome {
            snapshot_id,
            deduplicated: false,
            rates_ingested,
        })
    }

    async fn activate(&self, snapshot_id: Uuid) -> Result<(), CatalogError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CatalogError::Backend("catalog lock poisoned".to_string()))?;

        let target = state
            .head(snapshot_id)
            .cloned()
            .ok_or(CatalogError::SnapshotMissing(snapshot_id))?;
        let key = (
            target.provider.clone(),
            target.region.clone(),
            target.alias.clone(),
        );

        // Flip the previously active snapshot inactive first, as a new
        // version record, then flip the target active. Readers under the
        // lock observe one state or the other.
        if let Some(&old_id) = state.active.get(&key) {
            if old_id == snapshot_id {
                return Ok(());
            }
            if let Some(old) = state.head(old_id).cloned() {
                let mut retired = old;
                retired.active = false;
                retired.version += 1;
                state.push_version(retired);
            }
        }

        let mut activated = target;
        activated.active = true;
        activated.version += 1;
        state.push_version(activated);
        state.active.insert(key, snapshot_id);

        info!(%snapshot_id, "activated catalog snapshot");
        Ok(())
    }

    async fn snapshot(&self, snapshot_id: Uuid) -> Result<Option<Snapshot>, CatalogError> {
        let state = self
            .state
            .read()
            .map_err(|_| CatalogError::Backend("catalog lock poisoned".to_string()))?;
        Ok(state.head(snapshot_id).cloned())
    }

    async fn active_snapshot(
        &self,
        provider: &str,
        region: &str,
        alias: &str,
    ) -> Result<Option<Snapshot>, CatalogError> {
        let state = self
            .state
            .read()
            .map_err(|_| CatalogError::Backend("catalog lock poisoned".to_string()))?;
        let key = (provider.to_string(), region.to_string(), alias.to_string());
        Ok(state.active.get(&key).and_then(|&id| state.head(id)).cloned())
    }

    async fn list_snapshots(
        &self,
        provider: &str,
        region: &str,
    ) -> Result<Vec<Snapshot>, CatalogError> {
        let state = self
            .state
            .read()
            .map_err(|_| CatalogError::Backend("catalog lock poisoned".to_string()))?;
        let mut snapshots: Vec<Snapshot> = state
            .heads
            .values()
            .map(|&idx| state.versions[idx].clone())
            .filter(|s| s.provider == provider && s.region == region)
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snapshots)
    }

    async fn resolve(&self, query: &RateQuery) -> Result<ResolvedPricing, CatalogError> {
        let state = self
            .state
            .read()
            .map_err(|_| CatalogError::Backend("catalog lock poisoned".to_string()))?;
        let attr_hash = attribute_hash(&query.attributes);

        if let Some(snapshot) = Self::select_snapshot(&state, query, &query.region) {
            if let Some(resolved) =
                Self::lookup_in_snapshot(&state, snapshot, query, &attr_hash, &query.region)
            {
                return Ok(resolved);
            }
        } else if !query.region_fallback {
            return Err(CatalogError::SnapshotUnavailable(format!(
                "no snapshot for ({}, {}, {})",
                query.provider, query.region, query.alias
            )));
        }

        // The exact region had no match; widening is the caller's decision.
        if query.region_fallback && query.region != DEFAULT_REGION {
            if let Some(snapshot) = Self::select_snapshot(&state, query, DEFAULT_REGION) {
                if let Some(resolved) =
                    Self::lookup_in_snapshot(&state, snapshot, query, &attr_hash, DEFAULT_REGION)
                {
                    return Ok(resolved);
                }
            }
        }

        Err(CatalogError::PriceNotFound(format!(
            "no rate for {}/{} {} in {}",
            query.service, query.product_family, query.unit, query.region
        )))
    }
}

fn stored_rate(record: &RateRecord, snapshot_region: &str) -> StoredRate {
    StoredRate {
        sku: record.sku.clone(),
        service: record.service.clone(),
        product_family: record.product_family.clone(),
        region: snapshot_region.to_string(),
        attribute_hash: attribute_hash(&record.attributes),
        unit: record.unit.clone(),
        price: record.price,
        currency: record.currency.clone(),
        confidence: record.confidence,
        tier_min: record.tier_min,
        tier_max: record.tier_max,
    }
}
