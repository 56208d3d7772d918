use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable point-in-time capture of a provider catalog.
///
/// Activation never mutates a snapshot row: it appends a new version record
/// with the flipped flag, so readers always observe a consistent state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub provider: String,
    pub region: String,
    pub alias: String,
    /// Where the capture came from, e.g. `aws-pricing-api`
    pub source: String,
    /// SHA-256 over the sorted canonical encoding of the snapshot's rates
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    pub active: bool,
    /// Version counter, bumped on every activation flip
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

/// One rate row as ingested. Tier bounds are optional; tiered SKUs carry
/// several records sharing the same attributes and unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateRecord {
    pub sku: String,
    pub service: String,
    pub product_family: String,
    /// Flat lookup attributes; sorted map so the canonical encoding is stable
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub unit: String,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_rate_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_min: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_max: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_rate_confidence() -> f64 {
    1.0
}

/// A snapshot ingestion payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotIngest {
    pub provider: String,
    pub region: String,
    #[serde(default = "default_alias")]
    pub alias: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    pub rates: Vec<RateRecord>,
}

fn default_alias() -> String {
    "default".to_string()
}

/// Outcome of an ingestion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub snapshot_id: Uuid,
    /// True when identical content already existed and no snapshot was created
    pub deduplicated: bool,
    pub rates_ingested: usize,
}

/// A price lookup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateQuery {
    pub provider: String,
    pub service: String,
    pub product_family: String,
    pub region: String,
    pub attributes: BTreeMap<String, String>,
    pub unit: String,
    pub alias: String,
    /// Evaluate the catalog as of this instant; `None` means the active snapshot
    pub effective_time: Option<DateTime<Utc>>,
    /// Widen to the default region when the exact region has no match
    pub region_fallback: bool,
}

impl RateQuery {
    pub fn new(
        provider: impl Into<String>,
        service: impl Into<String>,
        product_family: impl Into<String>,
        region: impl Into<String>,
        attributes: BTreeMap<String, String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            service: service.into(),
            product_family: product_family.into(),
            region: region.into(),
            attributes,
            unit: unit.into(),
            alias: "default".to_string(),
            effective_time: None,
            region_fallback: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_effective_time(mut self, at: DateTime<Utc>) -> Self {
        self.effective_time = Some(at);
        self
    }

    pub fn with_region_fallback(mut self) -> Self {
        self.region_fallback = true;
        self
    }
}

/// One pricing tier of a resolved rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateTier {
    pub min: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Decimal>,
    pub price: Decimal,
    pub confidence: f64,
}

/// The result of a successful lookup: all tiers for the matched SKU,
/// ordered by `min` ascending, plus the snapshot that priced them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedPricing {
    pub sku: String,
    pub snapshot_id: Uuid,
    pub source: String,
    pub currency: String,
    pub unit: String,
    /// Region the rate actually came from (differs from the query region
    /// only under opt-in fallback)
    pub region: String,
    pub tiers: Vec<RateTier>,
}

impl ResolvedPricing {
    /// Whether this SKU prices in more than one tier.
    pub fn is_tiered(&self) -> bool {
        self.tiers.len() > 1
    }

    /// Unit price of the first tier (the flat price for untiered SKUs).
    pub fn base_price(&self) -> Decimal {
        self.tiers
            .first()
            .map(|t| t.price)
            .unwrap_or(Decimal::ZERO)
    }

    /// Confidence of the first tier.
    pub fn base_confidence(&self) -> f64 {
        self.tiers.first().map(|t| t.confidence).unwrap_or(0.0)
    }
}
