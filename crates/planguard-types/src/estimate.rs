use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One cost line item, produced per processed component.
///
/// Symbolic drivers exist for explainability only: cost and confidence are
/// zero because pricing or mapping could not be resolved.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CostDriver {
    pub component_id: String,
    pub resource_address: String,
    pub service: String,
    pub product_family: String,
    pub region: String,
    pub description: String,

    pub monthly_cost_p50: Decimal,
    pub monthly_cost_p90: Decimal,
    pub unit_price: Decimal,
    pub quantity_p50: f64,
    pub quantity_p90: f64,
    pub unit: String,

    pub confidence: f64,
    pub carbon_kg_co2e: f64,

    /// Human-readable calculation, attached when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    pub symbolic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Catalog snapshot that priced this driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CostDriver {
    /// A zero-cost placeholder for a component that could not be resolved.
    pub fn symbolic(
        component_id: impl Into<String>,
        resource_address: impl Into<String>,
        service: impl Into<String>,
        product_family: impl Into<String>,
        region: impl Into<String>,
        description: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            component_id: component_id.into(),
            resource_address: resource_address.into(),
            service: service.into(),
            product_family: product_family.into(),
            region: region.into(),
            description: description.into(),
            monthly_cost_p50: Decimal::ZERO,
            monthly_cost_p90: Decimal::ZERO,
            unit_price: Decimal::ZERO,
            quantity_p50: 0.0,
            quantity_p90: 0.0,
            unit: String::new(),
            confidence: 0.0,
            carbon_kg_co2e: 0.0,
            formula: None,
            symbolic: true,
            reason: Some(reason.into()),
            snapshot_id: None,
            source: None,
        }
    }
}

/// An error recorded while estimating.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimationError {
    pub component_id: String,
    pub resource_address: String,
    pub message: String,
    /// Critical errors zero the aggregate totals
    pub critical: bool,
}

/// Reproducibility record: exactly which pricing state produced the result.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditTrail {
    pub estimated_at: Option<DateTime<Utc>>,
    pub environment: String,
    pub pricing_alias: String,
    /// Effective time of the price lookups, when replaying history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_time: Option<DateTime<Utc>>,
    /// region -> snapshot id
    #[serde(default)]
    pub snapshots_used: BTreeMap<String, String>,
}

/// The complete output of one estimation run.
///
/// Fail-closed: whenever `incomplete` is true the totals are zero and the
/// aggregate confidence is zero; the driver breakdown is still present.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimationResult {
    pub total_cost_p50: Decimal,
    pub total_cost_p90: Decimal,
    pub hourly_cost_p50: Decimal,

    pub carbon_kg_co2e: f64,
    #[serde(default)]
    pub carbon_by_region: BTreeMap<String, f64>,

    /// Sorted by P50 cost descending, ties by resource address
    pub drivers: Vec<CostDriver>,

    pub confidence: f64,
    pub incomplete: bool,

    #[serde(default)]
    pub errors: Vec<EstimationError>,
    #[serde(default)]
    pub warnings: Vec<String>,

    pub audit_trail: AuditTrail,

    pub components_processed: usize,
    pub components_estimated: usize,
    pub components_symbolic: usize,
}

impl EstimationResult {
    /// A completed result over zero components: valid, fully confident.
    pub fn empty(environment: impl Into<String>, pricing_alias: impl Into<String>) -> Self {
        Self {
            total_cost_p50: Decimal::ZERO,
            total_cost_p90: Decimal::ZERO,
            hourly_cost_p50: Decimal::ZERO,
            carbon_kg_co2e: 0.0,
            carbon_by_region: BTreeMap::new(),
            drivers: Vec::new(),
            confidence: 1.0,
            incomplete: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            audit_trail: AuditTrail {
                estimated_at: Some(Utc::now()),
                environment: environment.into(),
                pricing_alias: pricing_alias.into(),
                effective_time: None,
                snapshots_used: BTreeMap::new(),
            },
            components_processed: 0,
            components_estimated: 0,
            components_symbolic: 0,
        }
    }

    /// Whether any recorded error is critical.
    pub fn has_critical_errors(&self) -> bool {
        self.errors.iter().any(|e| e.critical)
    }
}
