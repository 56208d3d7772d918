use chrono::{DateTime, Utc};
use planguard_graph::PlanDocument;
use planguard_policy::Policy;
use planguard_types::{EstimationResult, PolicyVerdict};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One estimation request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimationRequest {
    pub plan: PlanDocument,
    pub environment: String,
    #[serde(default)]
    pub include_carbon: bool,
    #[serde(default)]
    pub include_formulas: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_limit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbon_budget: Option<f64>,
    #[serde(default = "default_alias")]
    pub pricing_alias: String,
    /// Evaluate prices as of this instant, for historical replay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub custom_policies: Vec<Policy>,
    /// Widen price lookups to the default region when the exact region
    /// has no match
    #[serde(default)]
    pub region_fallback: bool,
}

fn default_alias() -> String {
    "default".to_string()
}

impl EstimationRequest {
    pub fn new(plan: PlanDocument, environment: impl Into<String>) -> Self {
        Self {
            plan,
            environment: environment.into(),
            include_carbon: false,
            include_formulas: false,
            cost_limit: None,
            carbon_budget: None,
            pricing_alias: default_alias(),
            effective_time: None,
            custom_policies: Vec::new(),
            region_fallback: false,
        }
    }
}

/// Estimation plus verdict, as returned to callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimationOutput {
    pub estimation: EstimationResult,
    pub verdict: PolicyVerdict,
}

/// Stable hash of a request for the audit stream: SHA-256 over its
/// canonical JSON encoding.
pub fn request_hash(request: &EstimationRequest) -> String {
    let encoded = serde_json::to_vec(request).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    hex::encode(hasher.finalize())
}
