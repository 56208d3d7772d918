//! Planguard Policy - Governance over estimation results
//!
//! Evaluates cost, carbon, confidence, and completeness policies against an
//! estimation and produces a pass/warn/deny verdict. The engine is
//! fail-closed: an incomplete estimation in a production-class environment
//! denies regardless of how policies are configured, and an evaluator
//! failure is itself a denial, never a silent pass.

#![deny(unsafe_code)]

use async_trait::async_trait;
use chrono::Utc;
use planguard_types::{Decision, EstimationResult, PolicyVerdict, Severity, Violation, Warning};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{info, warn};

/// What a policy checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "threshold")]
pub enum PolicyKind {
    /// Deny when total P90 cost exceeds the monetary threshold
    CostLimit(Decimal),
    /// Deny when total carbon exceeds the kg CO₂e threshold
    CarbonBudget(f64),
    /// Violate (or warn, by severity) when aggregate confidence is below
    /// the threshold fraction
    ConfidenceThreshold(f64),
    /// Violate when the estimation is incomplete
    IncompleteEstimate,
}

/// A governance rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: PolicyKind,
    pub severity: Severity,
    pub enabled: bool,
}

impl Policy {
    /// Cost-limit policy injected from a request's `cost_limit` option.
    pub fn cost_limit(threshold: Decimal) -> Self {
        Self {
            id: "request-cost-limit".to_string(),
            name: "Request Cost Limit".to_string(),
            description: format!("Deny when monthly P90 cost exceeds ${threshold}"),
            kind: PolicyKind::CostLimit(threshold),
            severity: Severity::Error,
            enabled: true,
        }
    }

    /// Carbon-budget policy injected from a request's `carbon_budget` option.
    pub fn carbon_budget(threshold: f64) -> Self {
        Self {
            id: "request-carbon-budget".to_string(),
            name: "Request Carbon Budget".to_string(),
            description: format!("Deny when total carbon exceeds {threshold} kg CO2e"),
            kind: PolicyKind::CarbonBudget(threshold),
            severity: Severity::Error,
            enabled: true,
        }
    }
}

/// Evaluation input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub estimation: EstimationResult,
    pub environment: String,
    /// Whether the environment profile is production-class; trips the
    /// incomplete fail-closed gate
    pub production_class: bool,
    pub custom_policies: Vec<Policy>,
}

/// Policy evaluation errors. Any of these must surface as a deny upstream.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy rule set invalid: {0}")]
    InvalidRuleSet(String),

    #[error("policy evaluator unreachable: {0}")]
    Unreachable(String),

    #[error("policy lock poisoned")]
    LockPoisoned,
}

/// The evaluator interface the pipeline consumes. A remote rule runtime
/// implements the same trait; failures become fail-closed denials at the
/// pipeline boundary.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyVerdict, PolicyError>;
}

/// Built-in policy engine.
pub struct PolicyEngine {
    policies: RwLock<Vec<Policy>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(Vec::new()),
        }
    }

    /// Engine seeded with the default governance policies.
    pub fn with_defaults() -> Self {
        let engine = Self::new();
        if let Ok(mut policies) = engine.policies.write() {
            policies.push(Policy {
                id: "default-confidence".to_string(),
                name: "Minimum Confidence".to_string(),
                description: "Warn when estimation confidence is below 70%".to_string(),
                kind: PolicyKind::ConfidenceThreshold(0.70),
                severity: Severity::Warning,
                enabled: true,
            });
            policies.push(Policy {
                id: "prod-incomplete".to_string(),
                name: "No Incomplete Estimations In Production".to_string(),
                description: "Block incomplete estimations in production".to_string(),
                kind: PolicyKind::IncompleteEstimate,
                severity: Severity::Error,
                enabled: true,
            });
        }
        engine
    }

    pub fn add_policy(&self, policy: Policy) -> Result<(), PolicyError> {
        let mut policies = self.policies.write().map_err(|_| PolicyError::LockPoisoned)?;
        policies.push(policy);
        Ok(())
    }

    fn evaluate_policy(
        policy: &Policy,
        request: &PolicyRequest,
    ) -> (Option<Violation>, Option<Warning>) {
        let estimation = &request.estimation;
        match &policy.kind {
            PolicyKind::CostLimit(threshold) => {
                if estimation.total_cost_p90 > *threshold {
                    return (
                        Some(Violation {
                            policy_id: policy.id.clone(),
                            policy_name: policy.name.clone(),
                            severity: policy.severity,
                            message: format!(
                                "monthly cost P90 (${:.2}) exceeds limit (${:.2})",
                                estimation.total_cost_p90.to_f64().unwrap_or(0.0),
                                threshold.to_f64().unwrap_or(0.0),
                            ),
                        }),
                        None,
                    );
                }
            }
            PolicyKind::CarbonBudget(threshold) => {
                if estimation.carbon_kg_co2e > *threshold {
                    return (
                        Some(Violation {
                            policy_id: policy.id.clone(),
                            policy_name: policy.name.clone(),
                            severity: policy.severity,
                            message: format!(
                                "carbon emissions ({:.2} kg CO2e) exceed budget ({:.2} kg)",
                                estimation.carbon_kg_co2e, threshold
                            ),
                        }),
                        None,
                    );
                }
            }
            PolicyKind::ConfidenceThreshold(threshold) => {
                if estimation.confidence < *threshold {
                    let message = format!(
                        "estimation confidence ({:.0}%) below threshold ({:.0}%)",
                        estimation.confidence * 100.0,
                        threshold * 100.0
                    );
                    if policy.severity == Severity::Error {
                        return (
                            Some(Violation {
                                policy_id: policy.id.clone(),
                                policy_name: policy.name.clone(),
                                severity: policy.severity,
                                message,
                            }),
                            None,
                        );
                    }
                    return (
                        None,
                        Some(Warning {
                            policy_id: policy.id.clone(),
                            message,
                        }),
                    );
                }
            }
            PolicyKind::IncompleteEstimate => {
                if estimation.incomplete && request.production_class {
                    return (
                        Some(Violation {
                            policy_id: policy.id.clone(),
                            policy_name: policy.name.clone(),
                            severity: policy.severity,
                            message: format!(
                                "incomplete estimation not allowed in {} ({} symbolic component(s))",
                                request.environment, estimation.components_symbolic
                            ),
                        }),
                        None,
                    );
                }
            }
        }
        (None, None)
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl PolicyEvaluator for PolicyEngine {
    async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyVerdict, PolicyError> {
        let policies = self.policies.read().map_err(|_| PolicyError::LockPoisoned)?;

        let mut verdict = PolicyVerdict {
            decision: Decision::Pass,
            violations: Vec::new(),
            warnings: Vec::new(),
            policies_evaluated: 0,
            evaluated_at: Utc::now(),
        };

        for policy in policies
            .iter()
            .chain(request.custom_policies.iter())
            .filter(|p| p.enabled)
        {
            verdict.policies_evaluated += 1;
            let (violation, warning) = Self::evaluate_policy(policy, request);

            if let Some(violation) = violation {
                let escalation = match violation.severity {
                    Severity::Error => Decision::Deny,
                    Severity::Warning | Severity::Info => Decision::Warn,
                };
                verdict.decision = verdict.decision.escalate(escalation);
                verdict.violations.push(violation);
            }
            if let Some(warning) = warning {
                verdict.decision = verdict.decision.escalate(Decision::Warn);
                verdict.warnings.push(warning);
            }
        }

        // Fail-closed gate, independent of policy configuration: partial
        // data never passes in a production-class environment.
        if request.estimation.incomplete && request.production_class {
            if verdict.decision != Decision::Deny {
                warn!(
                    environment = %request.environment,
                    "incomplete estimation denied by fail-closed gate"
                );
                verdict.decision = Decision::Deny;
                verdict.violations.push(Violation {
                    policy_id: "fail-closed-incomplete".to_string(),
                    policy_name: "Fail-Closed Incomplete Gate".to_string(),
                    severity: Severity::Error,
                    message: "estimation is incomplete; production changes require complete data"
                        .to_string(),
                });
            }
        }

        info!(
            decision = ?verdict.decision,
            violations = verdict.violations.len(),
            policies = verdict.policies_evaluated,
            "policy evaluation complete"
        );
        Ok(verdict)
    }
}
