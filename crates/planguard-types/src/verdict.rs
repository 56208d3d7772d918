use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Policy evaluation outcome. Ordered so that `deny > warn > pass`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Pass,
    Warn,
    Deny,
}

impl Decision {
    /// Escalate, never downgrade: deny is absorbing.
    pub fn escalate(self, other: Decision) -> Decision {
        self.max(other)
    }
}

/// Severity of a policy rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A policy violation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Violation {
    pub policy_id: String,
    pub policy_name: String,
    pub severity: Severity,
    pub message: String,
}

/// A policy warning that does not block on its own.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Warning {
    pub policy_id: String,
    pub message: String,
}

/// The verdict over an estimation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub decision: Decision,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub policies_evaluated: usize,
    pub evaluated_at: DateTime<Utc>,
}

impl PolicyVerdict {
    pub fn pass() -> Self {
        Self {
            decision: Decision::Pass,
            violations: Vec::new(),
            warnings: Vec::new(),
            policies_evaluated: 0,
            evaluated_at: Utc::now(),
        }
    }

    /// A fail-closed denial carrying a single violation.
    pub fn deny(policy_id: impl Into<String>, policy_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            violations: vec![Violation {
                policy_id: policy_id.into(),
                policy_name: policy_name.into(),
                severity: Severity::Error,
                message: message.into(),
            }],
            warnings: Vec::new(),
            policies_evaluated: 0,
            evaluated_at: Utc::now(),
        }
    }
}
