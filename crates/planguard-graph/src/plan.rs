use planguard_types::{ChangeAction, ResourceNode};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// A parsed change plan: the list of proposed resources.
///
/// This is the vendor-neutral form the pipeline consumes; translating a
/// specific IaC tool's plan JSON into it is an ingestion concern.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlanDocument {
    #[serde(default)]
    pub format_version: String,
    pub resources: Vec<ResourceNode>,
}

impl PlanDocument {
    pub fn from_json(raw: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Summary of planned change actions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub replaces: usize,
    pub no_ops: usize,
}

impl ChangeStats {
    pub fn record(&mut self, action: ChangeAction) {
        match action {
            ChangeAction::Create => self.creates += 1,
            ChangeAction::Update => self.updates += 1,
            ChangeAction::Delete => self.deletes += 1,
            ChangeAction::Replace => self.replaces += 1,
            ChangeAction::NoOp => self.no_ops += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.creates + self.updates + self.deletes + self.replaces + self.no_ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_plan() {
        let raw = r#"{
            "format_version": "1.0",
            "resources": [{
                "address": "aws_instance.web",
                "resource_type": "aws_instance",
                "provider": "aws",
                "region": "us-east-1",
                "change_action": "create",
                "attributes": {"instance_type": "t3.medium"}
            }]
        }"#;
        let plan = PlanDocument::from_json(raw).unwrap();
        assert_eq!(plan.resources.len(), 1);
        assert_eq!(plan.resources[0].change_action, ChangeAction::Create);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = PlanDocument::from_json("{not json").unwrap_err();
        assert!(matches!(err, GraphError::Parse(_)));
    }
}
