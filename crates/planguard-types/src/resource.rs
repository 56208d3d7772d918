use serde::{Deserialize, Serialize};

/// Planned change action for a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
    Replace,
    NoOp,
}

impl ChangeAction {
    /// Delete-action resources produce no billing components.
    pub fn is_billable(self) -> bool {
        !matches!(self, ChangeAction::Delete | ChangeAction::NoOp)
    }
}

impl Default for ChangeAction {
    fn default() -> Self {
        ChangeAction::NoOp
    }
}

/// A single node in the infrastructure graph.
///
/// Keyed by its stable address; immutable within one estimation run.
/// Attributes are the vendor-specific nested tree from the plan document.
/// The core never reasons structurally over them; mappers extract a small
/// fixed set of fields via [`crate::attr::AttrPath`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Stable address, e.g. `aws_instance.web`
    pub address: String,
    /// Resource type tag, e.g. `aws_instance`
    pub resource_type: String,
    /// Cloud provider, e.g. `aws`
    pub provider: String,
    /// Deployment region, e.g. `us-east-1`
    pub region: String,
    /// Planned change
    #[serde(default)]
    pub change_action: ChangeAction,
    /// Nested attribute tree (scalars, sequences, mappings)
    #[serde(default)]
    pub attributes: serde_json::Value,
    /// Addresses this resource depends on, in plan order
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ResourceNode {
    /// Short `type.name` form of the address, used for implicit-reference
    /// scanning when plans carry module-prefixed addresses.
    pub fn short_address(&self) -> String {
        let parts: Vec<&str> = self.address.split('.').collect();
        if parts.len() >= 2 {
            format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1])
        } else {
            self.address.clone()
        }
    }
}
