use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What a component charges for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Compute,
    Storage,
    Network,
    Data,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Compute => "compute",
            ComponentKind::Storage => "storage",
            ComponentKind::Network => "network",
            ComponentKind::Data => "data",
        }
    }
}

/// How the capacity behind a component is purchased.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMode {
    OnDemand,
    Reserved,
    Spot,
    Provisioned,
}

/// Billing frequency of a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Hourly,
    Monthly,
    PerRequest,
    PerGigabyte,
}

impl BillingPeriod {
    /// Canonical pricing unit this period bills in.
    pub fn unit(self) -> &'static str {
        match self {
            BillingPeriod::Hourly => crate::units::UNIT_HOURS,
            BillingPeriod::Monthly => crate::units::UNIT_GB_MONTH,
            BillingPeriod::PerRequest => crate::units::UNIT_REQUESTS,
            BillingPeriod::PerGigabyte => crate::units::UNIT_GB,
        }
    }
}

/// Prior over a component's monthly usage, seeded by the mapper.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VarianceProfile {
    /// Expected usage per month in the component's unit
    pub baseline: f64,
    pub p50: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
    /// Intrinsic confidence in [0, 1]
    pub confidence: f64,
    /// What was assumed to produce this prior
    #[serde(default)]
    pub assumptions: Vec<String>,
}

impl VarianceProfile {
    /// Deterministic usage: size is exactly what was provisioned.
    pub fn provisioned(size: f64) -> Self {
        Self {
            baseline: size,
            p50: size,
            p90: size,
            min: size,
            max: size,
            confidence: 0.99,
            assumptions: vec!["usage fixed as provisioned".to_string()],
        }
    }

    /// Full-month duty cycle prior for always-on resources.
    pub fn full_month() -> Self {
        let hours = crate::units::HOURS_PER_MONTH;
        Self {
            baseline: hours,
            p50: hours,
            p90: hours,
            min: hours * 0.8,
            max: hours,
            confidence: 0.85,
            assumptions: vec!["always-on operation".to_string()],
        }
    }

    /// Usage-driven prior with wide bounds and low confidence.
    pub fn usage_driven(baseline: f64, confidence: f64) -> Self {
        Self {
            baseline,
            p50: baseline * 0.5,
            p90: baseline * 2.0,
            min: 0.0,
            max: baseline * 5.0,
            confidence,
            assumptions: vec!["usage highly variable".to_string()],
        }
    }

    pub fn with_assumption(mut self, assumption: impl Into<String>) -> Self {
        self.assumptions.push(assumption.into());
        self
    }
}

/// Why a resource could not be mapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingErrorKind {
    UnsupportedResource,
    MissingAttribute,
}

/// A failure to map a resource into billable components.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MappingError {
    pub resource_address: String,
    pub resource_type: String,
    pub kind: MappingErrorKind,
    pub reason: String,
    /// Critical errors abort the aggregate; non-critical ones only
    /// mark the affected component symbolic.
    pub critical: bool,
}

impl MappingError {
    pub fn unsupported(address: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        Self {
            resource_address: address.into(),
            reason: format!("no mapper registered for resource type {resource_type}"),
            resource_type,
            kind: MappingErrorKind::UnsupportedResource,
            critical: false,
        }
    }

    pub fn missing_attribute(
        address: impl Into<String>,
        resource_type: impl Into<String>,
        attribute: &str,
    ) -> Self {
        Self {
            resource_address: address.into(),
            resource_type: resource_type.into(),
            kind: MappingErrorKind::MissingAttribute,
            reason: format!("required attribute {attribute} is missing"),
            critical: true,
        }
    }
}

impl std::fmt::Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mapping error for {}: {}", self.resource_address, self.reason)
    }
}

/// An atomic billable unit derived from one resource.
///
/// Ids are deterministic: `{resource-address}:{kind}` with an index suffix
/// when a resource yields several components of the same kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BillingComponent {
    pub id: String,
    pub resource_address: String,
    pub kind: ComponentKind,
    pub usage_mode: UsageMode,
    pub billing_period: BillingPeriod,
    /// Provider service, e.g. `AmazonEC2`
    pub service: String,
    /// Catalog product family, e.g. `Compute Instance`
    pub product_family: String,
    pub provider: String,
    pub region: String,
    /// Flat price-lookup attributes; BTreeMap keeps serialization stable
    #[serde(default)]
    pub lookup_attributes: BTreeMap<String, String>,
    /// Provisioned capacity in GB, when the component has one. Required to
    /// normalize an hours forecast against a GB-month price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<f64>,
    pub description: String,
    pub variance: VarianceProfile,
    /// Ids of components this one depends on
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Present when the mapper could not fully resolve this component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_error: Option<MappingError>,
}

impl BillingComponent {
    /// Deterministic component id.
    pub fn component_id(address: &str, kind: ComponentKind, index: Option<usize>) -> String {
        match index {
            Some(i) => format!("{address}:{}:{i}", kind.as_str()),
            None => format!("{address}:{}", kind.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_ids_are_deterministic() {
        assert_eq!(
            BillingComponent::component_id("aws_instance.web", ComponentKind::Compute, None),
            "aws_instance.web:compute"
        );
        assert_eq!(
            BillingComponent::component_id("aws_instance.web", ComponentKind::Storage, Some(1)),
            "aws_instance.web:storage:1"
        );
    }

    #[test]
    fn provisioned_profile_is_near_deterministic() {
        let profile = VarianceProfile::provisioned(50.0);
        assert_eq!(profile.p50, 50.0);
        assert_eq!(profile.p90, 50.0);
        assert!(profile.confidence >= 0.99);
    }

    #[test]
    fn missing_attribute_is_critical() {
        let err = MappingError::missing_attribute("aws_instance.web", "aws_instance", "instance_type");
        assert!(err.critical);
        assert_eq!(err.kind, MappingErrorKind::MissingAttribute);
    }

    #[test]
    fn unsupported_resource_is_not_critical() {
        let err = MappingError::unsupported("fancy_thing.a", "fancy_thing");
        assert!(!err.critical);
    }
}
