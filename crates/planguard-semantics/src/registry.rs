use std::collections::HashMap;

use planguard_graph::GraphNode;
use planguard_types::{BillingComponent, MappingError};

/// A mapper converts one resource into its billable components.
///
/// Mappers must not guess defaults for price-determining attributes
/// (instance type, volume type, engine); a component with a
/// `MISSING_ATTRIBUTE` error is emitted instead. Non-price-determining
/// defaults are permitted but recorded as assumptions on the seeded
/// variance profile.
pub trait ResourceMapper: Send + Sync {
    /// Resource type tag this mapper handles, e.g. `aws_instance`.
    fn resource_type(&self) -> &'static str;

    /// Attributes this mapper reads, for documentation and coverage tooling.
    fn supported_attributes(&self) -> &'static [&'static str];

    /// Produce components and any mapping errors (may return both).
    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>);
}

/// Mapper registry, built once at startup and read-only afterwards.
#[derive(Default)]
pub struct MapperRegistry {
    mappers: HashMap<&'static str, Box<dyn ResourceMapper>>,
    aliases: HashMap<&'static str, &'static str>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mapper: Box<dyn ResourceMapper>) {
        self.mappers.insert(mapper.resource_type(), mapper);
    }

    /// Register an alternate type tag for an existing mapper.
    pub fn register_alias(&mut self, alias: &'static str, canonical: &'static str) {
        self.aliases.insert(alias, canonical);
    }

    pub fn get(&self, resource_type: &str) -> Option<&dyn ResourceMapper> {
        if let Some(mapper) = self.mappers.get(resource_type) {
            return Some(mapper.as_ref());
        }
        self.aliases
            .get(resource_type)
            .and_then(|canonical| self.mappers.get(canonical))
            .map(|mapper| mapper.as_ref())
    }

    pub fn supported_types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.mappers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planguard_types::{
        BillingPeriod, ComponentKind, UsageMode, VarianceProfile,
    };

    struct StubMapper;

    impl ResourceMapper for StubMapper {
        fn resource_type(&self) -> &'static str {
            "aws_instance"
        }

        fn supported_attributes(&self) -> &'static [&'static str] {
            &["instance_type"]
        }

        fn produce_components(
            &self,
            node: &GraphNode,
        ) -> (Vec<BillingComponent>, Vec<MappingError>) {
            (
                vec![BillingComponent {
                    id: BillingComponent::component_id(
                        &node.resource.address,
                        ComponentKind::Compute,
                        None,
                    ),
                    resource_address: node.resource.address.clone(),
                    kind: ComponentKind::Compute,
                    usage_mode: UsageMode::OnDemand,
                    billing_period: BillingPeriod::Hourly,
                    service: "AmazonEC2".to_string(),
                    product_family: "Compute Instance".to_string(),
                    provider: "aws".to_string(),
                    region: node.resource.region.clone(),
                    lookup_attributes: Default::default(),
                    size_gb: None,
                    description: "stub".to_string(),
                    variance: VarianceProfile::full_month(),
                    depends_on: vec![],
                    mapping_error: None,
                }],
                vec![],
            )
        }
    }

    #[test]
    fn resolves_by_type_and_alias() {
        let mut registry = MapperRegistry::new();
        registry.register(Box::new(StubMapper));
        registry.register_alias("aws_spot_instance", "aws_instance");

        assert!(registry.get("aws_instance").is_some());
        assert!(registry.get("aws_spot_instance").is_some());
        assert!(registry.get("aws_unknown").is_none());
        assert_eq!(registry.supported_types(), vec!["aws_instance"]);
    }
}
