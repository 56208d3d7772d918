use std::collections::HashMap;

use planguard_graph::{GraphNode, ResourceGraph};
use planguard_types::{
    BillingComponent, BillingPeriod, ComponentKind, MappingError, UsageMode, VarianceProfile,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::registry::MapperRegistry;
use crate::DecompositionError;

/// Result of decomposing a graph.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DecompositionOutcome {
    pub components: Vec<BillingComponent>,
    pub mapping_errors: Vec<MappingError>,

    pub resources_processed: usize,
    pub resources_mapped: usize,
    pub resources_skipped: usize,
    pub components_created: usize,

    pub covered_types: Vec<String>,
    pub uncovered_types: Vec<String>,
}

/// Walks the graph in dependency order and applies registered mappers.
pub struct DecompositionEngine {
    registry: MapperRegistry,
}

impl DecompositionEngine {
    pub fn new(registry: MapperRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    /// Decompose a graph into billing components.
    ///
    /// Delete and no-op resources are skipped. A resource with no
    /// registered mapper yields one synthetic component flagged
    /// `UNSUPPORTED_RESOURCE` so nothing disappears from the breakdown.
    pub fn decompose(
        &self,
        graph: &ResourceGraph,
    ) -> Result<DecompositionOutcome, DecompositionError> {
        let mut outcome = DecompositionOutcome::default();
        let mut covered: Vec<String> = Vec::new();
        let mut uncovered: Vec<String> = Vec::new();

        // address -> ids of the components that address produced
        let mut components_by_resource: HashMap<String, Vec<String>> = HashMap::new();

        for node in graph.topological_sort()? {
            outcome.resources_processed += 1;

            if !node.resource.change_action.is_billable() {
                outcome.resources_skipped += 1;
                continue;
            }

            let Some(mapper) = self.registry.get(&node.resource.resource_type) else {
                warn!(
                    address = %node.resource.address,
                    resource_type = %node.resource.resource_type,
                    "no mapper for resource type"
                );
                if !uncovered.contains(&node.resource.resource_type) {
                    uncovered.push(node.resource.resource_type.clone());
                }
                let error =
                    MappingError::unsupported(&node.resource.address, &node.resource.resource_type);
                outcome.mapping_errors.push(error.clone());
                outcome
                    .components
                    .push(unsupported_component(node, error));
                outcome.components_created += 1;
                continue;
            };

            let (mut components, errors) = mapper.produce_components(node);
            outcome.mapping_errors.extend(errors);

            if !covered.contains(&node.resource.resource_type) {
                covered.push(node.resource.resource_type.clone());
            }
            outcome.resources_mapped += 1;

            let dependency_ids = resolve_component_dependencies(node, &components_by_resource);
            let produced: Vec<String> = components.iter().map(|c| c.id.clone()).collect();

            for component in &mut components {
                for dep in &dependency_ids {
                    if !component.depends_on.contains(dep) {
                        component.depends_on.push(dep.clone());
                    }
                }
            }

            outcome.components_created += components.len();
            outcome.components.extend(components);
            components_by_resource.insert(node.resource.address.clone(), produced);
        }

        covered.sort_unstable();
        uncovered.sort_unstable();
        outcome.covered_types = covered;
        outcome.uncovered_types = uncovered;

        debug!(
            components = outcome.components.len(),
            mapping_errors = outcome.mapping_errors.len(),
            "decomposition complete"
        );
        Ok(outcome)
    }
}

/// Project resource-level dependencies onto components: a component of B
/// depends on the primary (first) component of each resource B depends on.
fn resolve_component_dependencies(
    node: &GraphNode,
    lookup: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut deps = Vec::new();
    for dep_address in &node.dependencies {
        if let Some(ids) = lookup.get(dep_address) {
            if let Some(primary) = ids.first() {
                deps.push(primary.clone());
            }
        }
    }
    deps
}

/// Synthetic component for a resource the registry cannot map.
fn unsupported_component(node: &GraphNode, error: MappingError) -> BillingComponent {
    BillingComponent {
        id: BillingComponent::component_id(&node.resource.address, ComponentKind::Data, None),
        resource_address: node.resource.address.clone(),
        kind: ComponentKind::Data,
        usage_mode: UsageMode::OnDemand,
        billing_period: BillingPeriod::Monthly,
        service: String::new(),
        product_family: String::new(),
        provider: node.resource.provider.clone(),
        region: node.resource.region.clone(),
        lookup_attributes: Default::default(),
        size_gb: None,
        description: format!("unsupported resource {}", node.resource.resource_type),
        variance: VarianceProfile::default(),
        depends_on: Vec::new(),
        mapping_error: Some(error),
    }
}
