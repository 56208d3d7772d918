use std::collections::{BTreeMap, HashMap, HashSet};

use planguard_types::ResourceNode;
use serde_json::Value;
use tracing::debug;

use crate::error::GraphError;
use crate::plan::{ChangeStats, PlanDocument};

/// A resource plus its resolved graph edges.
#[derive(Clone, Debug)]
pub struct GraphNode {
    pub resource: ResourceNode,
    /// Addresses this node depends on (explicit + inferred)
    pub dependencies: Vec<String>,
    /// Addresses that depend on this node
    pub dependents: Vec<String>,
}

/// The infrastructure dependency graph for one estimation run.
///
/// Node storage is ordered by address so traversals are deterministic.
#[derive(Clone, Debug, Default)]
pub struct ResourceGraph {
    nodes: BTreeMap<String, GraphNode>,
    pub roots: Vec<String>,
    pub leaves: Vec<String>,
    pub provider_counts: BTreeMap<String, usize>,
    pub region_counts: BTreeMap<String, usize>,
    pub change_stats: ChangeStats,
}

impl ResourceGraph {
    pub fn node(&self, address: &str) -> Option<&GraphNode> {
        self.nodes.get(address)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in dependency order: every node appears after everything it
    /// depends on. Rejects cycles.
    pub fn topological_sort(&self) -> Result<Vec<&GraphNode>, GraphError> {
        let mut sorted = Vec::with_capacity(self.nodes.len());
        let mut visited: HashSet<&str> = HashSet::new();
        let mut visiting: HashSet<&str> = HashSet::new();

        // Addresses visited in sorted order so the result is stable across runs.
        for address in self.nodes.keys() {
            self.visit(address, &mut visited, &mut visiting, &mut sorted)?;
        }
        Ok(sorted)
    }

    fn visit<'a>(
        &'a self,
        address: &'a str,
        visited: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        sorted: &mut Vec<&'a GraphNode>,
    ) -> Result<(), GraphError> {
        if visited.contains(address) {
            return Ok(());
        }
        if !visiting.insert(address) {
            return Err(GraphError::CircularDependency(address.to_string()));
        }

        let node = match self.nodes.get(address) {
            Some(node) => node,
            None => {
                // Dangling edge to an excluded resource; nothing to order.
                visiting.remove(address);
                return Ok(());
            }
        };

        for dep in &node.dependencies {
            self.visit(dep, visited, visiting, sorted)?;
        }

        visiting.remove(address);
        visited.insert(address);
        sorted.push(node);
        Ok(())
    }
}

/// Builds a [`ResourceGraph`] from a plan document.
pub struct GraphBuilder {
    resolve_implicit: bool,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            resolve_implicit: true,
        }
    }

    /// Disable implicit dependency inference (explicit edges only).
    pub fn without_implicit_dependencies(mut self) -> Self {
        self.resolve_implicit = false;
        self
    }

    pub fn build(&self, plan: &PlanDocument) -> Result<ResourceGraph, GraphError> {
        let mut graph = ResourceGraph::default();

        for resource in &plan.resources {
            if graph.nodes.contains_key(&resource.address) {
                return Err(GraphError::DuplicateAddress(resource.address.clone()));
            }
            graph.change_stats.record(resource.change_action);
            *graph
                .provider_counts
                .entry(resource.provider.clone())
                .or_default() += 1;
            if !resource.region.is_empty() {
                *graph
                    .region_counts
                    .entry(resource.region.clone())
                    .or_default() += 1;
            }
            graph.nodes.insert(
                resource.address.clone(),
                GraphNode {
                    resource: resource.clone(),
                    dependencies: Vec::new(),
                    dependents: Vec::new(),
                },
            );
        }

        // Explicit edges from the plan's dependency lists.
        let mut edges: Vec<(String, String)> = Vec::new();
        for node in graph.nodes.values() {
            for dep in &node.resource.dependencies {
                if graph.nodes.contains_key(dep) && dep != &node.resource.address {
                    edges.push((node.resource.address.clone(), dep.clone()));
                }
            }
        }

        // Implicit edges: string attributes referencing another address.
        if self.resolve_implicit {
            edges.extend(self.infer_implicit_edges(&graph));
        }

        for (from, to) in edges {
            if let Some(node) = graph.nodes.get_mut(&from) {
                if !node.dependencies.contains(&to) {
                    node.dependencies.push(to.clone());
                }
            }
            if let Some(dep_node) = graph.nodes.get_mut(&to) {
                if !dep_node.dependents.contains(&from) {
                    dep_node.dependents.push(from.clone());
                }
            }
        }

        for (address, node) in &graph.nodes {
            if node.dependencies.is_empty() {
                graph.roots.push(address.clone());
            }
            if node.dependents.is_empty() {
                graph.leaves.push(address.clone());
            }
        }

        debug!(
            resources = graph.nodes.len(),
            roots = graph.roots.len(),
            creates = graph.change_stats.creates,
            "built resource graph"
        );
        Ok(graph)
    }

    /// Scan string attributes for mentions of other resource addresses.
    /// Self-references and duplicates are skipped.
    fn infer_implicit_edges(&self, graph: &ResourceGraph) -> Vec<(String, String)> {
        // Index full and short (`type.name`) addresses for reference matching.
        let mut lookup: HashMap<String, String> = HashMap::new();
        for (address, node) in &graph.nodes {
            lookup.insert(address.clone(), address.clone());
            lookup.insert(node.resource.short_address(), address.clone());
        }

        let mut edges = Vec::new();
        for (address, node) in &graph.nodes {
            let mut refs: Vec<String> = Vec::new();
            scan_for_references(&node.resource.attributes, &lookup, &mut refs);
            refs.sort();
            refs.dedup();
            for target in refs {
                if &target == address {
                    continue;
                }
                edges.push((address.clone(), target));
            }
        }
        edges
    }
}

fn scan_for_references(value: &Value, lookup: &HashMap<String, String>, refs: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for (partial, full) in lookup {
                if s.contains(partial.as_str()) {
                    refs.push(full.clone());
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                scan_for_references(item, lookup, refs);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                scan_for_references(item, lookup, refs);
            }
        }
        _ => {}
    }
}
