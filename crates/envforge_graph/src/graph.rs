//! The ordered resource graph.

use std::collections::HashMap;

use envforge_manifest::{ResourceDescriptor, ResourceId, Tier};

use crate::error::{GraphError, GraphResult};

/// A resource together with the resources it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub descriptor: ResourceDescriptor,
    pub depends_on: Vec<ResourceId>,
}

impl GraphNode {
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            depends_on: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, id: ResourceId) -> Self {
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    pub fn id(&self) -> ResourceId {
        self.descriptor.id()
    }

    pub fn tier(&self) -> Tier {
        self.descriptor.tier()
    }
}

/// Resources of one environment in apply order.
///
/// Tiers never decrease along the nodes. Identities are unique and every
/// dependency precedes its dependent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGraph {
    environment: String,
    nodes: Vec<GraphNode>,
    index: HashMap<ResourceId, usize>,
}

impl ResourceGraph {
    /// Assemble a graph, rejecting nodes that break apply order.
    pub fn new(environment: impl Into<String>, nodes: Vec<GraphNode>) -> GraphResult<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut previous: Option<Tier> = None;

        for (position, node) in nodes.iter().enumerate() {
            let id = node.id();
            let tier = node.tier();

            if let Some(prev) = previous {
                if tier < prev {
                    return Err(GraphError::OutOfOrder {
                        resource: id.to_string(),
                        tier: tier.to_string(),
                        previous: prev.to_string(),
                    });
                }
            }
            previous = Some(tier);

            for dep in &node.depends_on {
                if !index.contains_key(dep) {
                    return Err(GraphError::DependencyNotBefore {
                        resource: id.to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }

            if index.insert(id.clone(), position).is_some() {
                return Err(GraphError::DuplicateResource(id.to_string()));
            }
        }

        Ok(Self {
            environment: environment.into(),
            nodes,
            index,
        })
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        self.nodes.iter().map(GraphNode::id).collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.nodes.iter().map(|n| &n.descriptor)
    }

    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&GraphNode> {
        self.position(id).map(|i| &self.nodes[i])
    }

    /// Node positions grouped into dispatch batches.
    ///
    /// Batches follow tier order. A tier is split further when one of its
    /// nodes depends on another node of the same tier, so that every node's
    /// dependencies sit in an earlier batch.
    pub fn batches(&self) -> Vec<Vec<usize>> {
        let mut batches: Vec<Vec<usize>> = Vec::new();
        let mut level = vec![0usize; self.nodes.len()];
        let mut tier_start = 0;

        while tier_start < self.nodes.len() {
            let tier = self.nodes[tier_start].tier();
            let tier_end = self.nodes[tier_start..]
                .iter()
                .position(|n| n.tier() != tier)
                .map_or(self.nodes.len(), |offset| tier_start + offset);

            let mut tier_batches: Vec<Vec<usize>> = Vec::new();
            for position in tier_start..tier_end {
                let depth = self.nodes[position]
                    .depends_on
                    .iter()
                    .filter_map(|dep| self.position(dep))
                    .filter(|&dep| dep >= tier_start)
                    .map(|dep| level[dep] + 1)
                    .max()
                    .unwrap_or(0);
                level[position] = depth;
                if tier_batches.len() <= depth {
                    tier_batches.resize_with(depth + 1, Vec::new);
                }
                tier_batches[depth].push(position);
            }

            batches.extend(tier_batches);
            tier_start = tier_end;
        }

        batches
    }
}
