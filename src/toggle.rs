use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::graph::{Graph, GraphEdge, GraphNode};

/// Result of a collapse/expand action on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub node_id: String,
    pub descendants: Vec<String>,
    /// `true` when the descendants were hidden, `false` when revealed.
    pub collapsed: bool,
}

impl ToggleOutcome {
    pub fn is_noop(&self) -> bool {
        self.descendants.is_empty()
    }
}

/// Every node id reachable from `node_id` by following edges forward, in
/// discovery order. The start node is never part of the result, even when
/// a cycle leads back to it.
pub fn descendants(node_id: &str, edges: &[GraphEdge]) -> Vec<String> {
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        successors
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(node_id);
    let mut found = Vec::new();
    let mut stack: Vec<&str> = Vec::new();
    if let Some(children) = successors.get(node_id) {
        stack.extend(children.iter().rev());
    }

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        found.push(current.to_string());
        if let Some(children) = successors.get(current) {
            stack.extend(children.iter().rev());
        }
    }

    found
}

/// Collapses the subtree under `node_id` if any part of it is visible,
/// otherwise expands all of it. Applying it twice restores the previous
/// visibility. Leaves and unknown ids leave the graph untouched.
pub fn toggle_descendants(
    node_id: &str,
    nodes: &mut [GraphNode],
    edges: &mut [GraphEdge],
) -> ToggleOutcome {
    let found = descendants(node_id, edges);
    if found.is_empty() {
        debug!(node = node_id, "toggle on node without descendants");
        return ToggleOutcome {
            node_id: node_id.to_string(),
            descendants: found,
            collapsed: false,
        };
    }

    let members: HashSet<&str> = found.iter().map(String::as_str).collect();
    let currently_expanded = nodes
        .iter()
        .any(|node| members.contains(node.id.as_str()) && !node.hidden);
    let hide = currently_expanded;

    for node in nodes.iter_mut() {
        if members.contains(node.id.as_str()) {
            node.hidden = hide;
        }
    }

    for edge in edges.iter_mut() {
        let source_inside = members.contains(edge.source.as_str());
        let target_inside = members.contains(edge.target.as_str());
        if source_inside || target_inside {
            edge.hidden = (target_inside && hide) || (source_inside && hide);
        }
    }

    debug!(
        node = node_id,
        descendants = found.len(),
        collapsed = hide,
        "toggled subtree"
    );

    ToggleOutcome {
        node_id: node_id.to_string(),
        descendants: found,
        collapsed: hide,
    }
}

impl Graph {
    pub fn descendants(&self, node_id: &str) -> Vec<String> {
        descendants(node_id, &self.edges)
    }

    pub fn toggle(&mut self, node_id: &str) -> ToggleOutcome {
        toggle_descendants(node_id, &mut self.nodes, &mut self.edges)
    }
}
