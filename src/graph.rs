use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::value::{DecodedValue, NodeKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub value: DecodedValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub const ROOT_ID: &str = "n_0";

pub fn edge_identifier(source: &str, target: &str) -> String {
    format!("e_{source}-{target}")
}

/// Materializes `value` as a tree of nodes and parent-to-child edges.
///
/// Nodes are emitted in pre-order; ids count up from `n_0` for every call,
/// so ids from different builds must never be mixed.
pub fn build(value: &DecodedValue) -> Graph {
    let mut builder = GraphBuilder::default();
    builder.walk(value);
    debug!(
        nodes = builder.graph.nodes.len(),
        edges = builder.graph.edges.len(),
        "built graph"
    );
    builder.graph
}

#[derive(Default)]
struct GraphBuilder {
    counter: usize,
    graph: Graph,
}

struct Visit<'a> {
    value: &'a DecodedValue,
    parent: Option<String>,
    label: Option<String>,
}

impl GraphBuilder {
    fn next_id(&mut self) -> String {
        let id = format!("n_{}", self.counter);
        self.counter += 1;
        id
    }

    // Explicit stack so very deep documents cannot exhaust the call stack.
    // Children are pushed in reverse to keep pre-order numbering.
    fn walk(&mut self, root: &DecodedValue) {
        let mut stack = vec![Visit {
            value: root,
            parent: None,
            label: None,
        }];

        while let Some(Visit {
            value,
            parent,
            label,
        }) = stack.pop()
        {
            let id = self.next_id();
            let kind = NodeKind::of(value);

            self.graph.nodes.push(GraphNode {
                id: id.clone(),
                kind,
                label: display_label(value, kind, label.as_deref()),
                value: value.clone(),
                position: None,
                hidden: false,
            });

            if let Some(parent_id) = parent {
                self.graph.edges.push(GraphEdge {
                    id: edge_identifier(&parent_id, &id),
                    source: parent_id,
                    target: id.clone(),
                    hidden: false,
                    points: Vec::new(),
                });
            }

            match value {
                DecodedValue::Mapping(map) => {
                    let children: Vec<_> = map.iter().collect();
                    for (key, child) in children.into_iter().rev() {
                        stack.push(Visit {
                            value: child,
                            parent: Some(id.clone()),
                            label: Some(key.clone()),
                        });
                    }
                }
                DecodedValue::Sequence(items) => {
                    for (index, child) in items.iter().enumerate().rev() {
                        stack.push(Visit {
                            value: child,
                            parent: Some(id.clone()),
                            label: Some(format!("[{index}]")),
                        });
                    }
                }
                _ => {}
            }
        }
    }
}

/// An empty key counts as no label at all.
fn display_label(value: &DecodedValue, kind: NodeKind, label: Option<&str>) -> String {
    match (kind, label.filter(|label| !label.is_empty())) {
        (NodeKind::Object, Some(label)) => label.to_string(),
        (NodeKind::Object, None) => "{}".to_string(),
        (NodeKind::Array, Some(label)) => format!("{label} []"),
        (NodeKind::Array, None) => "[]".to_string(),
        (NodeKind::Scalar | NodeKind::Null, Some(label)) => {
            format!("{label}: {}", value.stringified())
        }
        (NodeKind::Scalar | NodeKind::Null, None) => value.stringified(),
    }
}

impl Graph {
    pub fn build(value: &DecodedValue) -> Self {
        build(value)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|node| !node.hidden)
    }

    pub fn visible_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(|edge| !edge.hidden)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn sample() -> DecodedValue {
        DecodedValue::from(json!({"a": 1, "b": [true, null]}))
    }

    #[test]
    fn builds_sample_document_in_preorder() {
        let graph = build(&sample());

        let summary: Vec<(&str, NodeKind, &str)> = graph
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node.kind, node.label.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("n_0", NodeKind::Object, "{}"),
                ("n_1", NodeKind::Scalar, "a: 1"),
                ("n_2", NodeKind::Array, "b []"),
                ("n_3", NodeKind::Scalar, "[0]: true"),
                ("n_4", NodeKind::Null, "[1]: null"),
            ]
        );

        let edges: Vec<(&str, &str, &str)> = graph
            .edges
            .iter()
            .map(|edge| (edge.id.as_str(), edge.source.as_str(), edge.target.as_str()))
            .collect();
        assert_eq!(
            edges,
            vec![
                ("e_n_0-n_1", "n_0", "n_1"),
                ("e_n_0-n_2", "n_0", "n_2"),
                ("e_n_2-n_3", "n_2", "n_3"),
                ("e_n_2-n_4", "n_2", "n_4"),
            ]
        );
    }

    #[test]
    fn empty_array_is_a_single_node() {
        let graph = build(&DecodedValue::Sequence(vec![]));
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].label, "[]");
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn root_scalar_label_is_its_value() {
        let graph = build(&DecodedValue::String("plain".into()));
        assert_eq!(graph.nodes[0].label, "plain");
        assert_eq!(graph.nodes[0].kind, NodeKind::Scalar);
    }

    #[test]
    fn nested_object_uses_key_as_label() {
        let graph = build(&DecodedValue::from(json!({"settings": {"theme": "dark"}})));
        assert_eq!(graph.nodes[1].label, "settings");
        assert_eq!(graph.nodes[2].label, "theme: dark");
    }

    #[test]
    fn empty_keys_label_like_unkeyed_values() {
        let graph = build(&DecodedValue::from(json!({"": 1, "x": {"": {}}, "y": {"": []}})));
        let labels: Vec<&str> = graph.nodes.iter().map(|node| node.label.as_str()).collect();
        assert_eq!(labels, vec!["{}", "1", "x", "{}", "y", "[]"]);
    }

    #[test]
    fn node_and_edge_counts_match_tree_size() {
        let value = DecodedValue::from(json!({
            "name": "JSONMap",
            "features": ["Visualization", "Editor", {"deep": [1, 2, [3]]}],
            "settings": {"theme": "dark", "autoSave": true, "extra": null}
        }));
        let graph = build(&value);

        assert_eq!(graph.nodes.len(), value.node_count());
        assert_eq!(graph.edges.len(), graph.nodes.len() - 1);

        let ids: HashSet<&str> = graph.nodes.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids.len(), graph.nodes.len());
        for edge in &graph.edges {
            assert!(ids.contains(edge.source.as_str()));
            assert!(ids.contains(edge.target.as_str()));
        }

        let targets: HashSet<&str> = graph.edges.iter().map(|edge| edge.target.as_str()).collect();
        assert_eq!(targets.len(), graph.edges.len());
        assert!(!targets.contains(ROOT_ID));
    }

    #[test]
    fn repeated_builds_are_identical() {
        let value = sample();
        assert_eq!(build(&value), build(&value));
    }

    #[test]
    fn node_retains_original_value() {
        let graph = build(&sample());
        assert_eq!(graph.nodes[2].value, DecodedValue::from(json!([true, null])));
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let mut value = json!(0);
        for _ in 0..1_000 {
            value = json!([value]);
        }
        let graph = build(&DecodedValue::from(value));
        assert_eq!(graph.nodes.len(), 1_001);
        assert_eq!(graph.nodes[1_000].label, "[0]: 0");
    }
}
