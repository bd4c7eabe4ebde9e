use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use tracing::debug;

use crate::error::{JsonMapError, Result};
use crate::graph::{Graph, GraphEdge, GraphNode, Point};

pub const NODE_WIDTH: f32 = 200.0;
pub const NODE_HEIGHT: f32 = 50.0;
pub const RANK_SEPARATION: f32 = 50.0;
pub const NODE_SEPARATION: f32 = 50.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "TD", alias = "TB")]
    TopDown,
    #[serde(rename = "BT")]
    BottomTop,
    #[default]
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "RL")]
    RightLeft,
}

impl Direction {
    pub fn as_token(&self) -> &'static str {
        match self {
            Direction::TopDown => "TD",
            Direction::BottomTop => "BT",
            Direction::LeftRight => "LR",
            Direction::RightLeft => "RL",
        }
    }

    fn is_vertical(&self) -> bool {
        matches!(self, Direction::TopDown | Direction::BottomTop)
    }

    fn is_reversed(&self) -> bool {
        matches!(self, Direction::BottomTop | Direction::RightLeft)
    }
}

impl FromStr for Direction {
    type Err = JsonMapError;

    fn from_str(token: &str) -> Result<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "TD" | "TB" => Ok(Direction::TopDown),
            "BT" => Ok(Direction::BottomTop),
            "LR" => Ok(Direction::LeftRight),
            "RL" => Ok(Direction::RightLeft),
            _ => Err(JsonMapError::Unsupported {
                kind: "layout direction",
                value: token.to_string(),
            }),
        }
    }
}

/// Fixed box reserved for every node, plus the gaps between ranks and
/// between neighbours inside a rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    pub rank_separation: f32,
    pub node_separation: f32,
    pub margin: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: NODE_WIDTH,
            node_height: NODE_HEIGHT,
            rank_separation: RANK_SEPARATION,
            node_separation: NODE_SEPARATION,
            margin: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

/// A built graph together with the geometry assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLayout {
    pub direction: Direction,
    pub size: CanvasSize,
    pub node_width: f32,
    pub node_height: f32,
    #[serde(flatten)]
    pub graph: Graph,
}

pub fn layout(
    nodes: &mut [GraphNode],
    edges: &mut [GraphEdge],
    direction: Direction,
) -> Result<CanvasSize> {
    layout_with(nodes, edges, direction, &LayoutConfig::default())
}

/// Assigns every node a top-left position and every edge a route.
///
/// Ranks are longest-path depths from the sources, so every edge advances
/// at least one rank. Inside a rank nodes follow the pre-order of their
/// spanning forest: leaves take consecutive slots and parents sit centred
/// over their first and last child, which keeps sibling subtrees on
/// disjoint slot ranges.
pub fn layout_with(
    nodes: &mut [GraphNode],
    edges: &mut [GraphEdge],
    direction: Direction,
    config: &LayoutConfig,
) -> Result<CanvasSize> {
    if nodes.is_empty() {
        return Ok(CanvasSize::default());
    }

    let forest = RankedForest::new(nodes, edges)?;
    let slots = forest.assign_slots();
    let max_rank = forest.ranks.iter().copied().max().unwrap_or(0);
    let slot_count = forest.leaf_count.max(1);

    let (rank_extent, slot_extent) = if direction.is_vertical() {
        (config.node_height, config.node_width)
    } else {
        (config.node_width, config.node_height)
    };
    let rank_step = rank_extent + config.rank_separation;
    let slot_step = slot_extent + config.node_separation;

    for (idx, node) in nodes.iter_mut().enumerate() {
        let rank = if direction.is_reversed() {
            max_rank - forest.ranks[idx]
        } else {
            forest.ranks[idx]
        };
        let along_rank = rank as f32 * rank_step;
        let across_rank = slots[idx] * slot_step;

        let (x, y) = if direction.is_vertical() {
            (across_rank, along_rank)
        } else {
            (along_rank, across_rank)
        };
        node.position = Some(Point {
            x: x + config.margin,
            y: y + config.margin,
        });
    }

    let positions: HashMap<&str, Point> = nodes
        .iter()
        .filter_map(|node| node.position.map(|point| (node.id.as_str(), point)))
        .collect();

    for edge in edges.iter_mut() {
        let (Some(&from), Some(&to)) = (
            positions.get(edge.source.as_str()),
            positions.get(edge.target.as_str()),
        ) else {
            continue;
        };
        edge.points = route_edge(from, to, direction, config);
    }

    let rank_span = (max_rank + 1) as f32 * rank_extent + max_rank as f32 * config.rank_separation;
    let slot_span = (slot_count - 1) as f32 * slot_step + slot_extent;
    let (width, height) = if direction.is_vertical() {
        (slot_span, rank_span)
    } else {
        (rank_span, slot_span)
    };

    let size = CanvasSize {
        width: width + config.margin * 2.0,
        height: height + config.margin * 2.0,
    };

    debug!(
        nodes = nodes.len(),
        ranks = max_rank + 1,
        slots = slot_count,
        width = size.width,
        height = size.height,
        direction = direction.as_token(),
        "laid out graph"
    );

    Ok(size)
}

/// Connects the source's trailing-edge midpoint to the target's
/// leading-edge midpoint, with an orthogonal elbow halfway between ranks
/// when the two are not aligned.
fn route_edge(from: Point, to: Point, direction: Direction, config: &LayoutConfig) -> Vec<Point> {
    let w = config.node_width;
    let h = config.node_height;

    let (start, end) = match direction {
        Direction::LeftRight => (
            Point { x: from.x + w, y: from.y + h / 2.0 },
            Point { x: to.x, y: to.y + h / 2.0 },
        ),
        Direction::RightLeft => (
            Point { x: from.x, y: from.y + h / 2.0 },
            Point { x: to.x + w, y: to.y + h / 2.0 },
        ),
        Direction::TopDown => (
            Point { x: from.x + w / 2.0, y: from.y + h },
            Point { x: to.x + w / 2.0, y: to.y },
        ),
        Direction::BottomTop => (
            Point { x: from.x + w / 2.0, y: from.y },
            Point { x: to.x + w / 2.0, y: to.y + h },
        ),
    };

    if direction.is_vertical() {
        if (start.x - end.x).abs() < f32::EPSILON {
            return vec![start, end];
        }
        let mid_y = (start.y + end.y) / 2.0;
        vec![
            start,
            Point { x: start.x, y: mid_y },
            Point { x: end.x, y: mid_y },
            end,
        ]
    } else {
        if (start.y - end.y).abs() < f32::EPSILON {
            return vec![start, end];
        }
        let mid_x = (start.x + end.x) / 2.0;
        vec![
            start,
            Point { x: mid_x, y: start.y },
            Point { x: mid_x, y: end.y },
            end,
        ]
    }
}

/// Index-based view of the graph: ranks, the spanning forest built from
/// each node's first incoming edge, and the forest's pre-order.
struct RankedForest {
    ranks: Vec<usize>,
    children: Vec<Vec<usize>>,
    preorder: Vec<usize>,
    leaf_count: usize,
}

impl RankedForest {
    fn new(nodes: &[GraphNode], edges: &[GraphEdge]) -> Result<Self> {
        let count = nodes.len();
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(count);
        for (idx, node) in nodes.iter().enumerate() {
            if index.insert(node.id.as_str(), idx).is_some() {
                return Err(JsonMapError::InvalidGraphStructure(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut indegree = vec![0_usize; count];
        let mut parent: Vec<Option<usize>> = vec![None; count];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];

        for edge in edges {
            let lookup = |id: &str| {
                index.get(id).copied().ok_or_else(|| {
                    JsonMapError::InvalidGraphStructure(format!(
                        "edge '{}' references unknown node '{id}'",
                        edge.id
                    ))
                })
            };
            let from = lookup(&edge.source)?;
            let to = lookup(&edge.target)?;
            if from == to {
                return Err(JsonMapError::InvalidGraphStructure(format!(
                    "edge '{}' is a self-loop",
                    edge.id
                )));
            }

            successors[from].push(to);
            indegree[to] += 1;
            if parent[to].is_none() {
                parent[to] = Some(from);
                children[from].push(to);
            }
        }

        let mut ranks = vec![0_usize; count];
        let mut queue: VecDeque<usize> = (0..count).filter(|&idx| indegree[idx] == 0).collect();
        let mut visited = 0_usize;

        while let Some(idx) = queue.pop_front() {
            visited += 1;
            for &next in &successors[idx] {
                ranks[next] = ranks[next].max(ranks[idx] + 1);
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if visited != count {
            return Err(JsonMapError::InvalidGraphStructure(format!(
                "cycle detected: {} of {count} nodes cannot be ranked",
                count - visited
            )));
        }

        let mut preorder = Vec::with_capacity(count);
        let mut stack: Vec<usize> = (0..count)
            .filter(|&idx| parent[idx].is_none())
            .rev()
            .collect();
        while let Some(idx) = stack.pop() {
            preorder.push(idx);
            stack.extend(children[idx].iter().rev().copied());
        }

        let leaf_count = children.iter().filter(|kids| kids.is_empty()).count();

        Ok(Self {
            ranks,
            children,
            preorder,
            leaf_count,
        })
    }

    /// Slot index across the rank axis for every node.
    fn assign_slots(&self) -> Vec<f32> {
        let mut slots = vec![0.0_f32; self.ranks.len()];
        let mut next_leaf = 0.0_f32;

        for &idx in &self.preorder {
            if self.children[idx].is_empty() {
                slots[idx] = next_leaf;
                next_leaf += 1.0;
            }
        }

        for &idx in self.preorder.iter().rev() {
            let kids = &self.children[idx];
            if let (Some(&first), Some(&last)) = (kids.first(), kids.last()) {
                slots[idx] = (slots[first] + slots[last]) / 2.0;
            }
        }

        slots
    }
}

impl Graph {
    pub fn layout(&mut self, direction: Direction) -> Result<CanvasSize> {
        layout(&mut self.nodes, &mut self.edges, direction)
    }

    pub fn layout_with(&mut self, direction: Direction, config: &LayoutConfig) -> Result<CanvasSize> {
        layout_with(&mut self.nodes, &mut self.edges, direction, config)
    }

    pub fn into_layout(mut self, direction: Direction, config: &LayoutConfig) -> Result<GraphLayout> {
        let size = self.layout_with(direction, config)?;
        Ok(GraphLayout {
            direction,
            size,
            node_width: config.node_width,
            node_height: config.node_height,
            graph: self,
        })
    }
}
