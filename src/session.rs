use tracing::{debug, info, warn};

use crate::error::{JsonMapError, Result};
use crate::formats::{Format, parse};
use crate::graph::Graph;
use crate::layout::{Direction, GraphLayout, LayoutConfig};
use crate::toggle::{ToggleOutcome, toggle_descendants};

/// Proof that a build was requested. Only the most recently issued ticket
/// may replace the session's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BuildTicket {
    generation: u64,
}

impl BuildTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub enum BuildOutcome {
    Applied {
        generation: u64,
        node_count: usize,
        edge_count: usize,
    },
    /// A newer build was requested while this one ran; its result was dropped.
    Stale { generation: u64 },
    /// The previous graph is still in place.
    Failed { error: JsonMapError },
}

/// Parses `text`, materializes the graph and lays it out. Pure, so it can
/// run outside any lock guarding a [`GraphSession`].
pub fn build_layout(
    text: &str,
    format: Format,
    direction: Direction,
    config: &LayoutConfig,
) -> Result<GraphLayout> {
    let value = parse(text, format)?;
    Graph::build(&value).into_layout(direction, config)
}

/// Holds the last successfully built graph and decides which build results
/// are allowed to replace it.
#[derive(Debug, Default)]
pub struct GraphSession {
    issued: u64,
    applied: u64,
    config: LayoutConfig,
    current: Option<GraphLayout>,
    last_error: Option<String>,
}

impl GraphSession {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn begin_build(&mut self) -> BuildTicket {
        self.issued += 1;
        BuildTicket {
            generation: self.issued,
        }
    }

    /// Builds from `text` and applies the result under `ticket`.
    pub fn complete(
        &mut self,
        ticket: BuildTicket,
        text: &str,
        format: Format,
        direction: Direction,
    ) -> BuildOutcome {
        if ticket.generation < self.issued {
            debug!(generation = ticket.generation, newest = self.issued, "skipping superseded build");
            return BuildOutcome::Stale {
                generation: ticket.generation,
            };
        }
        let result = build_layout(text, format, direction, &self.config);
        self.apply(ticket, result)
    }

    /// Installs a result computed elsewhere, unless a newer ticket was
    /// issued in the meantime. Failures keep the current graph.
    pub fn apply(&mut self, ticket: BuildTicket, result: Result<GraphLayout>) -> BuildOutcome {
        if ticket.generation < self.issued {
            debug!(generation = ticket.generation, newest = self.issued, "discarding stale build");
            return BuildOutcome::Stale {
                generation: ticket.generation,
            };
        }

        match result {
            Ok(layout) => {
                let node_count = layout.graph.nodes.len();
                let edge_count = layout.graph.edges.len();
                self.current = Some(layout);
                self.applied = ticket.generation;
                self.last_error = None;
                info!(generation = ticket.generation, node_count, edge_count, "graph updated");
                BuildOutcome::Applied {
                    generation: ticket.generation,
                    node_count,
                    edge_count,
                }
            }
            Err(error) => {
                warn!(generation = ticket.generation, %error, "build failed, keeping previous graph");
                self.last_error = Some(error.to_string());
                BuildOutcome::Failed { error }
            }
        }
    }

    pub fn rebuild(&mut self, text: &str, format: Format, direction: Direction) -> BuildOutcome {
        let ticket = self.begin_build();
        self.complete(ticket, text, format, direction)
    }

    /// Collapses or expands below `node_id` on the current graph. Without a
    /// graph this is a no-op.
    pub fn toggle(&mut self, node_id: &str) -> ToggleOutcome {
        match self.current.as_mut() {
            Some(layout) => layout.graph.toggle(node_id),
            None => toggle_descendants(node_id, &mut [], &mut []),
        }
    }

    pub fn graph(&self) -> Option<&GraphLayout> {
        self.current.as_ref()
    }

    /// Generation of the graph currently shown, zero before the first success.
    pub fn generation(&self) -> u64 {
        self.applied
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"a": {"b": 1}, "c": [true]}"#;

    #[test]
    fn successful_build_replaces_graph() {
        let mut session = GraphSession::default();
        let outcome = session.rebuild(DOC, Format::Json, Direction::TopDown);

        assert!(matches!(
            outcome,
            BuildOutcome::Applied { generation: 1, node_count: 5, edge_count: 4 }
        ));
        let layout = session.graph().unwrap();
        assert_eq!(layout.direction, Direction::TopDown);
        assert!(layout.graph.nodes.iter().all(|node| node.position.is_some()));
        assert_eq!(session.generation(), 1);
    }

    #[test]
    fn failed_build_keeps_last_good_graph() {
        let mut session = GraphSession::default();
        session.rebuild(DOC, Format::Json, Direction::LeftRight);
        let before = session.graph().cloned();

        let outcome = session.rebuild("{not json", Format::Json, Direction::LeftRight);
        match outcome {
            BuildOutcome::Failed { error } => assert_eq!(error.kind(), "parse"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(session.graph().cloned(), before);
        assert_eq!(session.generation(), 1);
        assert!(session.last_error().unwrap().contains("json"));

        session.rebuild("[1]", Format::Json, Direction::LeftRight);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn superseded_ticket_is_discarded() {
        let mut session = GraphSession::default();
        let older = session.begin_build();
        let newer = session.begin_build();

        let fresh = session.complete(newer, "[1, 2]", Format::Json, Direction::LeftRight);
        assert!(matches!(fresh, BuildOutcome::Applied { generation: 2, .. }));

        let stale = session.complete(older, DOC, Format::Json, Direction::LeftRight);
        assert!(matches!(stale, BuildOutcome::Stale { generation: 1 }));
        assert_eq!(session.graph().unwrap().graph.nodes.len(), 3);
    }

    #[test]
    fn result_computed_before_newer_request_is_dropped() {
        let mut session = GraphSession::default();
        let ticket = session.begin_build();
        let result = build_layout(DOC, Format::Json, Direction::LeftRight, session.config());
        session.begin_build();

        assert!(matches!(session.apply(ticket, result), BuildOutcome::Stale { .. }));
        assert!(session.graph().is_none());
    }

    #[test]
    fn toggle_acts_on_current_graph() {
        let mut session = GraphSession::default();
        assert!(session.toggle("n_0").is_noop());

        session.rebuild(DOC, Format::Json, Direction::LeftRight);
        let outcome = session.toggle("n_1");
        assert_eq!(outcome.descendants, vec!["n_2"]);
        assert!(outcome.collapsed);
        assert!(session.graph().unwrap().graph.node("n_2").unwrap().hidden);
    }
}
