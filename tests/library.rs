use anyhow::Result;
use jsonmap::layout::{NODE_HEIGHT, NODE_SEPARATION, NODE_WIDTH, RANK_SEPARATION};
use jsonmap::{
    BuildOutcome, DecodedValue, Direction, Format, Graph, GraphSession, Language, LayoutConfig,
};
use serde_json::{Value, json};

const STORE: &str = include_str!("fixtures/store.json");
const CONFIG: &str = include_str!("fixtures/config.yaml");

#[test]
fn document_becomes_laid_out_tree() -> Result<()> {
    let value = jsonmap::parse(STORE, Format::Json)?;
    let layout = Graph::build(&value).into_layout(Direction::TopDown, &LayoutConfig::default())?;
    let graph = &layout.graph;

    assert_eq!(graph.nodes.len(), 19);
    assert_eq!(graph.edges.len(), 18);
    assert_eq!(graph.nodes[0].id, jsonmap::ROOT_ID);
    assert_eq!(graph.node("n_2").map(|n| n.label.as_str()), Some("book []"));
    assert_eq!(
        graph.node("n_5").map(|n| n.label.as_str()),
        Some("author: Nigel Rees")
    );

    let rank_step = NODE_HEIGHT + RANK_SEPARATION;
    for edge in &graph.edges {
        let source = graph.node(&edge.source).and_then(|n| n.position);
        let target = graph.node(&edge.target).and_then(|n| n.position);
        let (Some(source), Some(target)) = (source, target) else {
            panic!("edge {} has an unplaced endpoint", edge.id);
        };
        assert_eq!(target.y - source.y, rank_step, "edge {}", edge.id);
        assert!(edge.points.len() >= 2);
    }

    // Nodes sharing a rank never overlap.
    let mut by_rank: Vec<(f32, f32)> = graph
        .nodes
        .iter()
        .filter_map(|n| n.position.map(|p| (p.y, p.x)))
        .collect();
    by_rank.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for pair in by_rank.windows(2) {
        if pair[0].0 == pair[1].0 {
            assert!(pair[1].1 - pair[0].1 >= NODE_WIDTH + NODE_SEPARATION - f32::EPSILON);
        }
    }
    Ok(())
}

#[test]
fn toggling_a_subtree_twice_restores_it() -> Result<()> {
    let value = jsonmap::parse(STORE, Format::Json)?;
    let mut graph = Graph::build(&value);
    graph.layout(Direction::LeftRight)?;
    let original = graph.clone();

    let collapsed = graph.toggle("n_2");
    assert!(collapsed.collapsed);
    assert_eq!(collapsed.descendants.len(), 10);
    assert_eq!(graph.visible_nodes().count(), 9);
    assert!(graph.visible_edges().all(|e| !collapsed.descendants.contains(&e.target)));

    let expanded = graph.toggle("n_2");
    assert!(!expanded.collapsed);
    assert_eq!(graph, original);

    assert!(graph.toggle("n_7").is_noop());
    assert!(graph.toggle("missing").is_noop());
    assert_eq!(graph, original);
    Ok(())
}

#[test]
fn session_keeps_last_good_graph() {
    let mut session = GraphSession::default();
    assert!(matches!(
        session.rebuild(CONFIG, Format::Yaml, Direction::LeftRight),
        BuildOutcome::Applied { node_count: 7, .. }
    ));
    assert!(matches!(
        session.rebuild("service: [", Format::Yaml, Direction::LeftRight),
        BuildOutcome::Failed { .. }
    ));
    assert_eq!(session.graph().map(|l| l.graph.nodes.len()), Some(7));
    assert!(session.last_error().is_some());
}

#[test]
fn formats_round_through_conversion() -> Result<()> {
    let toml = jsonmap::convert(CONFIG, Format::Yaml, Format::Toml)?;
    let back = jsonmap::parse(&toml, Format::Toml)?;
    assert_eq!(back, jsonmap::parse(CONFIG, Format::Yaml)?);

    let minified = jsonmap::minify(STORE, Format::Json)?;
    assert!(!minified.contains('\n'));
    assert_eq!(jsonmap::parse(&minified, Format::Json)?, jsonmap::parse(STORE, Format::Json)?);
    Ok(())
}

#[test]
fn queries_over_fixture() -> Result<()> {
    let value = jsonmap::parse(STORE, Format::Json)?;

    let prices = Value::from(jsonmap::run_jsonpath("$..price", &value)?);
    assert_eq!(prices, json!([8.95, 12.99, 19.95]));

    let titles = Value::from(jsonmap::run_jq(
        r#"[.store.book[] | select(.price > 10) | .title]"#,
        &value,
    )?);
    assert_eq!(titles, json!(["Sword of Honour"]));

    let err = jsonmap::run_jq(".store |", &value).unwrap_err();
    assert_eq!(err.kind(), "query");
    Ok(())
}

#[test]
fn schema_codegen_and_masking() -> Result<()> {
    let value = jsonmap::parse(STORE, Format::Json)?;

    let schema = jsonmap::infer_schema(&value);
    assert!(jsonmap::validate(&value, &schema)?.is_empty());
    let mock = jsonmap::mock_from_schema(&schema)?;
    assert!(jsonmap::validate(&mock, &schema)?.is_empty());

    let code = jsonmap::generate(&value, Language::Rust, "Inventory")?;
    assert!(code.contains("pub struct Inventory {"));
    assert!(code.contains("pub book: Vec<BookItem>,"));
    assert!(code.contains("#[serde(rename = \"apiToken\")]"));

    let masked = Value::from(jsonmap::anonymize(&value));
    assert_eq!(masked["owner"]["email"], "XXXX@example.com");
    assert_eq!(masked["owner"]["apiToken"], "********");
    assert_eq!(masked["store"]["book"][0]["author"], "Nigel Rees");
    Ok(())
}

#[test]
fn deserialized_values_keep_key_order() -> Result<()> {
    let value: DecodedValue = serde_json::from_str(r#"{"z": 1, "a": 2, "m": 3}"#)?;
    let graph = Graph::build(&value);
    let labels: Vec<&str> = graph.nodes.iter().skip(1).map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["z: 1", "a: 2", "m: 3"]);
    Ok(())
}
