//! Turn JSON, YAML, XML, TOML and CSV documents into laid-out node graphs,
//! and query, convert, describe and mask them along the way.
//!
//! ```no_run
//! use jsonmap::{Direction, Format, Graph, LayoutConfig};
//!
//! let value = jsonmap::parse(r#"{"user": {"name": "ann"}}"#, Format::Json)?;
//! let mut layout = Graph::build(&value).into_layout(Direction::TopDown, &LayoutConfig::default())?;
//! layout.graph.toggle("n_1");
//! # Ok::<(), jsonmap::JsonMapError>(())
//! ```

pub mod codegen;
pub mod error;
pub mod formats;
pub mod graph;
pub mod layout;
pub mod query;
pub mod schema;
#[cfg(feature = "server")]
pub mod serve;
pub mod session;
pub mod settings;
pub mod toggle;
pub mod tools;
pub mod transport;
pub mod value;

pub use codegen::{Language, generate};
pub use error::{JsonMapError, Result};
pub use formats::{Format, convert, detect_format, minify, parse};
pub use graph::{Graph, GraphEdge, GraphNode, Point, ROOT_ID, build};
pub use layout::{CanvasSize, Direction, GraphLayout, LayoutConfig, layout, layout_with};
pub use query::{JqFilter, JsonPath, run_jq, run_jsonpath};
pub use schema::{infer_schema, mock_from_schema, validate};
pub use session::{BuildOutcome, BuildTicket, GraphSession, build_layout};
pub use settings::SettingsStore;
pub use toggle::{ToggleOutcome, descendants, toggle_descendants};
pub use tools::{anonymize, decode_jwt};
pub use transport::{LoadedDocument, fetch_url, open_file, save_file};
pub use value::{DecodedValue, Mapping, NodeKind};
