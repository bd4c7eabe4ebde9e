use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use jsonmap::codegen::{self, DEFAULT_ROOT_NAME, Language};
use jsonmap::formats::{self, Format};
use jsonmap::layout::{Direction, LayoutConfig, NODE_HEIGHT, NODE_WIDTH};
use jsonmap::settings::{SettingsConfig, SettingsStore};
use jsonmap::{DecodedValue, Graph, schema, tools, transport};
use jsonmap::{run_jq, run_jsonpath};

#[cfg(feature = "server")]
use jsonmap::serve::{ServeArgs, run_serve};

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Parser)]
#[command(
    name = "jsonmap",
    version,
    about = "Turn structured documents into laid-out graphs, and query, convert and describe them."
)]
pub struct Cli {
    /// Only log warnings and errors.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the graph of a document and lay it out.
    Graph(GraphArgs),
    /// Build a graph, then collapse or expand the given nodes in order.
    Toggle(ToggleArgs),
    /// Re-render a document in another format.
    Convert(ConvertArgs),
    /// Strip insignificant whitespace.
    Minify(DocumentArgs),
    /// Run a jq filter over a document.
    Jq(QueryArgs),
    /// Select values from a document with a JSONPath expression.
    Jsonpath(QueryArgs),
    /// Infer, validate against, or sample from a JSON Schema.
    #[command(subcommand)]
    Schema(SchemaCommand),
    /// Generate type declarations matching a sample document.
    Codegen(CodegenArgs),
    /// Mask emails, secrets and personal fields.
    Anonymize(DocumentArgs),
    /// Decode the header and payload of a JSON Web Token.
    Jwt(JwtArgs),
    /// Download a remote document.
    Fetch(FetchArgs),
    /// List or extend the recent file list.
    Recent(RecentArgs),
    /// Start the HTTP API server.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DocumentArgs {
    /// Path to the input document. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Input format (defaults to the input file extension or json).
    #[arg(short = 'f', long = "format")]
    format: Option<Format>,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Emit JSON on a single line.
    #[arg(long = "compact", action = ArgAction::SetTrue)]
    compact: bool,
}

#[derive(Debug, Clone, Args)]
pub struct GraphArgs {
    #[command(flatten)]
    document: DocumentArgs,

    /// Direction ranks advance in: TD, BT, LR or RL.
    #[arg(short = 'd', long = "direction", default_value = "LR")]
    direction: Direction,

    /// Width of every node box.
    #[arg(long = "node-width", default_value_t = NODE_WIDTH)]
    node_width: f32,

    /// Height of every node box.
    #[arg(long = "node-height", default_value_t = NODE_HEIGHT)]
    node_height: f32,
}

#[derive(Debug, Clone, Args)]
pub struct ToggleArgs {
    #[command(flatten)]
    graph: GraphArgs,

    /// Node id to toggle; repeat to toggle several in order.
    #[arg(short = 'n', long = "node", required = true)]
    nodes: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ConvertArgs {
    #[command(flatten)]
    document: DocumentArgs,

    /// Target format.
    #[arg(short = 't', long = "to")]
    to: Format,
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Filter or path expression.
    expression: String,

    #[command(flatten)]
    document: DocumentArgs,
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// Describe a sample document as a JSON Schema.
    Infer(DocumentArgs),
    /// Check a document against a schema.
    Validate(ValidateArgs),
    /// Produce a sample document satisfying a schema.
    Mock(DocumentArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    document: DocumentArgs,

    /// Path to the JSON Schema.
    #[arg(short = 's', long = "schema")]
    schema: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct CodegenArgs {
    #[command(flatten)]
    document: DocumentArgs,

    /// Target language.
    #[arg(short = 'l', long = "language", value_enum)]
    language: Language,

    /// Name of the outermost type.
    #[arg(long = "root-name", default_value = DEFAULT_ROOT_NAME)]
    root_name: String,
}

#[derive(Debug, Clone, Args)]
pub struct JwtArgs {
    /// The encoded token.
    token: String,
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// URL to download.
    url: String,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RecentArgs {
    /// Record this path as the most recently opened file.
    #[arg(long = "add")]
    add: Option<String>,
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Command::Graph(args) => run_graph(args, &[], quiet),
        Command::Toggle(args) => run_graph(args.graph, &args.nodes, quiet),
        Command::Convert(args) => run_convert(args, quiet),
        Command::Minify(args) => {
            let (text, format) = load_document(&args)?;
            let output = formats::minify(&text, format)?;
            write_output(parse_output(args.output.as_deref())?, output.as_bytes(), quiet)
        }
        Command::Jq(args) => {
            let value = load_value(&args.document)?;
            let result = run_jq(&args.expression, &value)?;
            emit_json(&args.document, &result, quiet)
        }
        Command::Jsonpath(args) => {
            let value = load_value(&args.document)?;
            let result = run_jsonpath(&args.expression, &value)?;
            emit_json(&args.document, &result, quiet)
        }
        Command::Schema(command) => run_schema(command, quiet),
        Command::Codegen(args) => {
            let value = load_value(&args.document)?;
            let code = codegen::generate(&value, args.language, &args.root_name)?;
            write_output(parse_output(args.document.output.as_deref())?, code.as_bytes(), quiet)
        }
        Command::Anonymize(args) => {
            let value = load_value(&args)?;
            emit_json(&args, &tools::anonymize(&value), quiet)
        }
        Command::Jwt(args) => {
            let decoded = tools::decode_jwt(&args.token)?;
            write_output(OutputDestination::Stdout, render_json(&decoded, false)?.as_bytes(), quiet)
        }
        Command::Fetch(args) => {
            let content = transport::fetch_url(&args.url).await?;
            write_output(parse_output(args.output.as_deref())?, content.as_bytes(), quiet)
        }
        Command::Recent(args) => run_recent(args, quiet),
        #[cfg(feature = "server")]
        Command::Serve(args) => run_serve(args).await,
    }
}

fn run_graph(args: GraphArgs, toggles: &[String], quiet: bool) -> Result<()> {
    let value = load_value(&args.document)?;
    let config = LayoutConfig {
        node_width: args.node_width,
        node_height: args.node_height,
        ..LayoutConfig::default()
    };
    let mut layout = Graph::build(&value)
        .into_layout(args.direction, &config)
        .context("failed to lay out graph")?;

    for node in toggles {
        let outcome = layout.graph.toggle(node);
        if outcome.is_noop() && layout.graph.node(node).is_none() {
            tracing::warn!(node = %node, "no such node, toggle ignored");
        }
    }

    emit_json(&args.document, &layout, quiet)
}

fn run_convert(args: ConvertArgs, quiet: bool) -> Result<()> {
    let (text, format) = load_document(&args.document)?;
    let output = formats::convert(&text, format, args.to)?;
    write_output(parse_output(args.document.output.as_deref())?, output.as_bytes(), quiet)
}

fn run_schema(command: SchemaCommand, quiet: bool) -> Result<()> {
    match command {
        SchemaCommand::Infer(args) => {
            let value = load_value(&args)?;
            emit_json(&args, &schema::infer_schema(&value), quiet)
        }
        SchemaCommand::Validate(args) => {
            let value = load_value(&args.document)?;
            let schema_text = fs::read_to_string(&args.schema)
                .with_context(|| format!("failed to read '{}'", args.schema.display()))?;
            let schema_doc: serde_json::Value = serde_json::from_str(&schema_text)
                .with_context(|| format!("'{}' is not valid JSON", args.schema.display()))?;

            let violations = schema::validate(&value, &schema_doc)?;
            if violations.is_empty() {
                if !quiet {
                    println!("valid");
                }
                return Ok(());
            }
            for violation in &violations {
                eprintln!("{violation}");
            }
            bail!("document has {} schema violation(s)", violations.len())
        }
        SchemaCommand::Mock(args) => {
            let schema_doc = serde_json::Value::from(load_value(&args)?);
            let mock = schema::mock_from_schema(&schema_doc)?;
            emit_json(&args, &mock, quiet)
        }
    }
}

fn run_recent(args: RecentArgs, quiet: bool) -> Result<()> {
    let mut store = SettingsStore::with_config(SettingsConfig::default())
        .context("failed to open settings store")?;
    let recent = match args.add {
        Some(path) => store.add_recent_file(path)?,
        None => store.recent_files(),
    };
    let mut listing = recent.join("\n");
    if !listing.is_empty() {
        listing.push('\n');
    }
    write_output(OutputDestination::Stdout, listing.as_bytes(), quiet)
}

fn parse_input(input: Option<&str>) -> Result<InputSource> {
    match input {
        Some("-") | None => Ok(InputSource::Stdin),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                return Err(anyhow!("input file '{path_str}' does not exist"));
            }
            Ok(InputSource::File(path))
        }
    }
}

fn parse_output(output: Option<&str>) -> Result<OutputDestination> {
    match output {
        Some("-") | None => Ok(OutputDestination::Stdout),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(anyhow!(
                        "output directory '{}' does not exist",
                        parent.display()
                    ));
                }
            }
            Ok(OutputDestination::File(path))
        }
    }
}

fn load_document(args: &DocumentArgs) -> Result<(String, Format)> {
    match parse_input(args.input.as_deref())? {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            if buffer.trim().is_empty() {
                bail!("no document supplied on stdin");
            }
            Ok((buffer, args.format.unwrap_or_default()))
        }
        InputSource::File(path) => {
            let document = transport::open_file(&path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            if document.content.trim().is_empty() {
                bail!("input file '{}' was empty", path.display());
            }
            Ok((document.content, args.format.unwrap_or(document.format)))
        }
    }
}

fn load_value(args: &DocumentArgs) -> Result<DecodedValue> {
    let (text, format) = load_document(args)?;
    Ok(formats::parse(&text, format)?)
}

fn render_json(value: &impl Serialize, compact: bool) -> Result<String> {
    let mut text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    text.push('\n');
    Ok(text)
}

fn emit_json(args: &DocumentArgs, value: &impl Serialize, quiet: bool) -> Result<()> {
    let text = render_json(value, args.compact)?;
    write_output(parse_output(args.output.as_deref())?, text.as_bytes(), quiet)
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            if !quiet {
                println!("Wrote {} bytes -> {}", bytes.len(), path.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_standard_streams() {
        assert_eq!(parse_input(Some("-")).unwrap(), InputSource::Stdin);
        assert_eq!(parse_input(None).unwrap(), InputSource::Stdin);
        assert!(matches!(parse_output(Some("-")).unwrap(), OutputDestination::Stdout));
        assert!(parse_input(Some("/definitely/not/here.json")).is_err());
    }

    #[test]
    fn parses_toggle_invocation() {
        let cli = Cli::try_parse_from([
            "jsonmap", "toggle", "-i", "doc.json", "-d", "td", "-n", "n_1", "-n", "n_4",
        ])
        .unwrap();
        match cli.command {
            Command::Toggle(args) => {
                assert_eq!(args.nodes, vec!["n_1", "n_4"]);
                assert_eq!(args.graph.direction, Direction::TopDown);
                assert_eq!(args.graph.document.input.as_deref(), Some("doc.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn language_accepts_aliases() {
        let cli = Cli::try_parse_from(["jsonmap", "codegen", "-l", "ts"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Codegen(CodegenArgs { language: Language::TypeScript, .. })
        ));
        assert!(Cli::try_parse_from(["jsonmap", "codegen", "-l", "cobol"]).is_err());
    }
}
