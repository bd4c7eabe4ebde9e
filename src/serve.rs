use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::codegen::{self, DEFAULT_ROOT_NAME, Language};
use crate::error::JsonMapError;
use crate::formats::{self, Format};
use crate::layout::{Direction, GraphLayout, LayoutConfig};
use crate::query::{run_jq, run_jsonpath};
use crate::schema;
use crate::session::{BuildOutcome, GraphSession, build_layout};
use crate::settings::{SettingsConfig, SettingsStore};
use crate::toggle::ToggleOutcome;
use crate::tools;
use crate::transport;
use crate::value::DecodedValue;

/// Arguments for running the jsonmap HTTP API
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Document to build the initial graph from.
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5151)]
    pub port: u16,

    /// Layout direction for the initial graph.
    #[arg(short = 'd', long = "direction", default_value = "LR")]
    pub direction: Direction,

    /// Settings file (defaults to JSONMAP_SETTINGS_PATH or the user config dir).
    #[arg(long = "settings")]
    pub settings: Option<PathBuf>,
}

pub struct ServeState {
    session: RwLock<GraphSession>,
    settings: Mutex<SettingsStore>,
}

impl ServeState {
    pub fn new(session: GraphSession, settings: SettingsStore) -> Arc<Self> {
        Arc::new(Self {
            session: RwLock::new(session),
            settings: Mutex::new(settings),
        })
    }
}

/// Error body shared by every endpoint: `{"kind": .., "message": ..}`.
pub struct ApiError(JsonMapError);

impl From<JsonMapError> for ApiError {
    fn from(err: JsonMapError) -> Self {
        ApiError(err)
    }
}

fn status_for(err: &JsonMapError) -> StatusCode {
    match err {
        JsonMapError::Parse { .. }
        | JsonMapError::Conversion { .. }
        | JsonMapError::Query { .. }
        | JsonMapError::Schema(_)
        | JsonMapError::Unsupported { .. } => StatusCode::BAD_REQUEST,
        JsonMapError::InvalidGraphStructure(_) => StatusCode::UNPROCESSABLE_ENTITY,
        JsonMapError::Transport(_) => StatusCode::BAD_GATEWAY,
        JsonMapError::Io(_) | JsonMapError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(err: &JsonMapError) -> Value {
    json!({"kind": err.kind(), "message": err.to_string()})
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(error_body(&self.0))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn no_graph() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"kind": "not_found", "message": "no graph has been built yet"})),
    )
        .into_response()
}

fn join_error(err: tokio::task::JoinError) -> ApiError {
    ApiError(JsonMapError::Io(std::io::Error::other(err)))
}

pub fn router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/api/graph", get(get_graph).post(post_graph))
        .route("/api/graph/toggle/:id", post(post_toggle))
        .route("/api/parse", post(post_parse))
        .route("/api/convert", post(post_convert))
        .route("/api/minify", post(post_minify))
        .route("/api/query/jq", post(post_jq))
        .route("/api/query/jsonpath", post(post_jsonpath))
        .route("/api/schema/infer", post(post_schema_infer))
        .route("/api/schema/validate", post(post_schema_validate))
        .route("/api/schema/mock", post(post_schema_mock))
        .route("/api/codegen", post(post_codegen))
        .route("/api/anonymize", post(post_anonymize))
        .route("/api/jwt", post(post_jwt))
        .route("/api/fetch", post(post_fetch))
        .route("/api/settings/:key", get(get_setting).put(put_setting))
        .route("/api/recent", get(get_recent).post(post_recent))
        .with_state(state)
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let settings = match &args.settings {
        Some(path) => SettingsStore::open(path.clone()),
        None => SettingsStore::with_config(SettingsConfig::default()),
    }
    .context("failed to open settings store")?;

    let mut session = GraphSession::new(LayoutConfig::default());
    if let Some(path) = &args.input {
        let document = transport::open_file(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        if let BuildOutcome::Failed { error } =
            session.rebuild(&document.content, document.format, args.direction)
        {
            return Err(error).with_context(|| format!("failed to build '{}'", path.display()));
        }
    }

    let app = router(ServeState::new(session, settings)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    info!("jsonmap server listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct GraphRequest {
    text: String,
    #[serde(default)]
    format: Format,
    #[serde(default)]
    direction: Direction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphPayload {
    generation: u64,
    #[serde(flatten)]
    layout: GraphLayout,
}

async fn get_graph(State(state): State<Arc<ServeState>>) -> Response {
    let session = state.session.read().await;
    match session.graph() {
        Some(layout) => Json(GraphPayload {
            generation: session.generation(),
            layout: layout.clone(),
        })
        .into_response(),
        None => no_graph(),
    }
}

async fn post_graph(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<GraphRequest>,
) -> Response {
    let (ticket, config) = {
        let mut session = state.session.write().await;
        (session.begin_build(), *session.config())
    };

    let built = tokio::task::spawn_blocking(move || {
        build_layout(&request.text, request.format, request.direction, &config)
    })
    .await;
    let result = match built {
        Ok(result) => result,
        Err(join) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"kind": "internal", "message": join.to_string()})),
            )
                .into_response();
        }
    };

    let mut session = state.session.write().await;
    let outcome = session.apply(ticket, result);
    graph_response(&session, outcome)
}

fn graph_response(session: &GraphSession, outcome: BuildOutcome) -> Response {
    match outcome {
        BuildOutcome::Applied { generation, .. } => match session.graph() {
            Some(layout) => Json(GraphPayload {
                generation,
                layout: layout.clone(),
            })
            .into_response(),
            None => no_graph(),
        },
        BuildOutcome::Stale { generation } => (
            StatusCode::CONFLICT,
            Json(json!({
                "kind": "stale",
                "message": format!("build {generation} was superseded by a newer request"),
            })),
        )
            .into_response(),
        BuildOutcome::Failed { error } => {
            let mut body = error_body(&error);
            body["graph"] = json!(session.graph());
            (status_for(&error), Json(body)).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct TogglePayload {
    #[serde(flatten)]
    outcome: ToggleOutcome,
    graph: GraphLayout,
}

async fn post_toggle(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let mut session = state.session.write().await;
    if session.graph().is_none() {
        return no_graph();
    }
    let outcome = session.toggle(&id);
    match session.graph() {
        Some(layout) => Json(TogglePayload {
            outcome,
            graph: layout.clone(),
        })
        .into_response(),
        None => no_graph(),
    }
}

#[derive(Debug, Deserialize)]
struct TextRequest {
    text: String,
    #[serde(default)]
    format: Format,
}

#[derive(Debug, Deserialize)]
struct ConvertRequest {
    text: String,
    from: Format,
    to: Format,
}

#[derive(Debug, Serialize)]
struct OutputPayload {
    output: String,
}

async fn post_parse(Json(request): Json<TextRequest>) -> ApiResult<DecodedValue> {
    Ok(Json(formats::parse(&request.text, request.format)?))
}

async fn post_convert(Json(request): Json<ConvertRequest>) -> ApiResult<OutputPayload> {
    let output = formats::convert(&request.text, request.from, request.to)?;
    Ok(Json(OutputPayload { output }))
}

async fn post_minify(Json(request): Json<TextRequest>) -> ApiResult<OutputPayload> {
    let output = formats::minify(&request.text, request.format)?;
    Ok(Json(OutputPayload { output }))
}

#[derive(Debug, Deserialize)]
struct JqRequest {
    filter: String,
    input: DecodedValue,
}

#[derive(Debug, Deserialize)]
struct JsonPathRequest {
    path: String,
    input: DecodedValue,
}

async fn post_jq(Json(request): Json<JqRequest>) -> ApiResult<DecodedValue> {
    Ok(Json(run_jq(&request.filter, &request.input)?))
}

async fn post_jsonpath(Json(request): Json<JsonPathRequest>) -> ApiResult<DecodedValue> {
    Ok(Json(run_jsonpath(&request.path, &request.input)?))
}

#[derive(Debug, Deserialize)]
struct InputRequest {
    input: DecodedValue,
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    input: DecodedValue,
    schema: Value,
}

#[derive(Debug, Serialize)]
struct ValidationPayload {
    valid: bool,
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MockRequest {
    schema: Value,
}

async fn post_schema_infer(Json(request): Json<InputRequest>) -> Json<Value> {
    Json(schema::infer_schema(&request.input))
}

async fn post_schema_validate(Json(request): Json<ValidateRequest>) -> ApiResult<ValidationPayload> {
    let errors = schema::validate(&request.input, &request.schema)?;
    Ok(Json(ValidationPayload {
        valid: errors.is_empty(),
        errors,
    }))
}

async fn post_schema_mock(Json(request): Json<MockRequest>) -> ApiResult<DecodedValue> {
    Ok(Json(schema::mock_from_schema(&request.schema)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodegenRequest {
    input: DecodedValue,
    language: Language,
    #[serde(default)]
    root_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct CodePayload {
    language: Language,
    code: String,
}

async fn post_codegen(Json(request): Json<CodegenRequest>) -> ApiResult<CodePayload> {
    let root_name = request.root_name.as_deref().unwrap_or(DEFAULT_ROOT_NAME);
    let code = codegen::generate(&request.input, request.language, root_name)?;
    Ok(Json(CodePayload {
        language: request.language,
        code,
    }))
}

async fn post_anonymize(Json(request): Json<InputRequest>) -> Json<DecodedValue> {
    Json(tools::anonymize(&request.input))
}

#[derive(Debug, Deserialize)]
struct JwtRequest {
    token: String,
}

async fn post_jwt(Json(request): Json<JwtRequest>) -> ApiResult<DecodedValue> {
    Ok(Json(tools::decode_jwt(&request.token)?))
}

#[derive(Debug, Deserialize)]
struct FetchRequest {
    url: String,
}

#[derive(Debug, Serialize)]
struct FetchPayload {
    url: String,
    content: String,
}

async fn post_fetch(Json(request): Json<FetchRequest>) -> ApiResult<FetchPayload> {
    let content = transport::fetch_url(&request.url).await?;
    Ok(Json(FetchPayload {
        url: request.url,
        content,
    }))
}

async fn get_setting(
    State(state): State<Arc<ServeState>>,
    AxumPath(key): AxumPath<String>,
) -> Json<Value> {
    Json(state.settings.lock().await.get(&key))
}

async fn put_setting(
    State(state): State<Arc<ServeState>>,
    AxumPath(key): AxumPath<String>,
    Json(value): Json<Value>,
) -> std::result::Result<StatusCode, ApiError> {
    tokio::task::spawn_blocking(move || state.settings.blocking_lock().set(key, value))
        .await
        .map_err(join_error)??;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct RecentRequest {
    path: String,
}

async fn get_recent(State(state): State<Arc<ServeState>>) -> Json<Vec<String>> {
    Json(state.settings.lock().await.recent_files())
}

async fn post_recent(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<RecentRequest>,
) -> ApiResult<Vec<String>> {
    let recent = tokio::task::spawn_blocking(move || {
        state.settings.blocking_lock().add_recent_file(request.path)
    })
    .await
    .map_err(join_error)??;
    Ok(Json(recent))
}
