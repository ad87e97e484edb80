//! PoB HTTP API
//!
//! Local REST API used by the trade-site browser extension: rune and amulet
//! enchant lookups from Path of Building's data files, and build loading and
//! item impact reports through a single headless Path of Building.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pob::{
    DataStore, EngineFactory, EngineGateway, HeadlessFactory, PobPaths, RuneSelection,
    DEFAULT_ENCHANT_LIMIT,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_scalar::{Scalar, Servable};

// =============================================================================
// App State
// =============================================================================

pub struct AppState {
    pub gateway: EngineGateway,
    pub store: DataStore,
}

impl AppState {
    /// State backed by a headless Path of Building child process.
    pub fn new(paths: &PobPaths) -> Self {
        Self::with_factory(paths, HeadlessFactory::new(paths))
    }

    pub fn with_factory(paths: &PobPaths, factory: impl EngineFactory + 'static) -> Self {
        AppState {
            gateway: EngineGateway::new(paths, factory),
            store: DataStore::new(paths),
        }
    }
}

// =============================================================================
// OpenAPI Schema
// =============================================================================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PoB HTTP API",
        description = "Local bridge between the trade site and Path of Building",
        version = "0.3.0",
        license(name = "BSD-2-Clause"),
    ),
    paths(health, status, load_pob, item_impact, runes, amulet_enchants),
    components(schemas(
        HealthResponse,
        StatusResponse,
        LoadRequest,
        LoadResponse,
        ImpactRequest,
        ImpactResponse,
        EnchantResponse,
        ErrorResponse,
    ))
)]
pub struct ApiDoc;

// =============================================================================
// Types
// =============================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// A Path of Building engine has been started
    pub running: bool,
    /// Why the engine cannot be started, if it cannot
    pub import_error: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoadRequest {
    /// Build file path or base64-encoded build XML; empty loads the default build
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoadResponse {
    pub status: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ImpactRequest {
    /// Item text as copied from the game
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub item: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImpactResponse {
    pub html: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RunesQuery {
    /// Comma-separated, case-insensitive slot names
    pub slot: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EnchantsQuery {
    /// Case-insensitive substring filter on the enchant text
    pub q: Option<String>,
    /// Maximum results; zero or negative returns everything
    #[param(default = 25)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnchantResponse {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn internal(detail: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl From<pob::Error> for ApiError {
    fn from(err: pob::Error) -> Self {
        let status = match &err {
            pob::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            pob::Error::EmptyResult(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{}", self.detail);
        }
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

/// Run a blocking library call off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> pob::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("Worker failed: {}", e)))?
        .map_err(ApiError::from)
}

// =============================================================================
// Handlers
// =============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
    tag = "System"
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[utoipa::path(
    get,
    path = "/status",
    responses((status = 200, description = "Engine state", body = StatusResponse)),
    tag = "System"
)]
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state.gateway.status();
    Json(StatusResponse {
        running: status.running,
        import_error: status.import_error,
    })
}

#[utoipa::path(
    post,
    path = "/load_pob",
    request_body = LoadRequest,
    responses(
        (status = 200, description = "Build loaded", body = LoadResponse),
        (status = 500, description = "Engine unavailable or load failed", body = ErrorResponse)
    ),
    tag = "Engine"
)]
async fn load_pob(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<LoadResponse>, ApiError> {
    let source = req.path.unwrap_or_default();
    blocking(move || state.gateway.load_build(&source)).await?;

    Ok(Json(LoadResponse {
        status: "ok".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/item-impact",
    request_body = ImpactRequest,
    responses(
        (status = 200, description = "Impact report", body = ImpactResponse),
        (status = 400, description = "Empty or invalid item text", body = ErrorResponse),
        (status = 422, description = "Engine produced no output", body = ErrorResponse),
        (status = 500, description = "Engine failure", body = ErrorResponse)
    ),
    tag = "Engine"
)]
async fn item_impact(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImpactRequest>,
) -> Result<Json<ImpactResponse>, ApiError> {
    // Anything but a JSON string is treated as missing.
    let item = match req.item {
        Some(serde_json::Value::String(text)) => Some(text),
        _ => None,
    };

    let html = blocking(move || state.gateway.evaluate_item_impact(item.as_deref())).await?;
    Ok(Json(ImpactResponse { html }))
}

#[utoipa::path(
    get,
    path = "/runes",
    params(RunesQuery),
    responses(
        (
            status = 200,
            description = "Sorted rune names for the given slots, or a slot -> runes map when no slot is given",
            body = Vec<String>
        ),
        (status = 500, description = "Rune file unreadable", body = ErrorResponse)
    ),
    tag = "Data"
)]
async fn runes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunesQuery>,
) -> Result<Json<RuneSelection>, ApiError> {
    let selection = blocking(move || state.store.runes(query.slot.as_deref())).await?;
    Ok(Json(selection))
}

#[utoipa::path(
    get,
    path = "/amulet-enchants",
    params(EnchantsQuery),
    responses(
        (
            status = 200,
            description = "Matching amulet enchants sorted by text",
            body = Vec<EnchantResponse>
        ),
        (status = 500, description = "Enchant file unreadable", body = ErrorResponse)
    ),
    tag = "Data"
)]
async fn amulet_enchants(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EnchantsQuery>,
) -> Result<Json<Vec<EnchantResponse>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ENCHANT_LIMIT);
    let records =
        blocking(move || state.store.amulet_enchants(query.q.as_deref(), Some(limit))).await?;

    Ok(Json(
        records
            .into_iter()
            .map(|record| EnchantResponse {
                id: record.id,
                text: record.text,
            })
            .collect(),
    ))
}

// =============================================================================
// Router
// =============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/load_pob", post(load_pob))
        .route("/item-impact", post(item_impact))
        .route("/runes", get(runes))
        .route("/amulet-enchants", get(amulet_enchants))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
