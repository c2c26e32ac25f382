//! REST API for the warehouse optimizer.
//!
//! Exposes the placement engine, the algorithm recommender and the session
//! store over HTTP. Uses Axum as the web framework and supports CORS.

use std::convert::Infallible;
use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::classifier::Category;
use crate::config::{ApiConfig, OptimizerConfig};
use crate::constraints::{ConstraintViolation, ViolationKind};
use crate::metrics::Metrics;
use crate::model::{ItemSpec, ValidationError, WarehouseEnvelope};
use crate::optimizer::{Algorithm, HybridTrial};
use crate::orchestrator::{
    Dimensions, EngineError, OptimizationRequest, OptimizationResult, PlacedItemReport,
    UnplacedItemReport, optimize_with_progress, resolve_algorithm,
};
use crate::recommender::{AlgorithmRecommender, Recommendation};
use crate::store::{ResultStore, SessionId, SessionRecord, StoreError};
use crate::types::Vec3;

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    optimizer_config: OptimizerConfig,
    recommender: Option<Arc<dyn AlgorithmRecommender>>,
    store: Option<Arc<dyn ResultStore>>,
}

impl ApiState {
    pub fn new(optimizer_config: OptimizerConfig) -> Self {
        Self {
            optimizer_config,
            recommender: None,
            store: None,
        }
    }

    pub fn with_recommender(mut self, recommender: Arc<dyn AlgorithmRecommender>) -> Self {
        self.recommender = Some(recommender);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>Warehouse Optimizer API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the optimization endpoints.
///
/// `algorithm` may be omitted or set to `"auto"` to use the recommender.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "warehouse": { "length": 10.0, "width": 10.0, "height": 5.0 },
        "items": [
            { "name": "Pallet Box", "length": 1.2, "width": 0.8, "height": 1.5,
              "quantity": 10, "weight": 500.0 }
        ],
        "algorithm": "bin_packing"
    })
)]
pub struct OptimizeRequest {
    pub warehouse: WarehouseEnvelope,
    pub items: Vec<ItemSpec>,
    #[serde(default)]
    #[schema(nullable = true, example = "bin_packing")]
    pub algorithm: Option<String>,
    /// Grid resolution in meters, overriding the server default
    #[serde(default)]
    #[schema(nullable = true)]
    pub resolution: Option<f64>,
}

/// Request structure for the recommendation endpoint.
#[derive(Deserialize, Clone, ToSchema)]
pub struct RecommendRequest {
    pub warehouse: WarehouseEnvelope,
    pub items: Vec<ItemSpec>,
}

/// Result of an optimization run plus its persistence outcome.
#[derive(Serialize, ToSchema)]
pub struct OptimizeResponse {
    /// Key for `GET /sessions/{id}`; absent when the run was not stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
    #[serde(flatten)]
    pub result: OptimizationResult,
}

/// One selectable strategy.
#[derive(Serialize, ToSchema)]
pub struct AlgorithmInfo {
    pub id: Algorithm,
    pub name: String,
    pub description: String,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn internal_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal error",
        details,
    )
}

fn engine_error(err: EngineError) -> Response {
    match err {
        EngineError::Validation(err) => validation_error(err.to_string()),
        EngineError::InvariantViolation(err) => internal_error(err.to_string()),
    }
}

fn validate_catalogue(
    warehouse: &WarehouseEnvelope,
    items: &[ItemSpec],
) -> Result<(), ValidationError> {
    warehouse.validate()?;
    items
        .iter()
        .enumerate()
        .try_for_each(|(index, item)| item.validate(index))
}

fn parse_optimize_request(
    state: &ApiState,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Result<OptimizationRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    if payload.items.is_empty() {
        return Err(validation_error("At least one item type must be specified"));
    }
    validate_catalogue(&payload.warehouse, &payload.items)
        .map_err(|err| validation_error(err.to_string()))?;

    let algorithm = resolve_algorithm(
        payload.algorithm.as_deref(),
        state.recommender.as_deref(),
        &payload.warehouse,
        &payload.items,
        state.optimizer_config.default_algorithm(),
    )
    .map_err(|err| validation_error(err.to_string()))?;

    let mut request = OptimizationRequest::new(payload.warehouse, payload.items, algorithm);
    request.resolution = payload.resolution;

    request
        .validate(&state.optimizer_config.engine_config())
        .map_err(|err| validation_error(err.to_string()))?;
    Ok(request)
}

/// Stores a finished run; failures are reported, never fatal.
fn persist(
    store: Option<&dyn ResultStore>,
    request: &OptimizationRequest,
    result: OptimizationResult,
) -> OptimizeResponse {
    let Some(store) = store else {
        return OptimizeResponse {
            session_id: None,
            persistence_error: None,
            result,
        };
    };

    match store.save(SessionRecord {
        request,
        result: &result,
    }) {
        Ok(id) => {
            info!(session_id = %id, "Stored optimization session");
            OptimizeResponse {
                session_id: Some(id.to_string()),
                persistence_error: None,
                result,
            }
        }
        Err(err) => {
            warn!(error = %err, "Could not store optimization session");
            OptimizeResponse {
                session_id: None,
                persistence_error: Some(err.to_string()),
                result,
            }
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_optimize,
        handle_optimize_stream,
        handle_recommend,
        handle_algorithms,
        handle_session
    ),
    components(
        schemas(
            OptimizeRequest,
            OptimizeResponse,
            RecommendRequest,
            Recommendation,
            AlgorithmInfo,
            Algorithm,
            HybridTrial,
            OptimizationResult,
            PlacedItemReport,
            UnplacedItemReport,
            Dimensions,
            Metrics,
            ConstraintViolation,
            ViolationKind,
            Category,
            WarehouseEnvelope,
            ItemSpec,
            Vec3,
            ErrorResponse
        )
    ),
    tags((name = "warehouse", description = "Endpoints for warehouse layout optimization"))
)]
struct ApiDoc;

/// Builds the router with all endpoints.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/optimize", post(handle_optimize))
        .route("/optimize_stream", post(handle_optimize_stream))
        .route("/recommend", post(handle_recommend))
        .route("/algorithms", get(handle_algorithms))
        .route("/sessions/{id}", get(handle_session))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
///
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, state: ApiState) -> std::io::Result<()> {
    let app = router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("Local access: http://localhost:{}", config.port());
    }
    info!(
        endpoints = "POST /optimize, POST /optimize_stream, POST /recommend, GET /algorithms, GET /sessions/{id}",
        docs = "GET /docs, GET /docs/openapi.json",
        "Routes registered"
    );

    axum::serve(listener, app).await
}

/// Handler for POST /optimize.
///
/// Runs the chosen strategy and returns the placement plan with metrics.
/// The run executes on the blocking thread pool.
#[utoipa::path(
    post,
    path = "/optimize",
    request_body = OptimizeRequest,
    responses(
        (status = 200, description = "Optimization finished", body = OptimizeResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request",
            body = ErrorResponse
        ),
        (
            status = INTERNAL_SERVER_ERROR,
            description = "The engine detected an internal inconsistency",
            body = ErrorResponse
        )
    ),
    tag = "warehouse"
)]
async fn handle_optimize(
    State(state): State<ApiState>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Response {
    let request = match parse_optimize_request(&state, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        algorithm = %request.algorithm,
        item_types = request.items.len(),
        instances = request.instance_count(),
        "New optimization request"
    );

    let engine_config = state.optimizer_config.engine_config();
    let store = state.store.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        optimize_with_progress(&request, &engine_config, |_| {})
            .map(|result| persist(store.as_deref(), &request, result))
    })
    .await;

    match outcome {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Err(err)) => engine_error(err),
        Err(err) => {
            error!(error = %err, "Optimization task failed");
            internal_error(err.to_string())
        }
    }
}

/// Handler for POST /optimize_stream (SSE).
///
/// Streams placement events as Server-Sent Events (text/event-stream). After
/// the final `Finished` event a `result` event carries the complete response.
#[utoipa::path(
    post,
    path = "/optimize_stream",
    request_body = OptimizeRequest,
    responses(
        (
            status = 200,
            description = "Streams placement events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request",
            body = ErrorResponse
        )
    ),
    tag = "warehouse"
)]
async fn handle_optimize_stream(
    State(state): State<ApiState>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Response {
    let request = match parse_optimize_request(&state, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<Event>(32);
    let engine_config = state.optimizer_config.engine_config();
    let store = state.store.clone();

    tokio::task::spawn_blocking(move || {
        let outcome = optimize_with_progress(&request, &engine_config, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver discards the remaining events.
                let _ = tx.blocking_send(Event::default().data(json));
            }
        });

        let final_event = match outcome {
            Ok(result) => {
                let response = persist(store.as_deref(), &request, result);
                serde_json::to_string(&response)
                    .map(|json| Event::default().event("result").data(json))
            }
            Err(err) => {
                warn!(error = %err, "Streamed optimization failed");
                serde_json::to_string(&ErrorResponse::new("Optimization failed", err.to_string()))
                    .map(|json| Event::default().event("error").data(json))
            }
        };
        if let Ok(event) = final_event {
            let _ = tx.blocking_send(event);
        }
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /recommend.
#[utoipa::path(
    post,
    path = "/recommend",
    request_body = RecommendRequest,
    responses(
        (status = 200, description = "Recommended algorithm", body = Recommendation),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or not enough data",
            body = ErrorResponse
        ),
        (
            status = SERVICE_UNAVAILABLE,
            description = "No recommender configured",
            body = ErrorResponse
        )
    ),
    tag = "warehouse"
)]
async fn handle_recommend(
    State(state): State<ApiState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    if let Err(err) = validate_catalogue(&payload.warehouse, &payload.items) {
        return validation_error(err.to_string());
    }

    let Some(recommender) = state.recommender.as_deref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Recommender unavailable",
            "No algorithm recommender is configured",
        );
    };

    match recommender.recommend(&payload.warehouse, &payload.items) {
        Ok(recommendation) => (StatusCode::OK, Json(recommendation)).into_response(),
        Err(err) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "No recommendation",
            err.to_string(),
        ),
    }
}

/// Handler for GET /algorithms.
#[utoipa::path(
    get,
    path = "/algorithms",
    responses((status = 200, description = "Available strategies", body = [AlgorithmInfo])),
    tag = "warehouse"
)]
async fn handle_algorithms() -> Json<Vec<AlgorithmInfo>> {
    Json(
        Algorithm::ALL
            .into_iter()
            .map(|algorithm| AlgorithmInfo {
                id: algorithm,
                name: algorithm.display_name().to_string(),
                description: algorithm.description().to_string(),
            })
            .collect(),
    )
}

/// Handler for GET /sessions/{id}.
///
/// Returns the stored bytes of a run unchanged.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = String, Path, description = "Session id returned by /optimize")),
    responses(
        (status = 200, description = "Stored session", content_type = "application/json", body = String),
        (status = NOT_FOUND, description = "Unknown session", body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Stored data is unreadable", body = ErrorResponse)
    ),
    tag = "warehouse"
)]
async fn handle_session(State(state): State<ApiState>, Path(raw_id): Path<String>) -> Response {
    let Some(store) = state.store.clone() else {
        return error_response(
            StatusCode::NOT_FOUND,
            "Session not found",
            "Result persistence is disabled",
        );
    };
    let id = match SessionId::parse(&raw_id) {
        Ok(id) => id,
        Err(err) => return error_response(StatusCode::NOT_FOUND, "Session not found", err.to_string()),
    };

    match tokio::task::spawn_blocking(move || store.load(&id)).await {
        Ok(Ok(bytes)) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Ok(Err(err @ StoreError::NotFound(_))) => {
            error_response(StatusCode::NOT_FOUND, "Session not found", err.to_string())
        }
        Ok(Err(err)) => {
            error!(session_id = %raw_id, error = %err, "Could not load session");
            internal_error(err.to_string())
        }
        Err(err) => internal_error(err.to_string()),
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
