//! HTTP API handlers with Axum and Utoipa.
//!
//! The HTTP layer is a thin adapter: parse inputs, pin a dataset handle,
//! call the engine, assemble the response. Queries run lock-free against
//! the pinned handle; only load/unload touch the registry lock.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::EngineError;
use crate::h3;
use crate::query::Algorithm;
use crate::registry::{Dataset, Registry};
use crate::spatial::IndexKind;

use super::geojson::{build_route_feature, path_length_meters, trim_feature};

/// Shared server state: the dataset registry plus the index mode new
/// datasets are built with.
pub struct AppState {
    pub registry: Registry,
    pub index_kind: IndexKind,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, load_dataset, unload_dataset, nearest_edges_get, route_get, route_by_edge),
    components(schemas(
        HealthResponse,
        LoadRequest,
        LoadResponse,
        UnloadRequest,
        UnloadResponse,
        NearestParams,
        NearestResponse,
        NearestEdge,
        RouteParams,
        RouteResponse,
        RouteBody,
        TimingBreakdown,
        DebugInfo,
        CellDebug,
        CellInfo,
        EdgeRouteRequest,
        ErrorResponse
    )),
    info(
        title = "Hexroute API",
        version = "1.0.0",
        description = "H3-hierarchical shortest-path queries over shortcut road graphs"
    )
)]
struct ApiDoc;

/// Build the Axum router with all endpoints and middleware layers.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route("/load_dataset", post(load_dataset))
        .route("/unload_dataset", post(unload_dataset))
        .route("/nearest_edges", get(nearest_edges_get).post(nearest_edges_post))
        .route("/route", get(route_get).post(route_post))
        .route("/route_by_edge", post(route_by_edge))
        .route("/boundary", get(boundary))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_request(msg: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: msg.into() }),
    )
        .into_response()
}

fn validate_coord(lat: f64, lng: f64, what: &str) -> Result<(), String> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(format!("{what} coordinate is not finite"));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(format!("{what} coordinate out of range"));
    }
    Ok(())
}

// ============ Health ============

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub datasets_loaded: Vec<String>,
}

/// Service health and loaded datasets
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        datasets_loaded: state.registry.list(),
    })
}

// ============ Load / unload ============

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoadRequest {
    /// Dataset name (`name` accepted as an alias)
    #[serde(alias = "name")]
    dataset: Option<String>,
    /// Embedded analytic database file with shortcuts + edges + info
    db_path: Option<String>,
    /// Shortcut Parquet file or directory
    shortcuts_path: Option<String>,
    /// Edge metadata CSV
    edges_path: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoadResponse {
    pub success: bool,
    pub dataset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Load (or replace) a named dataset
#[utoipa::path(
    post,
    path = "/load_dataset",
    request_body = LoadRequest,
    responses(
        (status = 200, description = "Dataset loaded", body = LoadResponse),
        (status = 400, description = "Missing parameters", body = ErrorResponse),
        (status = 500, description = "Load failed", body = LoadResponse),
    )
)]
async fn load_dataset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> Response {
    let name = req.dataset.unwrap_or_else(|| "default".to_string());

    if let Some(db_path) = req.db_path {
        return load_from_db(&state, &name, &db_path);
    }

    let (Some(shortcuts), Some(edges)) = (req.shortcuts_path, req.edges_path) else {
        return bad_request("db_path or shortcuts_path+edges_path required");
    };

    // Parsing blocks this worker; loads are expected to be rare and slow.
    let result = state.registry.load_from_files(
        &name,
        std::path::Path::new(&shortcuts),
        std::path::Path::new(&edges),
        state.index_kind,
    );

    match result {
        Ok(()) => Json(LoadResponse {
            success: true,
            dataset: name,
            source: Some("files".to_string()),
            error: None,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(LoadResponse {
                success: false,
                dataset: name,
                source: Some("files".to_string()),
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

#[cfg(feature = "duckdb")]
fn load_from_db(state: &AppState, name: &str, db_path: &str) -> Response {
    let result = state.registry.load_from_duckdb(
        name,
        std::path::Path::new(db_path),
        state.index_kind,
    );
    match result {
        Ok(()) => Json(LoadResponse {
            success: true,
            dataset: name.to_string(),
            source: Some("duckdb".to_string()),
            error: None,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(LoadResponse {
                success: false,
                dataset: name.to_string(),
                source: Some("duckdb".to_string()),
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

#[cfg(not(feature = "duckdb"))]
fn load_from_db(_state: &AppState, _name: &str, _db_path: &str) -> Response {
    bad_request("server built without duckdb support")
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UnloadRequest {
    #[serde(alias = "name")]
    dataset: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnloadResponse {
    pub success: bool,
    pub dataset: String,
    pub was_loaded: bool,
}

/// Unload a dataset and release its memory
#[utoipa::path(
    post,
    path = "/unload_dataset",
    request_body = UnloadRequest,
    responses(
        (status = 200, description = "Unload processed", body = UnloadResponse),
        (status = 400, description = "Missing dataset name", body = ErrorResponse),
    )
)]
async fn unload_dataset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UnloadRequest>,
) -> Response {
    let Some(name) = req.dataset.filter(|n| !n.is_empty()) else {
        return bad_request("dataset name required");
    };
    let was_loaded = state.registry.unload(&name);
    Json(UnloadResponse {
        success: true,
        dataset: name,
        was_loaded,
    })
    .into_response()
}

// ============ Nearest edges ============

fn default_dataset() -> String {
    "default".to_string()
}

fn default_k() -> usize {
    5
}

fn default_radius() -> f64 {
    500.0
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct NearestParams {
    #[serde(default = "default_dataset")]
    dataset: String,
    lat: f64,
    lon: f64,
    #[serde(default = "default_k")]
    k: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NearestEdge {
    pub edge_id: u32,
    pub distance: f64,
    pub cost: f64,
    pub length: f64,
    pub to_cell: u64,
    pub from_cell: u64,
    pub lca_res: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NearestResponse {
    pub dataset: String,
    pub lat: f64,
    pub lon: f64,
    pub k: usize,
    pub edges: Vec<NearestEdge>,
    pub index_type: String,
}

/// K nearest edges to a coordinate
#[utoipa::path(
    get,
    path = "/nearest_edges",
    params(NearestParams),
    responses(
        (status = 200, description = "Candidate edges", body = NearestResponse),
        (status = 400, description = "Bad coordinate", body = ErrorResponse),
        (status = 404, description = "Dataset not found", body = ErrorResponse),
    )
)]
async fn nearest_edges_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearestParams>,
) -> Response {
    handle_nearest(state, params)
}

async fn nearest_edges_post(
    State(state): State<Arc<AppState>>,
    Json(params): Json<NearestParams>,
) -> Response {
    handle_nearest(state, params)
}

fn handle_nearest(state: Arc<AppState>, params: NearestParams) -> Response {
    if let Err(e) = validate_coord(params.lat, params.lon, "query") {
        return bad_request(e);
    }
    let Some(dataset) = state.registry.get(&params.dataset) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: EngineError::DatasetNotFound(params.dataset).to_string(),
            }),
        )
            .into_response();
    };

    let found =
        dataset
            .graph
            .find_nearest_edges(params.lat, params.lon, params.k, default_radius());

    let edges = found
        .into_iter()
        .map(|(edge_id, distance)| {
            let meta = dataset.graph.edge_meta(edge_id);
            NearestEdge {
                edge_id,
                distance,
                cost: meta.map(|m| m.cost).unwrap_or(0.0),
                length: meta.map(|m| m.length).unwrap_or(0.0),
                to_cell: meta.map(|m| m.to_cell).unwrap_or(0),
                from_cell: meta.map(|m| m.from_cell).unwrap_or(0),
                lca_res: meta.map(|m| m.lca_res).unwrap_or(-1),
            }
        })
        .collect();

    Json(NearestResponse {
        dataset: dataset.name.clone(),
        lat: params.lat,
        lon: params.lon,
        k: params.k,
        edges,
        index_type: dataset
            .graph
            .index_kind()
            .map(|k| k.name().to_string())
            .unwrap_or_else(|| "none".to_string()),
    })
    .into_response()
}

// ============ Route ============

fn default_algorithm() -> String {
    "pruned".to_string()
}

fn default_mode() -> String {
    "knn".to_string()
}

fn default_expand() -> bool {
    true
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct RouteParams {
    #[serde(default = "default_dataset")]
    dataset: String,
    /// Start latitude (`source_lat` accepted as an alias)
    #[serde(alias = "source_lat")]
    start_lat: f64,
    #[serde(alias = "source_lon")]
    start_lng: f64,
    #[serde(alias = "target_lat")]
    end_lat: f64,
    #[serde(alias = "target_lon")]
    end_lng: f64,
    /// Candidate search mode: knn, radius, one_to_one, one_to_one_v2
    #[serde(default = "default_mode", alias = "search_mode")]
    mode: String,
    /// Candidate edges per endpoint
    #[serde(default = "default_k", alias = "max_candidates")]
    num_candidates: usize,
    /// Nearest-edge search radius in meters
    #[serde(default = "default_radius", alias = "radius")]
    search_radius: f64,
    /// classic, pruned, unidirectional, bidijkstra, dijkstra
    #[serde(default = "default_algorithm")]
    algorithm: String,
    /// Expand shortcuts into base edges and build geometry
    #[serde(default = "default_expand")]
    expand: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteBody {
    pub distance: f64,
    pub distance_meters: f64,
    pub runtime_ms: f64,
    /// Base-edge path; null when expansion was skipped
    pub path: Option<Vec<u32>>,
    pub shortcut_path: Vec<u32>,
    /// GeoJSON Feature<LineString>; null when expansion was skipped
    #[schema(value_type = Object)]
    pub geojson: Option<geojson::Feature>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimingBreakdown {
    pub find_nearest_us: f64,
    pub search_us: f64,
    pub expand_us: f64,
    pub geojson_us: f64,
    pub total_ms: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CellInfo {
    pub id: u64,
    pub res: i32,
    /// Closed boundary ring, [lon, lat] pairs
    #[schema(value_type = Vec<Vec<f64>>)]
    pub boundary: Vec<[f64; 2]>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CellDebug {
    pub source: Option<CellInfo>,
    pub target: Option<CellInfo>,
    pub high: Option<CellInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DebugInfo {
    pub cells: CellDebug,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_breakdown: Option<TimingBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_ms: Option<f64>,
}

fn build_cell_info(cell: u64) -> Option<CellInfo> {
    if cell == 0 {
        return None;
    }
    let boundary = h3::cell_boundary(cell)
        .into_iter()
        .map(|(lat, lon)| [lon, lat])
        .collect();
    Some(CellInfo {
        id: cell,
        res: h3::resolution(cell),
        boundary,
    })
}

/// Cell shown for an endpoint in the debug block: prefer `to_cell`, fall
/// back to `from_cell`, and reduce to the edge's `lca_res` (default 8).
fn resolve_debug_cell(dataset: &Dataset, edge: u32) -> u64 {
    let Some(meta) = dataset.graph.edge_meta(edge) else {
        return 0;
    };
    let cell = if meta.to_cell != 0 {
        meta.to_cell
    } else {
        meta.from_cell
    };
    let res = if meta.lca_res == -1 { 8 } else { meta.lca_res };
    if cell != 0 && h3::resolution(cell) > res {
        h3::parent(cell, res)
    } else {
        cell
    }
}

/// Route between two coordinates
#[utoipa::path(
    get,
    path = "/route",
    params(RouteParams),
    responses(
        (status = 200, description = "Route result (success flag inside)", body = RouteResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 503, description = "Dataset not loaded", body = RouteResponse),
    )
)]
async fn route_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RouteParams>,
) -> Response {
    handle_route(state, params)
}

async fn route_post(
    State(state): State<Arc<AppState>>,
    Json(params): Json<RouteParams>,
) -> Response {
    handle_route(state, params)
}

fn handle_route(state: Arc<AppState>, params: RouteParams) -> Response {
    let start_time = Instant::now();

    if let Err(e) = validate_coord(params.start_lat, params.start_lng, "start") {
        return bad_request(e);
    }
    if let Err(e) = validate_coord(params.end_lat, params.end_lng, "end") {
        return bad_request(e);
    }

    let Some(dataset) = state.registry.get(&params.dataset) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RouteResponse {
                success: false,
                dataset: None,
                route: None,
                timing_breakdown: None,
                debug: None,
                error: Some(EngineError::DatasetNotFound(params.dataset).to_string()),
                runtime_ms: None,
            }),
        )
            .into_response();
    };

    let t_nearest = Instant::now();
    let start_edges = dataset.graph.find_nearest_edges(
        params.start_lat,
        params.start_lng,
        params.num_candidates,
        params.search_radius,
    );
    let end_edges = dataset.graph.find_nearest_edges(
        params.end_lat,
        params.end_lng,
        params.num_candidates,
        params.search_radius,
    );
    let nearest_us = t_nearest.elapsed().as_secs_f64() * 1e6;

    if start_edges.is_empty() {
        return bad_request("No edges found near start");
    }
    if end_edges.is_empty() {
        return bad_request("No edges found near end");
    }

    let source_edge = start_edges[0].0;
    let target_edge = end_edges[0].0;

    let t_search = Instant::now();
    let result = if params.mode == "one_to_one" || params.mode == "one_to_one_v2" {
        let algorithm = match params.algorithm.as_str() {
            "dijkstra" => Algorithm::Dijkstra,
            "unidirectional" => Algorithm::Unidirectional,
            "bidijkstra" => Algorithm::BiDijkstra,
            "classic" if params.mode != "one_to_one_v2" => Algorithm::Classic,
            _ => Algorithm::Pruned,
        };
        dataset.graph.query(algorithm, source_edge, target_edge)
    } else {
        // knn / radius: route across all candidate pairs at once
        let sources: Vec<u32> = start_edges.iter().map(|&(e, _)| e).collect();
        let targets: Vec<u32> = end_edges.iter().map(|&(e, _)| e).collect();
        dataset.graph.query_multi(&sources, &targets)
    };
    let search_us = t_search.elapsed().as_secs_f64() * 1e6;

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            let status = match e {
                EngineError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::OK,
            };
            return (
                status,
                Json(RouteResponse {
                    success: false,
                    dataset: Some(dataset.name.clone()),
                    route: None,
                    timing_breakdown: None,
                    debug: None,
                    error: Some(e.to_string()),
                    runtime_ms: Some(start_time.elapsed().as_secs_f64() * 1e3),
                }),
            )
                .into_response();
        }
    };

    let src_cell = resolve_debug_cell(&dataset, source_edge);
    let tgt_cell = resolve_debug_cell(&dataset, target_edge);
    let high = dataset.graph.high_cell(source_edge, target_edge);

    let mut expanded: Option<Vec<u32>> = None;
    let mut feature = None;
    let mut distance_meters = 0.0;
    let mut expand_us = 0.0;
    let mut geojson_us = 0.0;

    if params.expand {
        let t_expand = Instant::now();
        let path = dataset.graph.expand_path(&result.path);
        expand_us = t_expand.elapsed().as_secs_f64() * 1e6;

        let t_geojson = Instant::now();
        feature = build_route_feature(&dataset.graph, &path);
        if let Some(f) = feature.as_mut() {
            trim_feature(
                f,
                params.start_lat,
                params.start_lng,
                params.end_lat,
                params.end_lng,
            );
        }
        geojson_us = t_geojson.elapsed().as_secs_f64() * 1e6;

        distance_meters = path_length_meters(&dataset.graph, &path);
        expanded = Some(path);
    }

    let runtime_ms = start_time.elapsed().as_secs_f64() * 1e3;

    Json(RouteResponse {
        success: true,
        dataset: Some(dataset.name.clone()),
        route: Some(RouteBody {
            distance: result.distance,
            distance_meters,
            runtime_ms,
            path: expanded,
            shortcut_path: result.path,
            geojson: feature,
        }),
        timing_breakdown: Some(TimingBreakdown {
            find_nearest_us: nearest_us,
            search_us,
            expand_us,
            geojson_us,
            total_ms: runtime_ms,
        }),
        debug: Some(DebugInfo {
            cells: CellDebug {
                source: build_cell_info(src_cell),
                target: build_cell_info(tgt_cell),
                high: build_cell_info(high.cell),
            },
        }),
        error: None,
        runtime_ms: None,
    })
    .into_response()
}

// ============ Route by edge IDs ============

#[derive(Debug, Deserialize, ToSchema)]
pub struct EdgeRouteRequest {
    #[serde(default = "default_dataset")]
    dataset: String,
    source_edge: u32,
    target_edge: u32,
    #[serde(default = "default_algorithm")]
    algorithm: String,
}

/// Route between two known edge IDs
#[utoipa::path(
    post,
    path = "/route_by_edge",
    request_body = EdgeRouteRequest,
    responses(
        (status = 200, description = "Route result (success flag inside)", body = RouteResponse),
        (status = 503, description = "Dataset not loaded", body = RouteResponse),
    )
)]
async fn route_by_edge(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EdgeRouteRequest>,
) -> Response {
    let start_time = Instant::now();

    let Some(dataset) = state.registry.get(&req.dataset) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RouteResponse {
                success: false,
                dataset: None,
                route: None,
                timing_breakdown: None,
                debug: None,
                error: Some(EngineError::DatasetNotFound(req.dataset).to_string()),
                runtime_ms: None,
            }),
        )
            .into_response();
    };

    let algorithm = Algorithm::parse(&req.algorithm).unwrap_or(Algorithm::Pruned);
    let result = dataset
        .graph
        .query(algorithm, req.source_edge, req.target_edge);
    let runtime_ms = start_time.elapsed().as_secs_f64() * 1e3;

    match result {
        Ok(r) => Json(RouteResponse {
            success: true,
            dataset: Some(dataset.name.clone()),
            route: Some(RouteBody {
                distance: r.distance,
                distance_meters: 0.0,
                runtime_ms,
                path: None,
                shortcut_path: r.path,
                geojson: None,
            }),
            timing_breakdown: None,
            debug: None,
            error: None,
            runtime_ms: None,
        })
        .into_response(),
        Err(e) => {
            let status = match e {
                EngineError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::OK,
            };
            (
                status,
                Json(RouteResponse {
                    success: false,
                    dataset: Some(dataset.name.clone()),
                    route: None,
                    timing_breakdown: None,
                    debug: None,
                    error: Some(e.to_string()),
                    runtime_ms: Some(runtime_ms),
                }),
            )
                .into_response()
        }
    }
}

// ============ Boundary ============

#[derive(Debug, Deserialize)]
struct BoundaryParams {
    #[serde(default = "default_dataset")]
    dataset: String,
}

/// Raw boundary GeoJSON stored with the dataset, passed through verbatim.
async fn boundary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BoundaryParams>,
) -> Response {
    let Some(dataset) = state.registry.get(&params.dataset) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: EngineError::DatasetNotFound(params.dataset).to_string(),
            }),
        )
            .into_response();
    };

    match dataset.info.get("boundary_geojson") {
        Some(boundary) if !boundary.is_empty() => (
            [(header::CONTENT_TYPE, "application/geo+json")],
            boundary.clone(),
        )
            .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No boundary GeoJSON stored for this dataset".to_string(),
            }),
        )
            .into_response(),
    }
}
