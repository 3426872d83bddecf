// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The health check is public; every
// other endpoint requires a valid Bearer token checked via the `AuthBearer`
// extractor. This surfaces spec §6's inbound API directly against `Core`:
// no order placement or exchange control lives here, only price ingestion,
// trade lifecycle notifications and read-only queries.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api::auth::AuthBearer;
use crate::candle::{Candle, Timeframe};
use crate::core::{Core, TradeOpen};
use crate::diagnostics::{ExitData, ExpectancyFilters};
use crate::regime::Regime;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(core: Arc<Core>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/price", post(on_price))
        .route("/api/v1/trades", post(open_trade))
        .route("/api/v1/trades/:id/close", post(close_trade))
        .route("/api/v1/strategy", get(query_strategy))
        .route("/api/v1/diagnostics", get(query_diagnostics))
        .route("/api/v1/expectancy", get(query_expectancy))
        .route("/api/v1/candles/:timeframe/seed", post(seed_historical_candles))
        // ── WebSocket ────────────────────────────────────────────────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(core)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> impl IntoResponse {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

fn parse_timeframe(raw: &str) -> Option<Timeframe> {
    match raw {
        "1s" => Some(Timeframe::S1),
        "1m" => Some(Timeframe::M1),
        "2m" => Some(Timeframe::M2),
        "5m" => Some(Timeframe::M5),
        "10m" => Some(Timeframe::M10),
        "15m" => Some(Timeframe::M15),
        "30m" => Some(Timeframe::M30),
        "1h" => Some(Timeframe::H1),
        _ => None,
    }
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(core): State<Arc<Core>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: core.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Full state snapshot
// =============================================================================

async fn full_state(_auth: AuthBearer, State(core): State<Arc<Core>>) -> impl IntoResponse {
    Json(core.snapshot())
}

// =============================================================================
// onPrice — admin/test-only ingestion path
// =============================================================================
//
// `Core::on_price` is normally fed exclusively by the price feed task (spec
// §5's single-writer model); this endpoint exists for local testing and
// demos where no live feed is configured, guarded behind the same Bearer
// token as every other mutating endpoint.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnPriceRequest {
    price: f64,
    #[serde(default)]
    ts_ms: Option<i64>,
}

async fn on_price(_auth: AuthBearer, State(core): State<Arc<Core>>, Json(req): Json<OnPriceRequest>) -> impl IntoResponse {
    let ts_ms = req.ts_ms.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    core.on_price(req.price, ts_ms);
    StatusCode::NO_CONTENT
}

// =============================================================================
// openTrade / closeTrade
// =============================================================================

async fn open_trade(_auth: AuthBearer, State(core): State<Arc<Core>>, Json(req): Json<TradeOpen>) -> impl IntoResponse {
    let now_ms = chrono::Utc::now().timestamp_millis();
    core.open_trade(req, now_ms);
    StatusCode::NO_CONTENT
}

async fn close_trade(
    _auth: AuthBearer,
    State(core): State<Arc<Core>>,
    axum::extract::Path(id): axum::extract::Path<String>,
    Json(exit): Json<ExitData>,
) -> impl IntoResponse {
    let now_ms = chrono::Utc::now().timestamp_millis();
    match core.close_trade(&id, exit, now_ms) {
        Some(diagnostics) => Json(diagnostics).into_response(),
        None => {
            warn!(trade_id = %id, "close_trade requested for unknown position");
            error_response(StatusCode::NOT_FOUND, "no active position with that id").into_response()
        }
    }
}

// =============================================================================
// queryStrategy
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryStrategyParams {
    timeframe: String,
    #[serde(default)]
    position_id: Option<String>,
}

async fn query_strategy(
    _auth: AuthBearer,
    State(core): State<Arc<Core>>,
    Query(params): Query<QueryStrategyParams>,
) -> impl IntoResponse {
    let Some(timeframe) = parse_timeframe(&params.timeframe) else {
        return error_response(StatusCode::BAD_REQUEST, "unknown timeframe").into_response();
    };
    let now_ms = chrono::Utc::now().timestamp_millis();
    match core.query_strategy(timeframe, params.position_id.as_deref(), now_ms) {
        Some(analysis) => Json(analysis).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "not enough candle history yet").into_response(),
    }
}

// =============================================================================
// queryDiagnostics / queryExpectancy
// =============================================================================

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DiagnosticsQuery {
    #[serde(default)]
    regime: Option<Regime>,
    #[serde(default)]
    mfe_before_mae: Option<bool>,
    #[serde(default)]
    regime_shifted: Option<bool>,
    #[serde(default)]
    hour_start: Option<u8>,
    #[serde(default)]
    hour_end: Option<u8>,
}

impl From<DiagnosticsQuery> for ExpectancyFilters {
    fn from(q: DiagnosticsQuery) -> Self {
        ExpectancyFilters {
            regime: q.regime,
            mfe_before_mae: q.mfe_before_mae,
            regime_shifted: q.regime_shifted,
            hour_range: match (q.hour_start, q.hour_end) {
                (Some(s), Some(e)) => Some((s, e)),
                _ => None,
            },
        }
    }
}

async fn query_diagnostics(_auth: AuthBearer, State(core): State<Arc<Core>>, Query(q): Query<DiagnosticsQuery>) -> impl IntoResponse {
    let filters: ExpectancyFilters = q.into();
    Json(core.query_diagnostics(&filters))
}

async fn query_expectancy(_auth: AuthBearer, State(core): State<Arc<Core>>, Query(q): Query<DiagnosticsQuery>) -> impl IntoResponse {
    let filters: ExpectancyFilters = q.into();
    Json(core.query_expectancy(&filters))
}

// =============================================================================
// seedHistoricalCandles
// =============================================================================

async fn seed_historical_candles(
    _auth: AuthBearer,
    State(core): State<Arc<Core>>,
    axum::extract::Path(timeframe): axum::extract::Path<String>,
    Json(candles): Json<Vec<Candle>>,
) -> impl IntoResponse {
    let Some(tf) = parse_timeframe(&timeframe) else {
        return error_response(StatusCode::BAD_REQUEST, "unknown timeframe").into_response();
    };
    core.seed_historical_candles(tf, &candles);
    StatusCode::NO_CONTENT.into_response()
}
