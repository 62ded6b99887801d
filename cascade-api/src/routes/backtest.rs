//! Backtest streaming and search endpoints

use crate::routes::stream::ndjson_response;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cascade_backtest::{
    run_resolution_shock, run_threshold, BacktestConfig, FollowerSource, HoldPeriod,
    ThresholdParams,
};
use cascade_core::{Category, Market, PriceHistoryProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Default leader threshold for threshold-mode runs.
const DEFAULT_THRESHOLD: f64 = 0.95;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/backtest", post(run_backtest))
        .route("/backtest/search", get(search))
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct BacktestRequest {
    market_id: String,

    /// "resolution" (default) or "threshold"
    #[serde(default)]
    mode: Option<String>,

    /// Threshold mode: probability the leader must reach
    #[serde(default)]
    threshold: Option<f64>,

    /// Threshold mode: "5m" | "1h" | "1d" | "1w" | "resolution"
    #[serde(default)]
    hold: Option<String>,

    #[serde(default)]
    min_volume: Option<f64>,

    // Leader fields supplied by the search UI. Resolved markets are usually
    // not part of the cached active universe, so the leader record travels
    // with the request.
    #[serde(default)]
    market_question: Option<String>,
    #[serde(default)]
    clob_token_id: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
}

/// Stream backtest progress as NDJSON events.
async fn run_backtest(
    State(state): State<AppState>,
    Json(request): Json<BacktestRequest>,
) -> Response {
    if request.market_id.is_empty() {
        return bad_request("market_id is required");
    }

    let Some(llm) = state.llm.clone() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "OPENAI_API_KEY not configured".to_string(),
            }),
        )
            .into_response();
    };

    let pool = match state.store.get_all_markets() {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to load candidate pool: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    // Prefer the stored record; otherwise build the leader from the request
    // (the usual case for resolved markets chosen via search).
    let leader = match state.store.get_market(&request.market_id) {
        Ok(Some(market)) => market,
        _ => {
            let clob_token_id = request.clob_token_id.clone().unwrap_or_default();
            if clob_token_id.is_empty() {
                return bad_request("market_id and clob_token_id are required");
            }
            Market {
                id: request.market_id.clone(),
                name: request.market_question.clone().unwrap_or_default(),
                slug: String::new(),
                category: Category::Other,
                volume: 0.0,
                probability: 0.5,
                clob_token_id,
                start_date: None,
                end_date: request.end_date.clone(),
                closed: true,
            }
        }
    };

    let mut config = BacktestConfig::default();
    if let Some(min_volume) = request.min_volume {
        config.min_volume = min_volume;
    }

    let provider: Arc<dyn PriceHistoryProvider> = Arc::new(state.polymarket.clone());

    match request.mode.as_deref().unwrap_or("resolution") {
        "threshold" => {
            let hold_raw = request.hold.as_deref().unwrap_or("1d");
            let Some(hold) = HoldPeriod::parse(hold_raw) else {
                return bad_request("hold must be one of 5m, 1h, 1d, 1w, resolution");
            };
            let params = ThresholdParams {
                threshold: request.threshold.unwrap_or(DEFAULT_THRESHOLD),
                hold,
            };

            info!(
                "Starting threshold backtest for {} (threshold {})",
                leader.id, params.threshold
            );
            ndjson_response(run_threshold(
                leader,
                pool,
                FollowerSource::Discover,
                params,
                llm,
                provider,
                config,
            ))
        }
        "resolution" => {
            info!("Starting resolution-shock backtest for {}", leader.id);
            ndjson_response(run_resolution_shock(
                leader,
                pool,
                FollowerSource::Discover,
                llm,
                provider,
                config,
            ))
        }
        other => bad_request(&format!("unknown mode: {}", other)),
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// Search resolved markets by keyword or by active-on date.
async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let result = match (params.date.as_deref(), params.q.as_deref()) {
        (Some(date), _) if !date.trim().is_empty() => {
            state.resolved_cache.search_by_date(date).await
        }
        (_, Some(query)) => state.resolved_cache.search_by_keyword(query).await,
        _ => Ok(Vec::new()),
    };

    match result {
        Ok(markets) => Json(markets).into_response(),
        Err(e) => {
            error!("Backtest search failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
