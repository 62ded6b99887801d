//! Cached-data REST endpoints

use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

/// Volume floor for markets included in the network graph payload.
const GRAPH_MIN_VOLUME: f64 = 50_000.0;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/data", get(get_data))
        .route("/data/markets", get(get_markets))
        .route("/data/correlations", get(get_correlations))
        .route("/data/status", get(get_status))
        .route("/refresh", post(trigger_refresh))
        .route("/classify", post(classify))
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// Complete dataset for the network view: graph nodes with their histories,
/// correlation links, and refresh metadata.
async fn get_data(State(state): State<AppState>) -> impl IntoResponse {
    // Serve what we have; a refresh starts in the background if it's stale.
    state.refresh_service.spawn_if_stale();

    let markets = match state.store.get_all_markets() {
        Ok(markets) => markets,
        Err(e) => return internal_error(e).into_response(),
    };

    let mut nodes = Vec::new();
    for market in markets {
        if market.volume < GRAPH_MIN_VOLUME {
            continue;
        }

        let history = match state.store.get_market_history(&market.id) {
            Ok(history) => history,
            Err(e) => return internal_error(e).into_response(),
        };

        nodes.push(json!({
            "id": market.id,
            "name": market.name,
            "slug": market.slug,
            "category": market.category,
            "volume": market.volume,
            "probability": market.probability,
            "clobTokenId": market.clob_token_id,
            "history": history,
        }));
    }

    let links = match state.store.get_all_correlations() {
        Ok(links) => links,
        Err(e) => return internal_error(e).into_response(),
    };

    let metadata = json!({
        "last_refresh": state.store.get_metadata("last_refresh").ok().flatten(),
        "total_markets": state.store.get_metadata("total_markets").ok().flatten(),
        "total_correlations": state.store.get_metadata("total_correlations").ok().flatten(),
    });

    Json(json!({
        "nodes": nodes,
        "links": links,
        "metadata": metadata,
    }))
    .into_response()
}

async fn get_markets(State(state): State<AppState>) -> impl IntoResponse {
    state.refresh_service.spawn_if_stale();

    match state.store.get_all_markets() {
        Ok(markets) => Json(markets).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn get_correlations(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_all_correlations() {
        Ok(links) => Json(links).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let last_refresh = state.store.get_metadata("last_refresh").ok().flatten();
    let total_markets = state
        .store
        .get_metadata("total_markets")
        .ok()
        .flatten()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let total_correlations = state
        .store
        .get_metadata("total_correlations")
        .ok()
        .flatten()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    let status = if last_refresh.is_some() {
        "ready"
    } else {
        "needs_refresh"
    };

    Json(json!({
        "last_refresh": last_refresh,
        "total_markets": total_markets,
        "total_correlations": total_correlations,
        "status": status,
    }))
}

/// Manually trigger a data refresh.
async fn trigger_refresh(State(state): State<AppState>) -> impl IntoResponse {
    if state.refresh_service.spawn() {
        info!("Manual refresh started");
        Json(json!({"status": "refresh_started"}))
    } else {
        Json(json!({"status": "refresh_already_running"}))
    }
}

#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    question: String,
}

/// Classify a single market question into a category.
async fn classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> impl IntoResponse {
    let Some(classifier) = &state.classifier else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "OPENAI_API_KEY not configured".to_string(),
            }),
        )
            .into_response();
    };

    let category = classifier.classify(&request.question).await;
    Json(json!({"category": category})).into_response()
}
