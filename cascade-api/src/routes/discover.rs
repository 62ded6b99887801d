//! Follower-discovery streaming endpoint

use crate::routes::stream::ndjson_response;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use cascade_core::ProgressEvent;
use cascade_discovery::{discover_followers, DiscoveryConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

pub fn routes() -> Router<AppState> {
    Router::new().route("/discover", post(discover))
}

#[derive(Debug, Deserialize)]
struct DiscoverRequest {
    market_id: String,
    #[serde(default)]
    min_volume: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Stream discovery progress as NDJSON events.
async fn discover(
    State(state): State<AppState>,
    Json(request): Json<DiscoverRequest>,
) -> Response {
    if request.market_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "market_id is required".to_string(),
            }),
        )
            .into_response();
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
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    let Some(leader) = pool.iter().find(|m| m.id == request.market_id).cloned() else {
        // The run never starts; report it in-band so stream consumers see a
        // normal terminal event rather than an HTTP error mid-handshake.
        return ndjson_response(tokio_stream::once(ProgressEvent::error(format!(
            "Leader market not found: {}",
            request.market_id
        ))));
    };

    info!("Starting discovery for leader {}", leader.id);

    let mut config = DiscoveryConfig::default();
    if let Some(min_volume) = request.min_volume {
        config.min_volume = min_volume;
    }

    ndjson_response(discover_followers(leader, pool, llm, config))
}
