//! Cascade API server
//!
//! REST endpoints serve the cached market universe and correlation graph;
//! the discover and backtest endpoints stream NDJSON progress events from
//! long-running engine runs.

mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use cascade_llm::{MarketClassifier, OpenAiClient};
use cascade_polymarket::PolymarketClient;
use cascade_services::{MarketStore, RefreshConfig, RefreshService, ResolvedMarketCache};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// TTL for the resolved-market search cache.
const RESOLVED_CACHE_TTL: Duration = Duration::from_secs(600);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MarketStore>,
    pub refresh_service: Arc<RefreshService>,
    pub resolved_cache: Arc<ResolvedMarketCache>,
    pub polymarket: PolymarketClient,
    /// LLM client (optional - requires OPENAI_API_KEY)
    pub llm: Option<OpenAiClient>,
    pub classifier: Option<MarketClassifier>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cascade_api=debug")),
        )
        .init();

    info!("Starting Cascade API");

    let polymarket = PolymarketClient::new();

    let llm = match OpenAiClient::new() {
        Ok(client) => {
            info!("OpenAI client initialized");
            Some(client)
        }
        Err(e) => {
            info!(
                "LLM features disabled: {}. Set OPENAI_API_KEY to enable discovery and backtests.",
                e
            );
            None
        }
    };
    let classifier = llm.clone().map(MarketClassifier::new);

    let db_path =
        std::env::var("CASCADE_DB_PATH").unwrap_or_else(|_| "data/cascade.db".to_string());
    info!("Opening market store at: {}", db_path);
    let store = Arc::new(MarketStore::new(&db_path)?);

    let refresh_interval = std::env::var("REFRESH_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(600);
    let refresh_config = RefreshConfig {
        interval: Duration::from_secs(refresh_interval),
        ..RefreshConfig::default()
    };
    let refresh_service = Arc::new(RefreshService::new(
        polymarket.clone(),
        classifier.clone(),
        Arc::clone(&store),
        refresh_config,
    ));

    let resolved_cache = Arc::new(ResolvedMarketCache::new(
        polymarket.clone(),
        RESOLVED_CACHE_TTL,
    ));

    let state = AppState {
        store,
        refresh_service,
        resolved_cache,
        polymarket,
        llm,
        classifier,
    };

    // Configure CORS for the frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .nest("/api", routes::api_routes())
        .layer(cors)
        .with_state(state);

    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
