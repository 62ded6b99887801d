//! API route definitions

pub mod backtest;
pub mod data;
pub mod discover;
pub mod stream;

use crate::AppState;
use axum::Router;

/// All routes under /api
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(data::routes())
        .merge(discover::routes())
        .merge(backtest::routes())
}
