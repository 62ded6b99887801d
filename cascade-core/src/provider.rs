//! Provider traits at the seams between the engines and their data sources

use crate::error::CascadeResult;
use crate::market::PricePoint;
use async_trait::async_trait;

/// Source of chronological price history for a CLOB token.
///
/// The backtest engine is written against this trait so tests can run on
/// fixture data without touching the network.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// Fetch the full price history for a token, oldest point first.
    async fn price_history(&self, clob_token_id: &str) -> CascadeResult<Vec<PricePoint>>;
}
