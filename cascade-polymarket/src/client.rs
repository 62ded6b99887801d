//! Polymarket API client
//!
//! Covers the two endpoints the engine needs: the paginated Gamma market
//! catalog and the CLOB price-history lookup.

use crate::types::{GammaMarket, PricesHistoryResponse};
use async_trait::async_trait;
use cascade_core::{CascadeError, CascadeResult, PricePoint, PriceHistoryProvider};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Base URL for the Polymarket Gamma API
pub const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";

/// Base URL for the Polymarket CLOB API
pub const CLOB_API_BASE: &str = "https://clob.polymarket.com";

/// Page size for catalog pagination (the API maximum).
const PAGE_LIMIT: u32 = 500;

/// Courtesy delay between catalog pages.
const PAGE_DELAY: Duration = Duration::from_millis(200);

/// Polymarket API client
#[derive(Clone)]
pub struct PolymarketClient {
    client: Client,
    gamma_url: String,
    clob_url: String,
}

impl PolymarketClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            gamma_url: GAMMA_API_BASE.to_string(),
            clob_url: CLOB_API_BASE.to_string(),
        }
    }

    /// Fetch one page of markets, ordered by volume descending.
    ///
    /// `closed = false` requests currently active markets; `closed = true`
    /// requests resolved ones.
    #[instrument(skip(self))]
    pub async fn list_markets(
        &self,
        closed: bool,
        limit: u32,
        offset: u32,
    ) -> CascadeResult<Vec<GammaMarket>> {
        let filter = if closed {
            "closed=true"
        } else {
            "active=true&closed=false"
        };
        let url = format!(
            "{}/markets?{}&limit={}&offset={}&order=volume&ascending=false",
            self.gamma_url, filter, limit, offset
        );

        debug!("Fetching Polymarket markets from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CascadeError::network(format!("Failed to fetch markets: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CascadeError::api(format!(
                "Gamma API error ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CascadeError::parse(format!("Failed to parse markets response: {}", e)))
    }

    /// Fetch up to `max_markets` markets with pagination.
    ///
    /// Pages are requested sequentially with a courtesy delay in between; a
    /// short page ends the walk.
    #[instrument(skip(self))]
    pub async fn list_all_markets(
        &self,
        closed: bool,
        max_markets: usize,
    ) -> CascadeResult<Vec<GammaMarket>> {
        let mut all_markets = Vec::new();
        let mut offset = 0u32;

        while all_markets.len() < max_markets {
            let page = self.list_markets(closed, PAGE_LIMIT, offset).await?;
            if page.is_empty() {
                break;
            }

            let page_len = page.len();
            all_markets.extend(page);

            if page_len < PAGE_LIMIT as usize {
                break;
            }

            offset += PAGE_LIMIT;
            tokio::time::sleep(PAGE_DELAY).await;
        }

        all_markets.truncate(max_markets);
        debug!("Fetched {} Polymarket markets total", all_markets.len());
        Ok(all_markets)
    }

    /// Get price history for a token from the CLOB API.
    ///
    /// `interval` is a duration string ("1d", "1w", "max"); `fidelity` is the
    /// sample resolution in minutes.
    #[instrument(skip(self))]
    pub async fn get_prices_history(
        &self,
        token_id: &str,
        interval: &str,
        fidelity: u32,
    ) -> CascadeResult<Vec<PricePoint>> {
        let url = format!(
            "{}/prices-history?market={}&interval={}&fidelity={}",
            self.clob_url, token_id, interval, fidelity
        );

        debug!("Fetching Polymarket price history from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CascadeError::network(format!("Failed to fetch price history: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CascadeError::api(format!(
                "CLOB API error ({}): {}",
                status, body
            )));
        }

        let prices: PricesHistoryResponse = response.json().await.map_err(|e| {
            CascadeError::parse(format!("Failed to parse price history response: {}", e))
        })?;

        Ok(prices.history)
    }
}

#[async_trait]
impl PriceHistoryProvider for PolymarketClient {
    /// Full history at hourly fidelity, the resolution backtests assume.
    async fn price_history(&self, clob_token_id: &str) -> CascadeResult<Vec<PricePoint>> {
        self.get_prices_history(clob_token_id, "max", 60).await
    }
}

impl Default for PolymarketClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PolymarketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolymarketClient")
            .field("gamma_url", &self.gamma_url)
            .field("clob_url", &self.clob_url)
            .finish()
    }
}
