//! TTL-cached index of resolved markets for backtest search
//!
//! Resolution-shock backtests start from a market that has already resolved,
//! so the UI needs a searchable list of them. Fetching thousands of closed
//! markets per keystroke is out of the question; the list is cached with a
//! TTL and refreshed lazily.

use cascade_core::{CascadeError, CascadeResult};
use cascade_polymarket::{GammaMarket, PolymarketClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;

/// Volume floor for resolved markets worth backtesting.
const MIN_RESOLVED_VOLUME: f64 = 1_000.0;

/// Markets that ended before CLOB price history existed are useless here.
const MIN_END_DATE: &str = "2023-01-01";

const KEYWORD_RESULT_LIMIT: usize = 20;
const DATE_RESULT_LIMIT: usize = 50;

/// A resolved market eligible as a backtest leader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedMarket {
    pub id: String,
    pub question: String,
    pub slug: String,
    pub volume: f64,
    #[serde(rename = "clobTokenIds")]
    pub clob_token_ids: Vec<String>,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
    pub resolved_outcome: String,
}

struct CacheEntry {
    fetched_at: Instant,
    markets: Arc<Vec<ResolvedMarket>>,
}

/// Lazily refreshed, TTL-bounded resolved-market cache.
pub struct ResolvedMarketCache {
    client: PolymarketClient,
    ttl: Duration,
    max_markets: usize,
    entry: RwLock<Option<CacheEntry>>,
}

impl ResolvedMarketCache {
    pub fn new(client: PolymarketClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            max_markets: 4_000,
            entry: RwLock::new(None),
        }
    }

    /// The current resolved-market list, fetching if the cache is cold or
    /// expired.
    pub async fn get(&self) -> CascadeResult<Arc<Vec<ResolvedMarket>>> {
        {
            let entry = self.entry.read().await;
            if let Some(cached) = entry.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&cached.markets));
                }
            }
        }

        // Write lock held across the fetch so concurrent misses collapse
        // into one upstream walk.
        let mut entry = self.entry.write().await;
        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.markets));
            }
        }

        let raw = self.client.list_all_markets(true, self.max_markets).await?;
        let mut resolved: Vec<ResolvedMarket> =
            raw.iter().filter_map(to_resolved_market).collect();
        resolved.sort_by(|a, b| {
            b.volume
                .partial_cmp(&a.volume)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        info!(
            "Cached {} resolved markets (from {} closed)",
            resolved.len(),
            raw.len()
        );

        let markets = Arc::new(resolved);
        *entry = Some(CacheEntry {
            fetched_at: Instant::now(),
            markets: Arc::clone(&markets),
        });

        Ok(markets)
    }

    /// Keyword search over resolved market questions. Queries shorter than
    /// two characters return nothing.
    pub async fn search_by_keyword(&self, query: &str) -> CascadeResult<Vec<ResolvedMarket>> {
        let query = query.trim().to_lowercase();
        if query.len() < 2 {
            return Ok(Vec::new());
        }

        let markets = self.get().await?;
        Ok(keyword_matches(&markets, &query))
    }

    /// Markets that were active on the given date (YYYY-MM-DD).
    pub async fn search_by_date(&self, date: &str) -> CascadeResult<Vec<ResolvedMarket>> {
        let date = date.trim();
        if date.is_empty() {
            return Err(CascadeError::parse("date must not be empty"));
        }

        let markets = self.get().await?;
        Ok(active_on_date(&markets, date))
    }
}

/// Filter one closed Gamma market into the resolved index.
fn to_resolved_market(raw: &GammaMarket) -> Option<ResolvedMarket> {
    let question = raw.question.clone()?;
    let start_date = raw.start_date.clone().filter(|s| !s.is_empty())?;
    let end_date = raw.end_date.clone().filter(|s| !s.is_empty())?;

    // Pre-CLOB markets have no usable price history
    if end_date.as_str() < MIN_END_DATE {
        return None;
    }

    let volume = raw.parse_volume();
    if volume < MIN_RESOLVED_VOLUME {
        return None;
    }

    let clob_token_ids: Vec<String> = raw
        .clob_token_ids
        .as_deref()
        .and_then(|ids| serde_json::from_str(ids).ok())?;
    if clob_token_ids.is_empty() {
        return None;
    }

    let resolved_outcome = raw.resolved_outcome()?;

    Some(ResolvedMarket {
        id: raw.id.clone(),
        question,
        slug: raw.slug.clone().unwrap_or_default(),
        volume,
        clob_token_ids,
        start_date,
        end_date,
        resolved_outcome: resolved_outcome.to_string(),
    })
}

fn keyword_matches(markets: &[ResolvedMarket], query: &str) -> Vec<ResolvedMarket> {
    markets
        .iter()
        .filter(|m| m.question.to_lowercase().contains(query))
        .take(KEYWORD_RESULT_LIMIT)
        .cloned()
        .collect()
}

fn active_on_date(markets: &[ResolvedMarket], date: &str) -> Vec<ResolvedMarket> {
    // Volume-descending order is inherited from the cached list.
    markets
        .iter()
        .filter(|m| {
            let start = &m.start_date[..m.start_date.len().min(10)];
            let end = &m.end_date[..m.end_date.len().min(10)];
            start <= date && date <= end
        })
        .take(DATE_RESULT_LIMIT)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(id: &str, question: &str, start: &str, end: &str, volume: f64) -> ResolvedMarket {
        ResolvedMarket {
            id: id.to_string(),
            question: question.to_string(),
            slug: id.to_string(),
            volume,
            clob_token_ids: vec!["111".to_string(), "222".to_string()],
            start_date: format!("{}T00:00:00Z", start),
            end_date: format!("{}T00:00:00Z", end),
            resolved_outcome: "Yes".to_string(),
        }
    }

    fn gamma(json: serde_json::Value) -> GammaMarket {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_to_resolved_market_filters() {
        let good = gamma(serde_json::json!({
            "id": "1",
            "question": "Did X happen?",
            "volume": "50000",
            "outcomePrices": "[\"0.99\", \"0.01\"]",
            "clobTokenIds": "[\"111\", \"222\"]",
            "startDate": "2024-01-01T00:00:00Z",
            "endDate": "2024-03-01T00:00:00Z"
        }));
        let market = to_resolved_market(&good).unwrap();
        assert_eq!(market.resolved_outcome, "Yes");
        assert_eq!(market.clob_token_ids.len(), 2);

        // Undecided prices never qualify
        let undecided = gamma(serde_json::json!({
            "id": "2",
            "question": "Q",
            "volume": "50000",
            "outcomePrices": "[\"0.5\", \"0.5\"]",
            "clobTokenIds": "[\"111\"]",
            "startDate": "2024-01-01T00:00:00Z",
            "endDate": "2024-03-01T00:00:00Z"
        }));
        assert!(to_resolved_market(&undecided).is_none());

        // Pre-CLOB end date
        let ancient = gamma(serde_json::json!({
            "id": "3",
            "question": "Q",
            "volume": "50000",
            "outcomePrices": "[\"0.99\", \"0.01\"]",
            "clobTokenIds": "[\"111\"]",
            "startDate": "2022-01-01T00:00:00Z",
            "endDate": "2022-06-01T00:00:00Z"
        }));
        assert!(to_resolved_market(&ancient).is_none());

        // Below the volume floor
        let dust = gamma(serde_json::json!({
            "id": "4",
            "question": "Q",
            "volume": "10",
            "outcomePrices": "[\"0.99\", \"0.01\"]",
            "clobTokenIds": "[\"111\"]",
            "startDate": "2024-01-01T00:00:00Z",
            "endDate": "2024-03-01T00:00:00Z"
        }));
        assert!(to_resolved_market(&dust).is_none());
    }

    #[test]
    fn test_keyword_matches() {
        let markets = vec![
            resolved("1", "Will Bitcoin hit $100k?", "2024-01-01", "2024-06-01", 100.0),
            resolved("2", "Will the Fed cut rates?", "2024-01-01", "2024-06-01", 100.0),
        ];
        let hits = keyword_matches(&markets, "bitcoin");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
    }

    #[test]
    fn test_active_on_date() {
        let markets = vec![
            resolved("early", "Q1", "2024-01-01", "2024-02-01", 100.0),
            resolved("late", "Q2", "2024-03-01", "2024-05-01", 100.0),
        ];

        let hits = active_on_date(&markets, "2024-01-15");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "early");

        // Boundary dates count as active
        let hits = active_on_date(&markets, "2024-05-01");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "late");

        assert!(active_on_date(&markets, "2024-02-15").is_empty());
    }
}
