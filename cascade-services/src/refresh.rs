//! Data refresh cycle
//!
//! Fetches the active market universe, classifies new markets, pulls price
//! histories, recomputes the correlation graph, and persists everything.
//! Refreshes are triggered by staleness on user requests — there is no
//! periodic daemon, so an idle deployment does no upstream traffic.

use crate::store::MarketStore;
use cascade_core::{CascadeResult, Market, PricePoint};
use cascade_correlation::compute_correlations;
use cascade_llm::MarketClassifier;
use cascade_polymarket::PolymarketClient;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Tunables for the refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Universe volume floor in USD
    pub min_volume: f64,

    /// Hard cap on catalog pagination
    pub max_markets: usize,

    /// Minimum history points for a market to enter the correlation sweep
    pub min_history_points: usize,

    /// Courtesy delay between per-market history fetches
    pub fetch_delay_ms: u64,

    /// Data older than this is considered stale
    pub interval: Duration,

    /// Price history older than this many days is dropped after each cycle
    pub history_retention_days: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            min_volume: 100_000.0,
            max_markets: 2_000,
            min_history_points: 10,
            fetch_delay_ms: 100,
            interval: Duration::from_secs(600),
            history_retention_days: 30,
        }
    }
}

/// What a completed refresh produced.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub markets: usize,
    pub with_history: usize,
    pub correlations: usize,
    pub elapsed: Duration,
}

/// Runs the refresh cycle and guards against overlapping runs.
pub struct RefreshService {
    client: PolymarketClient,
    classifier: Option<MarketClassifier>,
    store: Arc<MarketStore>,
    config: RefreshConfig,
    in_progress: AtomicBool,
}

impl RefreshService {
    pub fn new(
        client: PolymarketClient,
        classifier: Option<MarketClassifier>,
        store: Arc<MarketStore>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            client,
            classifier,
            store,
            config,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Whether the stored data is older than the refresh interval.
    pub fn is_stale(&self) -> bool {
        let last_refresh = match self.store.get_metadata("last_refresh") {
            Ok(Some(value)) => value,
            _ => return true,
        };

        match chrono::DateTime::parse_from_rfc3339(&last_refresh) {
            Ok(last) => {
                let age = Utc::now().signed_duration_since(last);
                age.num_seconds() >= self.config.interval.as_secs() as i64
            }
            // Unparseable timestamp: refresh to be safe
            Err(_) => true,
        }
    }

    /// Kick off a background refresh unless one is already running.
    /// Returns whether a refresh was started.
    pub fn spawn(self: &Arc<Self>) -> bool {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return false;
        }

        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.refresh().await {
                error!("Data refresh failed: {}", e);
            }
            service.in_progress.store(false, Ordering::SeqCst);
        });

        true
    }

    /// Spawn a refresh only when the data is stale.
    pub fn spawn_if_stale(self: &Arc<Self>) -> bool {
        if self.is_stale() {
            self.spawn()
        } else {
            false
        }
    }

    /// Run one full refresh cycle.
    pub async fn refresh(&self) -> CascadeResult<RefreshOutcome> {
        info!("Starting data refresh");
        let started = Instant::now();

        // Cache existing categories so markets aren't re-classified each cycle
        let category_cache = self.store.get_categories()?;
        info!("Cached {} existing categories", category_cache.len());

        let raw_markets = self.client.list_all_markets(false, self.config.max_markets).await?;
        if raw_markets.is_empty() {
            warn!("No markets fetched, aborting refresh");
            return Ok(RefreshOutcome {
                markets: 0,
                with_history: 0,
                correlations: 0,
                elapsed: started.elapsed(),
            });
        }

        // Filter the universe: volume floor, tradeable probability band,
        // CLOB token required.
        let mut markets: Vec<Market> = raw_markets
            .iter()
            .filter_map(|raw| raw.to_market())
            .filter(|m| m.volume >= self.config.min_volume)
            .filter(|m| (0.05..=0.95).contains(&m.probability))
            .collect();

        info!(
            "Filtered {} raw markets down to {} (vol >= ${:.0}, 5% <= p <= 95%)",
            raw_markets.len(),
            markets.len(),
            self.config.min_volume
        );

        // Fresh snapshot semantics: the previous universe is replaced wholesale.
        self.store.clear_markets()?;
        self.store.clear_correlations()?;

        let mut histories: HashMap<String, Vec<PricePoint>> = HashMap::new();
        let total = markets.len();

        for (index, market) in markets.iter_mut().enumerate() {
            market.category = match category_cache.get(&market.id) {
                Some(cached) => *cached,
                None => match &self.classifier {
                    Some(classifier) => {
                        let category = classifier.classify(&market.name).await;
                        info!("Classified '{}' as {}", truncated(&market.name, 50), category);
                        category
                    }
                    None => cascade_core::Category::Other,
                },
            };

            self.store.upsert_market(market)?;

            match self
                .client
                .get_prices_history(&market.clob_token_id, "1d", 60)
                .await
            {
                Ok(history) if history.len() >= self.config.min_history_points => {
                    self.store.upsert_price_history(&market.id, &history)?;
                    histories.insert(market.id.clone(), history);
                }
                Ok(_) => {}
                Err(e) => warn!("History fetch failed for {}: {}", market.id, e),
            }

            if (index + 1) % 50 == 0 {
                info!("Processed {}/{} markets", index + 1, total);
            }

            tokio::time::sleep(Duration::from_millis(self.config.fetch_delay_ms)).await;
        }

        info!(
            "Stored {} markets with {} having valid history",
            markets.len(),
            histories.len()
        );

        info!("Calculating correlations");
        let links = compute_correlations(&markets, &histories);
        self.store.replace_correlations(&links)?;
        info!("Stored {} correlations", links.len());

        self.store
            .set_metadata("last_refresh", &Utc::now().to_rfc3339())?;
        self.store
            .set_metadata("total_markets", &markets.len().to_string())?;
        self.store
            .set_metadata("total_correlations", &links.len().to_string())?;

        let cleaned = self
            .store
            .cleanup_old_history(self.config.history_retention_days)?;
        if cleaned > 0 {
            info!("Cleaned up {} old price history records", cleaned);
        }

        let elapsed = started.elapsed();
        info!("Data refresh complete in {:.1}s", elapsed.as_secs_f64());

        Ok(RefreshOutcome {
            markets: markets.len(),
            with_history: histories.len(),
            correlations: links.len(),
            elapsed,
        })
    }
}

fn truncated(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_without_metadata() {
        let store = Arc::new(MarketStore::new_in_memory().unwrap());
        let service = RefreshService::new(
            PolymarketClient::new(),
            None,
            store,
            RefreshConfig::default(),
        );
        assert!(service.is_stale());
    }

    #[test]
    fn test_staleness_tracks_interval() {
        let store = Arc::new(MarketStore::new_in_memory().unwrap());
        let service = RefreshService::new(
            PolymarketClient::new(),
            None,
            Arc::clone(&store),
            RefreshConfig::default(),
        );

        store
            .set_metadata("last_refresh", &Utc::now().to_rfc3339())
            .unwrap();
        assert!(!service.is_stale());

        let old = Utc::now() - chrono::Duration::hours(2);
        store.set_metadata("last_refresh", &old.to_rfc3339()).unwrap();
        assert!(service.is_stale());

        store.set_metadata("last_refresh", "not a timestamp").unwrap();
        assert!(service.is_stale());
    }
}
