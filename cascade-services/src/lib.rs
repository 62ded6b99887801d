//! Storage and orchestration services for Cascade
//!
//! Owns the SQLite market store, the staleness-triggered data refresh cycle
//! (fetch, classify, correlate, persist), and the TTL-cached resolved-market
//! index used by backtest search.

pub mod refresh;
pub mod resolved;
pub mod store;

pub use refresh::{RefreshConfig, RefreshOutcome, RefreshService};
pub use resolved::{ResolvedMarket, ResolvedMarketCache};
pub use store::MarketStore;
