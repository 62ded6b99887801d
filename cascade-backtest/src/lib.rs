//! Backtest engines for discovered leader/follower relationships
//!
//! Two modes share the discovery pipeline and the nearest-price primitives:
//!
//! - **Threshold mode**: the signal is the first point in the leader's
//!   history at or above a probability threshold; each follower trade exits
//!   after a configurable holding period (or at resolution).
//! - **Resolution-shock mode**: the signal is the leader's parsed resolution
//!   date; P&L is measured at fixed horizons (5m, 1h, 1d, 1w) after it.
//!
//! Both stream the same `step`/`result`/`error`/`done` event vocabulary as
//! the discovery orchestrator.

pub mod engine;
pub mod pricing;
pub mod timeframe;
pub mod trade;

pub use engine::{
    run_resolution_shock, run_threshold, BacktestConfig, FollowerSource, ThresholdParams,
};
pub use pricing::{find_nearest_price, find_threshold_signal, parse_end_date, ThresholdSignal};
pub use timeframe::{HoldPeriod, Timeframe};
pub use trade::{
    pnl_percent, summarize_resolution, summarize_threshold, BacktestSummary, BacktestTrade,
    Direction, PnlStats, TradeStatus,
};
