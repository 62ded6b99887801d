//! Correlation engine for prediction-market price series
//!
//! Pipeline: align two price histories on shared timestamps, convert to log
//! returns, score with Pearson correlation, then prune the resulting link set
//! so each market keeps only its strongest connections. Everything in this
//! crate is pure and deterministic given its inputs; the O(N^2) all-pairs
//! sweep is intended to run inside a batch refresh job, not per request.

pub mod align;
pub mod engine;
pub mod stats;

pub use align::align_by_timestamp;
pub use engine::{
    compute_correlations, prune_links, CORRELATION_THRESHOLD, MAX_LINKS_PER_NODE,
    MIN_ALIGNED_POINTS, MIN_VARIANCE,
};
pub use stats::{log_returns, pearson, variance, PRICE_FLOOR};
