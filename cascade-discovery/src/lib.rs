//! LLM-mediated relationship discovery
//!
//! Two-pass pipeline over a candidate market pool:
//!   Pass 1 asks a reasoning model which market categories could be causally
//!   affected by the leader's outcome; Pass 2 extracts concrete
//!   leader -> follower relationships from category-filtered candidates in
//!   batches. Free-text model output is reconciled back to exact market
//!   records by fuzzy matching.
//!
//! Every run streams typed progress events (`step` / `result` / `error` /
//! `done`) so transport layers can relay a live log to consumers.

pub mod orchestrator;
pub mod passes;
pub mod progress;
pub mod similarity;

pub use orchestrator::{
    active_categories, discover_followers, reconcile_relationships, DiscoveryConfig,
    DEFAULT_MIN_VOLUME,
};
pub use passes::{
    discover_relationships, prefilter_categories, CategoryPrefilter, RawRelationship, BATCH_SIZE,
};
pub use progress::{Cancelled, Emitter};
pub use similarity::{best_match, similarity_ratio, FUZZY_MATCH_THRESHOLD};
