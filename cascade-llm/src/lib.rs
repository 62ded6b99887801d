//! OpenAI chat-completion client for the Cascade pipelines
//!
//! A thin reqwest-based client rather than an SDK wrapper: the discovery
//! orchestrator drives its own retry policy off raw HTTP status codes, so the
//! client maps 429 to a typed `RateLimited` error and performs no retries of
//! its own.

pub mod classifier;
pub mod client;

pub use classifier::MarketClassifier;
pub use client::{OpenAiClient, CLASSIFIER_MODEL, DISCOVERY_MODEL};
