//! Polymarket integration for Cascade
//!
//! Two upstream APIs are involved: the Gamma API serves the market catalog
//! and the CLOB API serves per-token price history. Raw responses are
//! mirrored in [`types`] and converted to `cascade-core` records once, at
//! this boundary.

pub mod client;
pub mod types;

pub use client::{PolymarketClient, CLOB_API_BASE, GAMMA_API_BASE};
pub use types::{GammaMarket, PricesHistoryResponse};
