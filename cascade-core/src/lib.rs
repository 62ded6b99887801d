//! Core types for the Cascade market-correlation engine
//!
//! This crate defines the shared data structures used across the workspace:
//! market records, price points, correlation links, follower relationships,
//! and the progress-event vocabulary consumed by streaming endpoints.

pub mod correlation;
pub mod discovery;
pub mod error;
pub mod event;
pub mod market;
pub mod provider;

pub use correlation::{CorrelationLink, Inefficiency};
pub use discovery::{Follower, RelationshipType};
pub use error::{CascadeError, CascadeResult};
pub use event::ProgressEvent;
pub use market::{Category, Market, PricePoint};
pub use provider::PriceHistoryProvider;
