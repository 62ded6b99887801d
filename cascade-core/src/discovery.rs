//! Follower relationship types produced by the discovery pipeline

use crate::market::Market;
use serde::{Deserialize, Serialize};

/// How directly the leader's outcome propagates to the follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Direct,
    Indirect,
}

impl Default for RelationshipType {
    fn default() -> Self {
        RelationshipType::Direct
    }
}

/// A market identified as causally downstream of a leader market.
///
/// Confidence is clamped into [0, 1] during reconciliation regardless of what
/// the model returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follower {
    /// The matched market record from the candidate pool
    pub market: Market,

    /// Model confidence in the relationship, clamped to [0, 1]
    pub confidence_score: f64,

    /// True when the two outcomes tend to move together, false when opposite
    pub is_same_outcome: bool,

    #[serde(default)]
    pub relationship_type: RelationshipType,

    /// The causal mechanism from leader to follower, in the model's words
    #[serde(default)]
    pub rationale: String,
}
