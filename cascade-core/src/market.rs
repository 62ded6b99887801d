//! Market and price-history data structures

use serde::{Deserialize, Serialize};

/// A single point in a market's price history.
///
/// Timestamps are unix seconds; prices are probabilities in [0, 1].
/// The CLOB API encodes these as `{"t": ..., "p": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix timestamp in seconds
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// YES price (0.00 - 1.00, represents probability)
    #[serde(rename = "p")]
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: i64, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Market category assigned by LLM classification.
///
/// The set is fixed; anything the classifier returns outside of it collapses
/// to `Other`. Once a market has a real category it is never downgraded back
/// to `Other` (see the store's upsert rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Politics,
    Sports,
    Finance,
    Crypto,
    Geopolitics,
    Earnings,
    Tech,
    Culture,
    World,
    Economy,
    Elections,
    Mentions,
    Other,
}

// Lenient on input: anything outside the fixed set becomes `Other` instead of
// failing deserialization, since upstream data is not under our control.
impl<'de> serde::Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Category::from_label_lossy(&label))
    }
}

impl Category {
    /// Every real category, in the order presented to the classifier.
    /// `Other` is the catch-all and deliberately not listed.
    pub const ALL: [Category; 12] = [
        Category::Politics,
        Category::Sports,
        Category::Finance,
        Category::Crypto,
        Category::Geopolitics,
        Category::Earnings,
        Category::Tech,
        Category::Culture,
        Category::World,
        Category::Economy,
        Category::Elections,
        Category::Mentions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "Politics",
            Category::Sports => "Sports",
            Category::Finance => "Finance",
            Category::Crypto => "Crypto",
            Category::Geopolitics => "Geopolitics",
            Category::Earnings => "Earnings",
            Category::Tech => "Tech",
            Category::Culture => "Culture",
            Category::World => "World",
            Category::Economy => "Economy",
            Category::Elections => "Elections",
            Category::Mentions => "Mentions",
            Category::Other => "Other",
        }
    }

    /// Parse a label into a known category. Unknown labels return `None`
    /// so callers can decide between rejecting and falling back to `Other`.
    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == label.trim())
    }

    /// Parse a label, collapsing anything unrecognized to `Other`.
    pub fn from_label_lossy(label: &str) -> Category {
        Category::from_label(label).unwrap_or(Category::Other)
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A prediction market in the analysis universe.
///
/// This is the normalized record the engine works with; raw Gamma API
/// responses are converted to this shape once, at the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Unique identifier on the platform
    pub id: String,

    /// The market question
    pub name: String,

    /// URL slug
    #[serde(default)]
    pub slug: String,

    /// Assigned category
    #[serde(default)]
    pub category: Category,

    /// Total traded volume in USD
    pub volume: f64,

    /// Current YES probability (0.00 - 1.00)
    pub probability: f64,

    /// CLOB token ID for the YES outcome, used for price-history lookups
    #[serde(default)]
    pub clob_token_id: String,

    /// Market start date as reported by the platform (left unparsed;
    /// several formats occur in the wild)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    /// Market end / resolution date as reported by the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,

    /// Whether the market has closed
    #[serde(default)]
    pub closed: bool,
}
