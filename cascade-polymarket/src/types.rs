//! Polymarket API response types
//!
//! These mirror the Gamma API wire format and are converted to cascade-core
//! types for use in the rest of the workspace.

use cascade_core::{Category, Market, PricePoint};
use serde::{Deserialize, Serialize};

/// A market from the Gamma API.
///
/// The API is loosely typed: numbers arrive as strings, lists arrive as
/// JSON-encoded strings. Parsing helpers below absorb the variations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    /// Unique identifier
    pub id: String,

    /// Market question
    #[serde(default)]
    pub question: Option<String>,

    /// URL slug
    #[serde(default)]
    pub slug: Option<String>,

    /// Category as reported by the platform (often absent; Cascade assigns
    /// its own via LLM classification)
    #[serde(default)]
    pub category: Option<String>,

    /// Total volume as a decimal string
    #[serde(default)]
    pub volume: Option<String>,

    /// Numeric volume (some responses have this instead)
    #[serde(default)]
    pub volume_num: Option<f64>,

    /// Outcome prices as a JSON string, e.g. `"[\"0.65\", \"0.35\"]"`
    #[serde(default)]
    pub outcome_prices: Option<String>,

    /// CLOB token IDs as a JSON string, e.g. `"[\"123...\", \"456...\"]"`
    #[serde(default)]
    pub clob_token_ids: Option<String>,

    /// Market start date
    #[serde(default)]
    pub start_date: Option<String>,

    /// Market end date
    #[serde(default)]
    pub end_date: Option<String>,

    /// Whether the market is active
    #[serde(default)]
    pub active: Option<bool>,

    /// Whether the market is closed
    #[serde(default)]
    pub closed: Option<bool>,
}

impl GammaMarket {
    /// Parse volume, preferring the numeric field when present.
    pub fn parse_volume(&self) -> f64 {
        if let Some(v) = self.volume_num {
            return v;
        }

        self.volume
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }

    /// Parse the YES probability from `outcomePrices`.
    ///
    /// Handles string arrays, number arrays, and percentage-scaled values
    /// (> 1 gets divided by 100). Defaults to 0.5 when absent or unparseable.
    pub fn parse_probability(&self) -> f64 {
        let raw = match self.first_outcome_price() {
            Some(p) => p,
            None => return 0.5,
        };

        let prob = if raw > 1.0 { raw / 100.0 } else { raw };
        prob.clamp(0.0, 1.0)
    }

    fn first_outcome_price(&self) -> Option<f64> {
        let prices_str = self.outcome_prices.as_deref()?;
        Self::parse_price_list(prices_str)?.first().copied()
    }

    fn parse_price_list(prices_str: &str) -> Option<Vec<f64>> {
        // String array is the common format
        if let Ok(prices) = serde_json::from_str::<Vec<String>>(prices_str) {
            return Some(prices.iter().filter_map(|p| p.parse().ok()).collect());
        }

        if let Ok(prices) = serde_json::from_str::<Vec<f64>>(prices_str) {
            return Some(prices);
        }

        None
    }

    /// The CLOB token ID of the YES outcome (index 0 by convention).
    pub fn yes_token_id(&self) -> Option<String> {
        let raw = self.clob_token_ids.as_deref()?;
        let ids: Vec<String> = serde_json::from_str(raw).ok()?;
        ids.into_iter().next().filter(|id| !id.is_empty())
    }

    /// For closed markets: which outcome won, if it resolved decisively.
    pub fn resolved_outcome(&self) -> Option<&'static str> {
        let prices = Self::parse_price_list(self.outcome_prices.as_deref()?)?;
        if prices.len() < 2 {
            return None;
        }

        if prices[0] > 0.95 {
            Some("Yes")
        } else if prices[1] > 0.95 {
            Some("No")
        } else {
            None
        }
    }

    /// Convert to a normalized [`Market`] record.
    ///
    /// Returns `None` for markets without a question or a CLOB token, which
    /// cannot participate in any analysis. The category defaults to `Other`
    /// until the classifier has run.
    pub fn to_market(&self) -> Option<Market> {
        let name = self.question.clone()?;
        let clob_token_id = self.yes_token_id()?;

        Some(Market {
            id: self.id.clone(),
            name,
            slug: self.slug.clone().unwrap_or_default(),
            category: Category::Other,
            volume: self.parse_volume(),
            probability: self.parse_probability(),
            clob_token_id,
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            closed: self.closed.unwrap_or(false),
        })
    }
}

/// Response wrapper from the CLOB `/prices-history` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PricesHistoryResponse {
    #[serde(default)]
    pub history: Vec<PricePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gamma(json: serde_json::Value) -> GammaMarket {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_full_market() {
        let market = gamma(serde_json::json!({
            "id": "12345",
            "question": "Will X happen by 2025?",
            "slug": "will-x-happen",
            "volume": "250000.5",
            "outcomePrices": "[\"0.65\", \"0.35\"]",
            "clobTokenIds": "[\"111\", \"222\"]",
            "startDate": "2024-01-01T00:00:00Z",
            "endDate": "2025-01-01T00:00:00Z",
            "active": true,
            "closed": false
        }));

        let converted = market.to_market().unwrap();
        assert_eq!(converted.id, "12345");
        assert_eq!(converted.name, "Will X happen by 2025?");
        assert_eq!(converted.volume, 250000.5);
        assert!((converted.probability - 0.65).abs() < 1e-12);
        assert_eq!(converted.clob_token_id, "111");
        assert!(!converted.closed);
    }

    #[test]
    fn test_parse_number_array_prices() {
        let market = gamma(serde_json::json!({
            "id": "1",
            "question": "Q",
            "outcomePrices": "[0.4, 0.6]",
            "clobTokenIds": "[\"111\"]"
        }));
        assert!((market.parse_probability() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_parse_percentage_scaled_probability() {
        let market = gamma(serde_json::json!({
            "id": "1",
            "question": "Q",
            "outcomePrices": "[\"65\", \"35\"]",
            "clobTokenIds": "[\"111\"]"
        }));
        assert!((market.parse_probability() - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_missing_token_or_question_rejected() {
        let no_token = gamma(serde_json::json!({"id": "1", "question": "Q"}));
        assert!(no_token.to_market().is_none());

        let no_question = gamma(serde_json::json!({"id": "1", "clobTokenIds": "[\"111\"]"}));
        assert!(no_question.to_market().is_none());
    }

    #[test]
    fn test_volume_num_preferred() {
        let market = gamma(serde_json::json!({
            "id": "1",
            "question": "Q",
            "volume": "100",
            "volumeNum": 250.0
        }));
        assert_eq!(market.parse_volume(), 250.0);
    }

    #[test]
    fn test_resolved_outcome() {
        let yes = gamma(serde_json::json!({
            "id": "1", "question": "Q",
            "outcomePrices": "[\"0.99\", \"0.01\"]"
        }));
        assert_eq!(yes.resolved_outcome(), Some("Yes"));

        let no = gamma(serde_json::json!({
            "id": "1", "question": "Q",
            "outcomePrices": "[\"0.02\", \"0.98\"]"
        }));
        assert_eq!(no.resolved_outcome(), Some("No"));

        let unsettled = gamma(serde_json::json!({
            "id": "1", "question": "Q",
            "outcomePrices": "[\"0.55\", \"0.45\"]"
        }));
        assert_eq!(unsettled.resolved_outcome(), None);
    }

    #[test]
    fn test_prices_history_response() {
        let response: PricesHistoryResponse =
            serde_json::from_str(r#"{"history": [{"t": 100, "p": 0.5}, {"t": 200, "p": 0.6}]}"#)
                .unwrap();
        assert_eq!(response.history.len(), 2);
        assert_eq!(response.history[1].timestamp, 200);

        let empty: PricesHistoryResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.history.is_empty());
    }
}
