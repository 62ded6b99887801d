//! LLM-backed market category classification

use crate::client::{OpenAiClient, CLASSIFIER_MODEL};
use cascade_core::Category;
use tracing::warn;

/// Classifies market questions into the fixed [`Category`] set.
///
/// Classification failures are deliberately non-fatal: a market that cannot
/// be classified lands in `Other` and can be re-classified on a later refresh
/// (the store never overwrites a real category with `Other`).
#[derive(Debug, Clone)]
pub struct MarketClassifier {
    client: OpenAiClient,
}

impl MarketClassifier {
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client: client.with_model(CLASSIFIER_MODEL),
        }
    }

    /// Classify a market question, collapsing any failure to `Other`.
    pub async fn classify(&self, question: &str) -> Category {
        let categories = Category::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "Classify this prediction market question into exactly one of these categories:\n\
             {categories}\n\n\
             Market question: \"{question}\"\n\n\
             Respond with ONLY the category name, nothing else."
        );

        match self.client.chat_text(&prompt, 20).await {
            Ok(answer) => match Category::from_label(&answer) {
                Some(category) => category,
                None => {
                    warn!(answer = %answer.trim(), "classifier returned unknown category");
                    Category::Other
                }
            },
            Err(e) => {
                warn!("classification failed: {}", e);
                Category::Other
            }
        }
    }
}
