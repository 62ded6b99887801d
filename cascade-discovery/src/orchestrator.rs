//! Discovery run orchestration
//!
//! Linear state machine: load candidates, prefilter categories, filter,
//! extract relationships per batch, reconcile and dedupe, rank by confidence.
//! Each transition emits a progress event; the run is cancelled by dropping
//! the returned stream.

use crate::passes::{
    discover_relationships, prefilter_categories, RawRelationship, BATCH_SIZE,
};
use crate::progress::{Cancelled, Emitter};
use crate::similarity::best_match;
use cascade_core::{Category, Follower, Market, ProgressEvent};
use cascade_llm::OpenAiClient;
use futures::Stream;
use itertools::Itertools;
use serde_json::json;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

/// Default volume floor for discovery candidates, in USD.
pub const DEFAULT_MIN_VOLUME: f64 = 10_000.0;

/// Tunables for a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Candidates below this traded volume are not considered
    pub min_volume: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_volume: DEFAULT_MIN_VOLUME,
        }
    }
}

/// Run follower discovery for `leader` over `pool`, streaming progress
/// events. The stream ends with either an `error` or a `done` event carrying
/// `{leader, followers}`.
pub fn discover_followers(
    leader: Market,
    pool: Vec<Market>,
    llm: OpenAiClient,
    config: DiscoveryConfig,
) -> impl Stream<Item = ProgressEvent> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let emitter = Emitter::new(tx);
        // A Cancelled error here means the consumer went away; nothing to do.
        let _ = run_discovery(&emitter, leader, pool, &llm, &config).await;
    });

    ReceiverStream::new(rx)
}

async fn run_discovery(
    emitter: &Emitter,
    leader: Market,
    pool: Vec<Market>,
    llm: &OpenAiClient,
    config: &DiscoveryConfig,
) -> Result<(), Cancelled> {
    emitter.step("Loading candidate markets").await?;

    let candidates: Vec<Market> = pool
        .into_iter()
        .filter(|m| m.id != leader.id && m.volume >= config.min_volume)
        .collect();

    emitter
        .result_with(
            format!(
                "Loaded {} candidate markets (vol >= {})",
                candidates.len(),
                format_usd(config.min_volume)
            ),
            json!({"count": candidates.len()}),
        )
        .await?;
    emitter
        .result_with(format!("Leader: {}", leader.name), json!({"leader": &leader}))
        .await?;

    if candidates.is_empty() {
        emitter
            .done(json!({"leader": &leader, "followers": []}))
            .await?;
        return Ok(());
    }

    // Categories that actually occur among candidates; the model may only
    // pick from these.
    let available = active_categories(&candidates);
    emitter
        .result_with(
            format!(
                "Active categories: {}",
                available.iter().map(Category::as_str).join(", ")
            ),
            json!({"categories": &available}),
        )
        .await?;

    emitter.step("Pass 1: Identifying relevant categories").await?;

    let prefilter = match prefilter_categories(llm, &leader.name, &available, emitter).await? {
        Ok(prefilter) => prefilter,
        Err(e) => {
            emitter.error(format!("Pass 1 failed: {}", e)).await?;
            return Ok(());
        }
    };

    // The leader's own category always stays in play.
    let mut relevant = prefilter.categories;
    if !relevant.contains(&leader.category) {
        relevant.push(leader.category);
    }

    emitter
        .result_with(
            format!(
                "Relevant categories: {}",
                relevant.iter().map(Category::as_str).join(", ")
            ),
            json!({"categories": &relevant, "reasoning": prefilter.reasoning}),
        )
        .await?;

    emitter
        .step("Filtering candidates by relevant categories")
        .await?;

    let relevant_set: HashSet<Category> = relevant.iter().copied().collect();
    let mut filtered: Vec<Market> = candidates
        .iter()
        .filter(|m| relevant_set.contains(&m.category))
        .cloned()
        .collect();

    if filtered.is_empty() {
        emitter
            .result_with(
                "No candidates matched — falling back to all candidates",
                json!({"count": candidates.len()}),
            )
            .await?;
        filtered = candidates;
    } else {
        emitter
            .result_with(
                format!(
                    "{} -> {} candidates after category filter",
                    candidates.len(),
                    filtered.len()
                ),
                json!({"count": filtered.len()}),
            )
            .await?;
    }

    let questions: Vec<String> = filtered.iter().map(|m| m.name.clone()).collect();
    let batches: Vec<&[String]> = questions.chunks(BATCH_SIZE).collect();
    let total_batches = batches.len();

    emitter
        .step(format!(
            "Pass 2: Discovering relationships across {} batch{} ({} candidates)",
            total_batches,
            if total_batches > 1 { "es" } else { "" },
            questions.len()
        ))
        .await?;

    let mut raw: Vec<RawRelationship> = Vec::new();
    for (index, batch) in batches.iter().enumerate() {
        let batch_num = index + 1;
        emitter
            .step(format!(
                "Batch {}/{}: Analyzing {} candidates",
                batch_num,
                total_batches,
                batch.len()
            ))
            .await?;

        match discover_relationships(llm, &leader.name, batch, emitter).await? {
            Ok(found) => {
                emitter
                    .result(format!(
                        "Batch {}/{}: found {} followers",
                        batch_num,
                        total_batches,
                        found.len()
                    ))
                    .await?;
                raw.extend(found);
            }
            // A failed batch is skipped, not fatal — partial results are fine.
            Err(e) => {
                emitter
                    .result(format!(
                        "Batch {}/{}: skipped ({})",
                        batch_num,
                        total_batches,
                        truncate(&e.to_string(), 80)
                    ))
                    .await?;
            }
        }
    }

    if raw.is_empty() {
        emitter
            .result(format!(
                "No potential followers identified across {} batch{}",
                total_batches,
                if total_batches > 1 { "es" } else { "" }
            ))
            .await?;
    }

    emitter
        .step(format!(
            "Matching {} results to market database",
            raw.len()
        ))
        .await?;

    let (followers, skipped) = reconcile_relationships(&raw, &filtered);

    info!(
        leader = %leader.id,
        matched = followers.len(),
        skipped,
        "discovery run reconciled"
    );

    let mut message = format!("Matched {} followers", followers.len());
    if skipped > 0 {
        message.push_str(&format!(
            " ({} skipped — couldn't match to database)",
            skipped
        ));
    }
    emitter
        .result_with(
            message,
            json!({"count": followers.len(), "skipped": skipped}),
        )
        .await?;

    emitter
        .done(json!({"leader": &leader, "followers": followers}))
        .await?;

    Ok(())
}

/// Map model relationships back to exact candidate records.
///
/// Unmatched questions are counted as skipped; the first match per market id
/// wins across batches. Output is ordered by confidence descending.
pub fn reconcile_relationships(
    raw: &[RawRelationship],
    candidates: &[Market],
) -> (Vec<Follower>, usize) {
    let names: Vec<&str> = candidates.iter().map(|m| m.name.as_str()).collect();

    let mut followers: Vec<Follower> = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut skipped = 0;

    for relationship in raw {
        let Some(index) = best_match(&relationship.question, &names) else {
            skipped += 1;
            continue;
        };

        let market = &candidates[index];
        if !seen_ids.insert(market.id.as_str()) {
            continue;
        }

        followers.push(Follower {
            market: market.clone(),
            confidence_score: relationship.confidence_score,
            is_same_outcome: relationship.is_same_outcome,
            relationship_type: relationship.relationship_type,
            rationale: relationship.rationale.clone(),
        });
    }

    followers.sort_by(|a, b| {
        b.confidence_score
            .partial_cmp(&a.confidence_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    (followers, skipped)
}

/// Distinct categories present among candidate markets, sorted by label.
pub fn active_categories(candidates: &[Market]) -> Vec<Category> {
    candidates
        .iter()
        .map(|m| m.category)
        .collect::<HashSet<_>>()
        .into_iter()
        .sorted_by_key(Category::as_str)
        .collect()
}

fn format_usd(amount: f64) -> String {
    let whole = amount.round() as i64;
    let mut digits = whole.abs().to_string();
    let mut grouped = String::new();
    while digits.len() > 3 {
        let split = digits.len() - 3;
        grouped = format!(",{}{}", &digits[split..], grouped);
        digits.truncate(split);
    }
    format!("${}{}{}", if whole < 0 { "-" } else { "" }, digits, grouped)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::RelationshipType;
    use tokio_stream::StreamExt;

    fn market(id: &str, name: &str, category: Category, volume: f64) -> Market {
        Market {
            id: id.to_string(),
            name: name.to_string(),
            slug: id.to_string(),
            category,
            volume,
            probability: 0.5,
            clob_token_id: format!("token-{}", id),
            start_date: None,
            end_date: None,
            closed: false,
        }
    }

    fn raw(question: &str, confidence: f64) -> RawRelationship {
        RawRelationship {
            question: question.to_string(),
            confidence_score: confidence,
            is_same_outcome: true,
            relationship_type: RelationshipType::Direct,
            rationale: String::new(),
        }
    }

    #[tokio::test]
    async fn test_zero_candidates_completes_without_llm_calls() {
        let leader = market("leader", "Will X happen?", Category::Politics, 100_000.0);
        // Pool holds only the leader itself and a market under the floor.
        let pool = vec![
            leader.clone(),
            market("tiny", "Will Y happen?", Category::Politics, 50.0),
        ];

        // Dummy key: the run must finish before any LLM call is made.
        let llm = OpenAiClient::with_api_key("test-key");
        let stream = discover_followers(leader, pool, llm, DiscoveryConfig::default());

        let events: Vec<ProgressEvent> = stream.collect().await;

        let last = events.last().expect("stream should produce events");
        match last {
            ProgressEvent::Done { data } => {
                assert_eq!(data["followers"].as_array().unwrap().len(), 0);
                assert_eq!(data["leader"]["id"], "leader");
            }
            other => panic!("expected done event, got {:?}", other),
        }
    }

    #[test]
    fn test_reconcile_dedupes_and_ranks() {
        let candidates = vec![
            market("a", "Will the Fed cut rates in March?", Category::Economy, 20_000.0),
            market("b", "Will BTC hit $100k this year?", Category::Crypto, 20_000.0),
        ];

        let raw_relationships = vec![
            raw("Will the Fed cut rates in March?", 0.4),
            // Second batch restated the same market — first match wins.
            raw("Will the Fed cut rates in march", 0.9),
            raw("Will BTC hit $100k this year?", 0.8),
            raw("completely unrelated gibberish zzz", 0.99),
        ];

        let (followers, skipped) = reconcile_relationships(&raw_relationships, &candidates);

        assert_eq!(followers.len(), 2);
        assert_eq!(skipped, 1);
        // Ranked by confidence descending
        assert_eq!(followers[0].market.id, "b");
        assert!((followers[0].confidence_score - 0.8).abs() < 1e-12);
        // The duplicate kept its first-seen confidence
        assert_eq!(followers[1].market.id, "a");
        assert!((followers[1].confidence_score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_active_categories_sorted_distinct() {
        let candidates = vec![
            market("a", "q1", Category::Tech, 1.0),
            market("b", "q2", Category::Crypto, 1.0),
            market("c", "q3", Category::Tech, 1.0),
        ];
        assert_eq!(
            active_categories(&candidates),
            vec![Category::Crypto, Category::Tech]
        );
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(10_000.0), "$10,000");
        assert_eq!(format_usd(1_234_567.0), "$1,234,567");
        assert_eq!(format_usd(999.0), "$999");
    }
}
