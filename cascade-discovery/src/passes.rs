//! The two LLM passes: category prefiltering and relationship extraction

use crate::progress::{Cancelled, Emitter};
use cascade_core::{CascadeResult, Category, RelationshipType};
use cascade_llm::OpenAiClient;
use itertools::Itertools;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Candidate questions per relationship-extraction call. Prompt size and
/// model attention both degrade with very large candidate lists.
pub const BATCH_SIZE: usize = 150;

/// Attempts per LLM call when rate limited.
const MAX_LLM_ATTEMPTS: u32 = 3;

/// Linear backoff base: waits are 10s, 20s.
const BACKOFF_BASE_SECS: u64 = 10;

/// Result of the Pass 1 category prefilter.
#[derive(Debug, Clone)]
pub struct CategoryPrefilter {
    /// Categories the model selected, validated against the supplied set
    pub categories: Vec<Category>,
    /// The model's explanation, surfaced to consumers as-is
    pub reasoning: String,
}

/// A follower relationship as the model stated it, before reconciliation
/// against the candidate pool.
#[derive(Debug, Clone)]
pub struct RawRelationship {
    /// The follower question as restated by the model
    pub question: String,
    /// Clamped into [0, 1]; 0.5 when missing or non-numeric
    pub confidence_score: f64,
    pub is_same_outcome: bool,
    pub relationship_type: RelationshipType,
    pub rationale: String,
}

/// Make a strict-JSON chat call, retrying on rate limits with linear backoff.
///
/// A `step` event is emitted before each wait so consumers see why the run
/// has stalled. The outer `Result` is cancellation (consumer hung up); the
/// inner one is the call outcome after retries are exhausted.
pub(crate) async fn chat_json_with_backoff(
    llm: &OpenAiClient,
    system_prompt: &str,
    user_prompt: &str,
    emitter: &Emitter,
) -> Result<CascadeResult<Value>, Cancelled> {
    let mut attempt = 1u32;
    loop {
        match llm.chat_json(system_prompt, user_prompt).await {
            Err(e) if e.is_rate_limited() && attempt < MAX_LLM_ATTEMPTS => {
                let wait = BACKOFF_BASE_SECS * u64::from(attempt);
                emitter
                    .step(format!(
                        "Rate limit hit, retrying ({}/{}) in {}s...",
                        attempt, MAX_LLM_ATTEMPTS, wait
                    ))
                    .await?;
                tokio::time::sleep(Duration::from_secs(wait)).await;
                attempt += 1;
            }
            other => return Ok(other),
        }
    }
}

/// Pass 1: ask the model which of the observed categories could be causally
/// affected by the leader's outcome.
///
/// Hallucinated category names are silently dropped — only categories present
/// in `available` survive validation.
pub async fn prefilter_categories(
    llm: &OpenAiClient,
    leader_question: &str,
    available: &[Category],
    emitter: &Emitter,
) -> Result<CascadeResult<CategoryPrefilter>, Cancelled> {
    let categories_str = available.iter().map(|c| format!("\"{}\"", c)).join(", ");

    let system_prompt = "You are a world-class analyst with deep expertise in geopolitics, \
        economics, finance, technology, and prediction markets. You understand how events \
        cascade across domains — how a crypto price movement can affect regulatory policy, \
        how an election outcome can shift monetary policy, how tech earnings can signal \
        broader economic trends. Think deeply about first, second, and third-order effects.";

    let user_prompt = format!(
        r#"Given this prediction market, identify which categories of other markets could be DIRECTLY and MEANINGFULLY affected by its outcome.

Market: "{leader_question}"

The available market categories are: [{categories_str}]

Think step by step:
1. What is this market fundamentally about?
2. What are the 2-4 categories most directly affected by this market's outcome?
3. Are there any additional categories with strong, concrete causal links (not vague, speculative ones)?

IMPORTANT — Be selective and precise:
- Only include a category if you can articulate a clear, specific causal mechanism from this market to that category.
- Do NOT include categories with only vague, tenuous, or highly speculative connections.
- A good filter selects 3-6 categories, not all of them. If you're selecting more than 6, you're not being selective enough.
- "Other" should only be included if there's a genuine reason, not by default.

You MUST only select from the categories listed above. Do not invent new categories.

Return a JSON object with:
- "categories": An array of the most relevant categories (typically 3-6).
- "reasoning": A brief explanation of your thinking, especially for the less obvious connections.

Return JSON: {{"categories": [...], "reasoning": "..."}}"#
    );

    let value = match chat_json_with_backoff(llm, system_prompt, &user_prompt, emitter).await? {
        Ok(value) => value,
        Err(e) => return Ok(Err(e)),
    };

    let returned: Vec<&str> = value
        .get("categories")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let categories: Vec<Category> = returned
        .iter()
        .filter_map(|label| Category::from_label(label))
        .filter(|c| available.contains(c))
        .collect();

    debug!(
        returned = returned.len(),
        valid = categories.len(),
        "category prefilter validated"
    );

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Ok(CategoryPrefilter {
        categories,
        reasoning,
    }))
}

/// Pass 2: extract leader -> follower relationships from one batch of
/// candidate questions.
pub async fn discover_relationships(
    llm: &OpenAiClient,
    leader_question: &str,
    batch: &[String],
    emitter: &Emitter,
) -> Result<CascadeResult<Vec<RawRelationship>>, Cancelled> {
    let market_list = batch
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .join("\n");

    let system_prompt = "You are a precise analyst of prediction markets. You identify only \
        strong, meaningful causal relationships — not speculative or tenuous ones. Quality \
        over quantity: a short list of strong connections is far more valuable than a long \
        list of weak ones.";

    let user_prompt = format!(
        r#"Given a "leader" market, identify which of the candidate markets below are true "followers" — meaning the leader's outcome would MEANINGFULLY change the probability of the follower.

Leader Market: "{leader_question}"

Candidate Markets:
{market_list}

RULES — Apply these strictly:

1. DIRECTIONALITY: The causal arrow must flow FROM the leader TO the follower. If a candidate influences the leader but not vice versa, exclude it.
   - CORRECT: Leader "Will Trump win?" → Follower "Will the Paris Climate Agreement survive?"
   - WRONG: Leader "Will Bitcoin hit $100k?" → Follower "Will the US strike Iran?"

2. STRENGTH: Only include followers where the leader's outcome would cause a NOTABLE shift in the follower's probability (roughly >5%). Vague, speculative, or "everything is connected" reasoning is not sufficient.

3. SELECTIVITY: From {count} candidates, you should typically find 0-8 genuine followers. Most candidates will NOT be followers. It is perfectly fine to return an empty list if no strong connections exist. Do NOT pad the list with weak relationships.

4. CONFIDENCE SCORES: Be honest with scores. Reserve 0.8+ for direct, obvious causal links. Most indirect relationships should be 0.4-0.7. If you'd score something below 0.3, don't include it at all.

For each follower, provide:
- question: The exact text of the follower market question as given above
- confidence_score: 0.0-1.0
- is_same_outcome: true if outcomes tend to move together, false if opposite
- relationship_type: "direct" or "indirect"
- rationale: The specific causal mechanism from leader to follower (1-2 sentences)

Return JSON:
{{"followers": [
    {{"question": "...", "confidence_score": 0.85, "is_same_outcome": true, "relationship_type": "direct", "rationale": "..."}},
    ...
]}}"#,
        count = batch.len(),
    );

    let value = match chat_json_with_backoff(llm, system_prompt, &user_prompt, emitter).await? {
        Ok(value) => value,
        Err(e) => return Ok(Err(e)),
    };

    let relationships = value
        .get("followers")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(parse_relationship).collect())
        .unwrap_or_default();

    Ok(Ok(relationships))
}

/// Parse one follower entry from model output, tolerating missing or
/// malformed fields. Entries without a question string are dropped.
fn parse_relationship(item: &Value) -> Option<RawRelationship> {
    let question = item.get("question")?.as_str()?.to_string();

    let relationship_type = match item.get("relationship_type").and_then(Value::as_str) {
        Some("indirect") => RelationshipType::Indirect,
        _ => RelationshipType::Direct,
    };

    Some(RawRelationship {
        question,
        confidence_score: clamp_confidence(item.get("confidence_score")),
        is_same_outcome: item
            .get("is_same_outcome")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        relationship_type,
        rationale: item
            .get("rationale")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

/// Clamp a model-supplied confidence into [0, 1].
///
/// Missing, non-numeric, and non-finite values all default to 0.5; numeric
/// strings are accepted since models occasionally quote their numbers.
pub fn clamp_confidence(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.5),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.5),
        _ => 0.5,
    };

    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.5
    }
}
