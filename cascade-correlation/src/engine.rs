//! All-pairs correlation sweep and link pruning

use crate::align::align_by_timestamp;
use crate::stats::{log_returns, pearson, variance};
use cascade_core::{CorrelationLink, Inefficiency, Market, PricePoint};
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Minimum aligned price points for a pair to be scored at all.
pub const MIN_ALIGNED_POINTS: usize = 10;

/// Minimum return observations (aligned points minus one).
const MIN_RETURN_SAMPLES: usize = 9;

/// Stagnant-market filter: both sides need at least this much return variance.
pub const MIN_VARIANCE: f64 = 0.001;

/// Minimum |r| to create a link.
pub const CORRELATION_THRESHOLD: f64 = 0.5;

/// Per-market cap on retained links.
pub const MAX_LINKS_PER_NODE: usize = 5;

// Inefficiency tag: strongly correlated pairs whose probabilities diverge.
const HIGH_INEFFICIENCY_CORRELATION: f64 = 0.6;
const HIGH_INEFFICIENCY_PROB_GAP: f64 = 0.3;

/// Compute the pruned correlation graph for a market universe.
///
/// Pure and deterministic given its inputs. Markets without an entry in
/// `histories` are skipped. This is the dominant cost of a refresh cycle
/// (O(N^2) pairs, O(history length) per pair) and is meant to run as a batch
/// job decoupled from request serving.
pub fn compute_correlations(
    markets: &[Market],
    histories: &HashMap<String, Vec<PricePoint>>,
) -> Vec<CorrelationLink> {
    let probabilities: HashMap<&str, f64> = markets
        .iter()
        .map(|m| (m.id.as_str(), m.probability))
        .collect();

    let ids: Vec<&str> = markets
        .iter()
        .filter(|m| histories.contains_key(&m.id))
        .map(|m| m.id.as_str())
        .collect();

    let mut candidates = Vec::new();

    for (id_a, id_b) in ids.iter().copied().tuple_combinations() {
        if let Some(link) = score_pair(id_a, id_b, &histories[id_a], &histories[id_b], &probabilities)
        {
            candidates.push(link);
        }
    }

    debug!(
        markets = ids.len(),
        candidates = candidates.len(),
        "scored all market pairs"
    );

    prune_links(candidates)
}

/// Score a single market pair, returning a link only when every gate passes.
fn score_pair(
    id_a: &str,
    id_b: &str,
    history_a: &[PricePoint],
    history_b: &[PricePoint],
    probabilities: &HashMap<&str, f64>,
) -> Option<CorrelationLink> {
    let (prices_a, prices_b) = align_by_timestamp(history_a, history_b);

    if prices_a.len() < MIN_ALIGNED_POINTS {
        return None;
    }

    let returns_a = log_returns(&prices_a);
    let returns_b = log_returns(&prices_b);

    if returns_a.len() < MIN_RETURN_SAMPLES {
        return None;
    }

    // Stagnant market filter
    if variance(&returns_a) < MIN_VARIANCE || variance(&returns_b) < MIN_VARIANCE {
        return None;
    }

    let correlation = pearson(&returns_a, &returns_b);
    if correlation.abs() <= CORRELATION_THRESHOLD {
        return None;
    }

    let prob_gap = match (probabilities.get(id_a), probabilities.get(id_b)) {
        (Some(a), Some(b)) => (a - b).abs(),
        _ => 0.0,
    };
    let inefficiency =
        if correlation.abs() > HIGH_INEFFICIENCY_CORRELATION && prob_gap > HIGH_INEFFICIENCY_PROB_GAP {
            Inefficiency::High
        } else {
            Inefficiency::Low
        };

    Some(CorrelationLink::new(id_a, id_b, correlation, inefficiency))
}

/// Keep, for each market, its strongest [`MAX_LINKS_PER_NODE`] incident links
/// by |correlation|. A link survives if it ranks in the top list of either
/// endpoint. Output is deduplicated by unordered pair.
pub fn prune_links(candidates: Vec<CorrelationLink>) -> Vec<CorrelationLink> {
    let mut kept: BTreeSet<usize> = BTreeSet::new();

    {
        let mut adjacency: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, link) in candidates.iter().enumerate() {
            adjacency.entry(link.source_id.as_str()).or_default().push(idx);
            adjacency.entry(link.target_id.as_str()).or_default().push(idx);
        }

        // Sorted node order keeps the output deterministic across runs.
        let mut node_ids: Vec<&str> = adjacency.keys().copied().collect();
        node_ids.sort_unstable();

        for id in node_ids {
            let mut incident = adjacency[id].clone();
            incident.sort_by(|a, b| {
                candidates[*b]
                    .correlation
                    .abs()
                    .partial_cmp(&candidates[*a].correlation.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            kept.extend(incident.into_iter().take(MAX_LINKS_PER_NODE));
        }
    }

    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    candidates
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| kept.contains(idx))
        .map(|(_, link)| link)
        .filter(|link| seen.insert(link.pair_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(id: &str, probability: f64) -> Market {
        Market {
            id: id.to_string(),
            name: format!("Market {}", id),
            slug: id.to_string(),
            category: cascade_core::Category::Other,
            volume: 500_000.0,
            probability,
            clob_token_id: format!("token-{}", id),
            start_date: None,
            end_date: None,
            closed: false,
        }
    }

    /// A zig-zag series with plenty of return variance.
    fn active_history(n: usize) -> Vec<PricePoint> {
        (0..n)
            .map(|i| {
                let price = if i % 2 == 0 { 0.3 } else { 0.6 };
                PricePoint::new(i as i64 * 3600, price)
            })
            .collect()
    }

    /// The mirror image of `active_history` — perfectly anti-correlated.
    fn inverse_history(n: usize) -> Vec<PricePoint> {
        (0..n)
            .map(|i| {
                let price = if i % 2 == 0 { 0.6 } else { 0.3 };
                PricePoint::new(i as i64 * 3600, price)
            })
            .collect()
    }

    fn link(a: &str, b: &str, correlation: f64) -> CorrelationLink {
        CorrelationLink::new(a, b, correlation, Inefficiency::Low)
    }

    #[test]
    fn test_correlated_pair_creates_link() {
        let markets = vec![market("a", 0.5), market("b", 0.5)];
        let mut histories = HashMap::new();
        histories.insert("a".to_string(), active_history(12));
        histories.insert("b".to_string(), active_history(12));

        let links = compute_correlations(&markets, &histories);

        assert_eq!(links.len(), 1);
        assert!((links[0].correlation - 1.0).abs() < 1e-9);
        assert_eq!(links[0].source_id, "a");
        assert_eq!(links[0].target_id, "b");
    }

    #[test]
    fn test_minimum_sample_gate() {
        // 9 aligned points is one short of the gate: no link regardless of values.
        let markets = vec![market("a", 0.5), market("b", 0.5)];
        let mut histories = HashMap::new();
        histories.insert("a".to_string(), active_history(9));
        histories.insert("b".to_string(), active_history(9));

        assert!(compute_correlations(&markets, &histories).is_empty());
    }

    #[test]
    fn test_stagnant_market_filter() {
        let flat: Vec<PricePoint> = (0..12)
            .map(|i| PricePoint::new(i as i64 * 3600, 0.5))
            .collect();
        let markets = vec![market("a", 0.5), market("b", 0.5)];
        let mut histories = HashMap::new();
        histories.insert("a".to_string(), flat.clone());
        histories.insert("b".to_string(), flat);

        assert!(compute_correlations(&markets, &histories).is_empty());
    }

    #[test]
    fn test_missing_history_is_skipped() {
        let markets = vec![market("a", 0.5), market("b", 0.5)];
        let mut histories = HashMap::new();
        histories.insert("a".to_string(), active_history(12));

        assert!(compute_correlations(&markets, &histories).is_empty());
    }

    #[test]
    fn test_inefficiency_tagging() {
        let mut histories = HashMap::new();
        histories.insert("a".to_string(), active_history(12));
        histories.insert("b".to_string(), inverse_history(12));

        // Wide probability gap + |r| > 0.6 -> High
        let markets = vec![market("a", 0.9), market("b", 0.2)];
        let links = compute_correlations(&markets, &histories);
        assert_eq!(links.len(), 1);
        assert!(links[0].correlation < -0.9);
        assert_eq!(links[0].inefficiency, Inefficiency::High);

        // Narrow gap -> Low
        let markets = vec![market("a", 0.5), market("b", 0.45)];
        let links = compute_correlations(&markets, &histories);
        assert_eq!(links[0].inefficiency, Inefficiency::Low);
    }

    #[test]
    fn test_prune_drops_links_outside_both_top_lists() {
        // Hub h has 7 incident links with descending strength. Each leaf also
        // has five stronger links, so a hub link survives only through the
        // hub's own top-5.
        let mut candidates = Vec::new();
        for i in 1..=7 {
            candidates.push(link("h", &format!("l{}", i), 0.95 - i as f64 * 0.04));
        }
        for i in 1..=7 {
            for j in 1..=5 {
                candidates.push(link(&format!("l{}", i), &format!("m{}", j), 0.99));
            }
        }

        let pruned = prune_links(candidates);

        let hub_links: Vec<_> = pruned
            .iter()
            .filter(|l| l.source_id == "h" || l.target_id == "h")
            .collect();
        assert_eq!(hub_links.len(), MAX_LINKS_PER_NODE);
        assert!(hub_links
            .iter()
            .all(|l| l.correlation > 0.95 - 5.0 * 0.04 - 1e-9));
    }

    #[test]
    fn test_prune_never_duplicates_pairs() {
        let candidates = vec![
            link("a", "b", 0.8),
            link("b", "a", 0.8), // same unordered pair
            link("a", "c", 0.7),
        ];

        let pruned = prune_links(candidates);

        let mut keys: Vec<_> = pruned.iter().map(|l| l.pair_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), pruned.len());
    }

    #[test]
    fn test_compute_correlations_is_deterministic() {
        let markets: Vec<Market> = (0..4).map(|i| market(&format!("m{}", i), 0.5)).collect();
        let mut histories = HashMap::new();
        for m in &markets {
            histories.insert(m.id.clone(), active_history(15));
        }

        let first = compute_correlations(&markets, &histories);
        let second = compute_correlations(&markets, &histories);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.pair_key(), b.pair_key());
            assert_eq!(a.correlation, b.correlation);
        }
    }
}
