//! Fuzzy matching of model output back to exact market questions
//!
//! The model restates questions with minor paraphrase and typo drift, so
//! exact string matching would silently drop valid discoveries. We score a
//! normalized matching-subsequence ratio instead and refuse weak pairings.

/// Minimum similarity ratio for a match to count.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.6;

/// Normalized character-sequence similarity between two strings,
/// case-insensitive.
///
/// Returns `2 * M / T` where `M` is the length of the longest common
/// subsequence and `T` the total character count — 1.0 for identical strings,
/// 0.0 for completely disjoint ones.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    2.0 * common_subsequence_len(&a, &b) as f64 / total as f64
}

/// Longest common subsequence length, two-row dynamic programming.
fn common_subsequence_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find the best fuzzy match for `text` among `candidates`.
///
/// Returns the index of the highest-scoring candidate, or `None` when even
/// the best score falls below [`FUZZY_MATCH_THRESHOLD`]. Ties keep the
/// earliest candidate.
pub fn best_match(text: &str, candidates: &[&str]) -> Option<usize> {
    let mut best_score = 0.0f64;
    let mut best_index = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let score = similarity_ratio(text, candidate);
        if score > best_score {
            best_score = score;
            best_index = Some(index);
        }
    }

    if best_score >= FUZZY_MATCH_THRESHOLD {
        best_index
    } else {
        None
    }
}
