//! Timestamp alignment of price histories

use cascade_core::PricePoint;
use std::collections::{BTreeMap, HashMap};

/// Intersect two price histories by timestamp.
///
/// Returns two equal-length price sequences containing only the timestamps
/// present in both inputs, in ascending timestamp order. No timestamp appears
/// twice in the output; if either input is empty the output is empty.
///
/// Unaligned series must never be compared directly — every correlation
/// computation goes through this first.
pub fn align_by_timestamp(a: &[PricePoint], b: &[PricePoint]) -> (Vec<f64>, Vec<f64>) {
    if a.is_empty() || b.is_empty() {
        return (Vec::new(), Vec::new());
    }

    // BTreeMap gives ascending iteration and collapses duplicate timestamps.
    let map_a: BTreeMap<i64, f64> = a.iter().map(|p| (p.timestamp, p.price)).collect();
    let map_b: HashMap<i64, f64> = b.iter().map(|p| (p.timestamp, p.price)).collect();

    let mut prices_a = Vec::new();
    let mut prices_b = Vec::new();

    for (timestamp, price_a) in &map_a {
        if let Some(price_b) = map_b.get(timestamp) {
            prices_a.push(*price_a);
            prices_b.push(*price_b);
        }
    }

    (prices_a, prices_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(points: &[(i64, f64)]) -> Vec<PricePoint> {
        points
            .iter()
            .map(|(t, p)| PricePoint::new(*t, *p))
            .collect()
    }

    #[test]
    fn test_align_keeps_only_shared_timestamps() {
        let a = history(&[(100, 0.4), (200, 0.5), (300, 0.6)]);
        let b = history(&[(200, 0.7), (300, 0.8), (400, 0.9)]);

        let (prices_a, prices_b) = align_by_timestamp(&a, &b);

        assert_eq!(prices_a, vec![0.5, 0.6]);
        assert_eq!(prices_b, vec![0.7, 0.8]);
    }

    #[test]
    fn test_align_no_common_timestamps() {
        let a = history(&[(100, 0.4), (200, 0.5)]);
        let b = history(&[(150, 0.7), (250, 0.8)]);

        let (prices_a, prices_b) = align_by_timestamp(&a, &b);

        assert!(prices_a.is_empty());
        assert!(prices_b.is_empty());
    }

    #[test]
    fn test_align_empty_input() {
        let a = history(&[(100, 0.4)]);

        let (prices_a, prices_b) = align_by_timestamp(&a, &[]);
        assert!(prices_a.is_empty());
        assert!(prices_b.is_empty());

        let (prices_a, prices_b) = align_by_timestamp(&[], &a);
        assert!(prices_a.is_empty());
        assert!(prices_b.is_empty());
    }

    #[test]
    fn test_align_deduplicates_timestamps() {
        // Duplicate timestamps collapse to a single aligned entry.
        let a = history(&[(100, 0.4), (100, 0.45), (200, 0.5)]);
        let b = history(&[(100, 0.6), (200, 0.7)]);

        let (prices_a, prices_b) = align_by_timestamp(&a, &b);

        assert_eq!(prices_a.len(), 2);
        assert_eq!(prices_b.len(), 2);
    }

    #[test]
    fn test_align_output_is_ascending() {
        // Out-of-order inputs still align in ascending timestamp order.
        let a = history(&[(300, 0.6), (100, 0.4), (200, 0.5)]);
        let b = history(&[(200, 0.7), (100, 0.8), (300, 0.9)]);

        let (prices_a, prices_b) = align_by_timestamp(&a, &b);

        assert_eq!(prices_a, vec![0.4, 0.5, 0.6]);
        assert_eq!(prices_b, vec![0.8, 0.7, 0.9]);
    }
}
