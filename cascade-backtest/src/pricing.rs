//! Price-lookup and signal-timing primitives

use cascade_core::PricePoint;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Find the price nearest to `target` within `tolerance` seconds.
///
/// "Nearest" means minimum absolute timestamp difference; ties go to the
/// later point. Returns `None` when even the closest point falls outside
/// tolerance.
pub fn find_nearest_price(history: &[PricePoint], target: i64, tolerance: i64) -> Option<f64> {
    let mut best: Option<f64> = None;
    let mut best_diff = i64::MAX;

    for point in history {
        let diff = (point.timestamp - target).abs();
        if diff <= best_diff {
            best_diff = diff;
            best = Some(point.price);
        }
    }

    if best_diff <= tolerance {
        best
    } else {
        None
    }
}

/// Outcome of scanning a leader's history for a threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdSignal {
    /// The first point at or above the threshold
    Crossed { timestamp: i64, price: f64 },
    /// No point reached the threshold; `max_price` is the observed maximum
    NeverReached { max_price: f64 },
}

/// Scan a chronological price history for the first point at or above
/// `threshold`.
pub fn find_threshold_signal(history: &[PricePoint], threshold: f64) -> ThresholdSignal {
    let mut max_price = 0.0f64;

    for point in history {
        if point.price >= threshold {
            return ThresholdSignal::Crossed {
                timestamp: point.timestamp,
                price: point.price,
            };
        }
        max_price = max_price.max(point.price);
    }

    ThresholdSignal::NeverReached { max_price }
}

/// Parse a market end date to a unix timestamp.
///
/// Platforms report several formats; these are tried in order:
/// RFC 3339 with timezone, `%Y-%m-%dT%H:%M:%S`, then date-only `%Y-%m-%d`
/// (midnight UTC).
pub fn parse_end_date(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }

    let head: String = raw.chars().take(19).collect();
    if let Ok(dt) = NaiveDateTime::parse_from_str(&head, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }

    let date: String = raw.chars().take(10).collect();
    if let Ok(d) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }

    None
}

/// Human-readable UTC rendering for progress messages.
pub fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
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
    fn test_nearest_within_tolerance() {
        let h = history(&[(90, 0.40), (110, 0.50)]);
        // Both points sit 10s from the target; the later one wins the tie.
        assert_eq!(find_nearest_price(&h, 100, 15), Some(0.50));
    }

    #[test]
    fn test_nearest_outside_tolerance() {
        let h = history(&[(90, 0.40), (110, 0.50)]);
        assert_eq!(find_nearest_price(&h, 100, 5), None);
    }

    #[test]
    fn test_nearest_empty_history() {
        assert_eq!(find_nearest_price(&[], 100, 1000), None);
    }

    #[test]
    fn test_threshold_signal_crossed() {
        let h = history(&[(0, 0.10), (100, 0.96)]);
        assert_eq!(
            find_threshold_signal(&h, 0.95),
            ThresholdSignal::Crossed {
                timestamp: 100,
                price: 0.96
            }
        );
    }

    #[test]
    fn test_threshold_signal_never_reached() {
        let h = history(&[(0, 0.10), (100, 0.96)]);
        assert_eq!(
            find_threshold_signal(&h, 0.99),
            ThresholdSignal::NeverReached { max_price: 0.96 }
        );
    }

    #[test]
    fn test_threshold_signal_takes_first_crossing() {
        let h = history(&[(0, 0.95), (100, 0.97)]);
        assert_eq!(
            find_threshold_signal(&h, 0.95),
            ThresholdSignal::Crossed {
                timestamp: 0,
                price: 0.95
            }
        );
    }

    #[test]
    fn test_parse_end_date_formats() {
        // RFC 3339 with timezone
        assert_eq!(
            parse_end_date("2024-01-01T00:00:00Z"),
            Some(1_704_067_200)
        );
        assert_eq!(
            parse_end_date("2024-01-01T01:00:00+01:00"),
            Some(1_704_067_200)
        );
        // Naive date-time
        assert_eq!(parse_end_date("2024-01-01T00:00:00"), Some(1_704_067_200));
        // Date only: midnight UTC
        assert_eq!(parse_end_date("2024-01-01"), Some(1_704_067_200));
        // Unparseable
        assert_eq!(parse_end_date(""), None);
        assert_eq!(parse_end_date("soon"), None);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_704_067_200), "2024-01-01 00:00 UTC");
    }
}
