//! Return transforms and correlation statistics

/// Floor applied to prices before taking ratios or logs. Prediction-market
/// prices can touch 0, which would blow up both.
pub const PRICE_FLOOR: f64 = 0.001;

/// Convert an ordered price sequence to log returns.
///
/// Output length is `input length - 1`; inputs shorter than 2 yield an empty
/// sequence. Prices are floored at [`PRICE_FLOOR`] on both sides of the ratio.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    if prices.len() < 2 {
        return Vec::new();
    }

    prices
        .windows(2)
        .map(|pair| {
            let prev = pair[0].max(PRICE_FLOOR);
            let curr = pair[1].max(PRICE_FLOOR);
            (curr / prev).ln()
        })
        .collect()
}

/// Population variance: mean of squared deviations from the mean.
/// Returns 0.0 for empty input.
pub fn variance(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n
}

/// Pearson correlation coefficient via the sum-based formula.
///
/// Returns 0.0 on length mismatch, empty input, or a zero denominator
/// (constant series) — callers treat 0.0 as "no link" rather than an error.
/// Output is clamped to [-1, 1] to absorb floating-point drift.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n != y.len() || n == 0 {
        return 0.0;
    }

    let n_f = n as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(xi, yi)| xi * yi).sum();
    let sum_x2: f64 = x.iter().map(|xi| xi * xi).sum();
    let sum_y2: f64 = y.iter().map(|yi| yi * yi).sum();

    let numerator = n_f * sum_xy - sum_x * sum_y;
    let denominator = ((n_f * sum_x2 - sum_x * sum_x) * (n_f * sum_y2 - sum_y * sum_y)).sqrt();

    if denominator == 0.0 {
        return 0.0;
    }

    (numerator / denominator).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_returns_length() {
        let prices = vec![0.4, 0.5, 0.6, 0.5];
        let returns = log_returns(&prices);
        assert_eq!(returns.len(), 3);
        assert!((returns[0] - (0.5f64 / 0.4).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_log_returns_short_input() {
        assert!(log_returns(&[]).is_empty());
        assert!(log_returns(&[0.5]).is_empty());
    }

    #[test]
    fn test_log_returns_floors_zero_prices() {
        let returns = log_returns(&[0.0, 0.5]);
        assert_eq!(returns.len(), 1);
        assert!(returns[0].is_finite());
        assert!((returns[0] - (0.5f64 / PRICE_FLOOR).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[0.5, 0.5, 0.5]), 0.0);

        // Population variance of [1, 2, 3] is 2/3
        let v = variance(&[1.0, 2.0, 3.0]);
        assert!((v - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_self_correlation() {
        let series = vec![0.1, -0.2, 0.3, 0.05, -0.15];
        let r = pearson(&series, &series);
        assert!((r - 1.0).abs() < 1e-9, "self-correlation should be ~1.0, got {}", r);
    }

    #[test]
    fn test_pearson_inverse_correlation() {
        let x = vec![0.1, -0.2, 0.3, 0.05, -0.15];
        let y: Vec<f64> = x.iter().map(|v| -v).collect();
        let r = pearson(&x, &y);
        assert!((r + 1.0).abs() < 1e-9, "inverse correlation should be ~-1.0, got {}", r);
    }

    #[test]
    fn test_pearson_zero_denominator() {
        // A constant series has no variance: no link, not an error.
        let x = vec![0.5, 0.5, 0.5];
        let y = vec![0.1, 0.2, 0.3];
        assert_eq!(pearson(&x, &y), 0.0);
    }

    #[test]
    fn test_pearson_degenerate_inputs() {
        assert_eq!(pearson(&[], &[]), 0.0);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_pearson_stays_in_range() {
        let x = vec![1e-9, 2e-9, 3e-9, 4e-9];
        let y = vec![1e-9, 2e-9, 3e-9, 4e-9];
        let r = pearson(&x, &y);
        assert!((-1.0..=1.0).contains(&r));
    }
}
