/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the population standard deviation given a pre-computed mean.
/// Returns 0.0 for empty input.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// Rounds and clamps a value onto the integer `[0, 100]` score scale.
/// Non-finite input scores 0.
pub fn to_score(v: f64) -> u8 {
    if !v.is_finite() {
        return 0;
    }
    v.round().clamp(0.0, 100.0) as u8
}

/// `min(100, round(100 * actual / target))`.
///
/// A zero target scores 100 for any non-negative actual, and a non-finite or
/// negative actual scores 0.
pub fn ratio_score(actual: f64, target: f64) -> u8 {
    if !actual.is_finite() || actual < 0.0 {
        return 0;
    }
    if target <= 0.0 {
        return 100;
    }
    to_score(100.0 * actual / target)
}
