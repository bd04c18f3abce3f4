//! Order statistics over pixel and energy buffers.
//!
//! Percentiles use linear interpolation between the closest ranks, so
//! `percentile(v, 50.0)` equals the median and `0.0` / `100.0` are the min / max.

pub fn mean(values: &[f32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    Some(sum / values.len() as f64)
}

pub fn median(values: &[f32]) -> Option<f64> {
    percentile(values, 50.0)
}

pub fn percentile(values: &[f32], percentile: f32) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    Some(percentile_of_sorted(&sorted, percentile))
}

/// `sorted` must be non-empty and ascending.
pub fn percentile_of_sorted(sorted: &[f32], percentile: f32) -> f64 {
    let p = (percentile as f64).clamp(0.0, 100.0) / 100.0;
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let lo_val = sorted[lo] as f64;
    let hi_val = sorted[hi] as f64;
    lo_val + (hi_val - lo_val) * (rank - lo as f64)
}

/// Mean and median in one pass over a single sorted copy.
pub fn mean_and_median(values: &[f32]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let sum: f64 = sorted.iter().map(|&v| v as f64).sum();
    Some((sum / sorted.len() as f64, percentile_of_sorted(&sorted, 50.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs() {
        assert!(mean(&[]).is_none());
        assert!(median(&[]).is_none());
        assert!(percentile(&[], 90.0).is_none());
        assert!(mean_and_median(&[]).is_none());
    }

    #[test]
    fn test_linear_percentile() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&values, 50.0).unwrap() - 2.5).abs() < 1e-9);
        assert!((percentile(&values, 90.0).unwrap() - 3.7).abs() < 1e-9);
        assert!((percentile(&values, 0.0).unwrap() - 1.0).abs() < 1e-9);
        assert!((percentile(&values, 100.0).unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_input_and_median() {
        let values = [9.0, 1.0, 5.0];
        assert!((median(&values).unwrap() - 5.0).abs() < 1e-9);
        let (m, med) = mean_and_median(&values).unwrap();
        assert!((m - 5.0).abs() < 1e-9);
        assert!((med - 5.0).abs() < 1e-9);
    }
}
