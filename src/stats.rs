// Sorted first so partition order never changes the result.
pub fn ordered_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.iter().sum()
}

/// `None` for an empty group, never 0.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(ordered_sum(values) / values.len() as f64)
}

pub fn mean_i32(values: &[i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().map(|v| i64::from(*v)).sum();
    Some(sum as f64 / values.len() as f64)
}

pub fn median_sorted_i32(sorted: &[i32]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(f64::from(sorted[n / 2]))
    } else {
        Some((f64::from(sorted[n / 2 - 1]) + f64::from(sorted[n / 2])) / 2.0)
    }
}
