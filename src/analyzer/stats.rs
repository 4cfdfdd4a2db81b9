use std::collections::HashMap;

/// Median of the values, averaging the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    Some(median)
}

/// Quantile with linear interpolation between closest ranks. `sorted` must be ascending.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Inclusive Tukey fence `[Q1 - k*IQR, Q3 + k*IQR]`.
pub fn iqr_bounds(values: &[f64], threshold: f64) -> Option<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25)?;
    let q3 = quantile(&sorted, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - threshold * iqr, q3 + threshold * iqr))
}

/// Most frequent value; ties go to the smallest value in ascending order.
pub fn mode<'a, I>(values: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&'a str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.cmp(va)))
        .map(|(value, _)| value)
}

/// Value counts sorted by descending count, ties kept in first-seen order.
pub fn value_counts<'a, I>(values: I) -> Vec<(&'a str, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<(&'a str, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for value in values {
        match index.get(value) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(value, order.len());
                order.push((value, 1));
            }
        }
    }
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 0.75), Some(3.25));
        assert_eq!(quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
    }

    #[test]
    fn iqr_bounds_flag_far_values() {
        let (lower, upper) = iqr_bounds(&[10.0, 11.0, 12.0, 13.0, 100.0], 1.5).unwrap();
        assert!(lower <= 10.0);
        assert!(upper < 100.0);
    }

    #[test]
    fn iqr_bounds_collapse_on_constant_column() {
        assert_eq!(iqr_bounds(&[5.0, 5.0, 5.0], 1.5), Some((5.0, 5.0)));
    }

    #[test]
    fn mode_prefers_smallest_on_ties() {
        assert_eq!(mode(["b", "a", "b", "a", "c"]), Some("a"));
        assert_eq!(mode(["x", "y", "y"]), Some("y"));
        assert_eq!(mode(Vec::<&str>::new()), None);
    }

    #[test]
    fn value_counts_sorted_by_count() {
        let counts = value_counts(["suv", "compact", "suv", "van", "compact", "suv"]);
        assert_eq!(counts, vec![("suv", 3), ("compact", 2), ("van", 1)]);
    }
}
