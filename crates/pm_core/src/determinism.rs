//! Determinism utilities: stable grouping, first-wins selection, normalization.
//!
//! This module is **I/O-free**. Every helper here has a fixed iteration order
//! so that two runs over the same inputs visit elements identically, which is
//! what makes seeded simulations reproducible.

/// Group `(key, value)` pairs by key, keeping keys in **first-seen** order.
///
/// Linear lookup: candidate counts per region are small.
pub fn group_first_seen<K, V, I>(items: I) -> Vec<(K, Vec<V>)>
where
    K: PartialEq,
    I: IntoIterator<Item = (K, V)>,
{
    let mut out: Vec<(K, Vec<V>)> = Vec::new();
    for (k, v) in items {
        match out.iter_mut().find(|(seen, _)| *seen == k) {
            Some((_, vs)) => vs.push(v),
            None => out.push((k, vec![v])),
        }
    }
    out
}

/// Index of the maximum value; the **first** index wins ties.
///
/// NaN never wins. Returns `None` for an empty slice or an all-NaN slice.
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Scale values so they sum to 100. Returns `None` when the sum is not positive.
pub fn normalize_to_100(values: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = values.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return None;
    }
    Some(values.iter().map(|v| v / total * 100.0).collect())
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
