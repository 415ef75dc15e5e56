//! Helpers for finite discrete distributions and score vectors.

use serde::Serialize;

use super::stable::{stable_dot, stable_sum};

/// Default tolerance for row-sum checks.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Result of a first-occurrence argmax.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArgMax {
    /// Position of the first maximal element.
    pub index: usize,
    /// The maximal value.
    pub value: f64,
    /// True when a later element compares equal to the maximum.
    pub tied: bool,
}

/// Index of the maximum value, breaking ties by first occurrence.
///
/// NaN entries are skipped. Returns `None` for empty input or all-NaN input.
pub fn argmax_first(values: &[f64]) -> Option<ArgMax> {
    let mut best: Option<ArgMax> = None;
    for (index, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some(ref mut b) if value == b.value => b.tied = true,
            Some(b) if value <= b.value => {}
            _ => {
                best = Some(ArgMax {
                    index,
                    value,
                    tied: false,
                })
            }
        }
    }
    best
}

/// True when every entry is finite, non-negative, and the total is 1 within `epsilon`.
pub fn is_distribution(values: &[f64], epsilon: f64) -> bool {
    if values.is_empty() {
        return false;
    }
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return false;
    }
    (stable_sum(values) - 1.0).abs() <= epsilon
}

/// Scale `values` in place so they sum to 1.
///
/// Returns the original total, or `None` (leaving `values` untouched) when the
/// total is zero, negative or not finite.
pub fn normalize(values: &mut [f64]) -> Option<f64> {
    let total = stable_sum(values);
    if !total.is_finite() || total <= 0.0 {
        return None;
    }
    for v in values.iter_mut() {
        *v /= total;
    }
    Some(total)
}

/// Expected value of `scores` under `probabilities`.
///
/// The slices must have the same length; extra entries are ignored.
pub fn expectation(probabilities: &[f64], scores: &[f64]) -> f64 {
    stable_dot(probabilities, scores)
}

/// Point mass of the given cardinality at `index`.
///
/// An out-of-range index yields the all-zero vector.
pub fn point_mass(cardinality: usize, index: usize) -> Vec<f64> {
    let mut out = vec![0.0; cardinality];
    if let Some(slot) = out.get_mut(index) {
        *slot = 1.0;
    }
    out
}

/// Mix two equally sized distributions: `w * a + (1 - w) * b`.
pub fn mix(a: &[f64], b: &[f64], w: f64) -> Vec<f64> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| w * x + (1.0 - w) * y)
        .collect()
}
