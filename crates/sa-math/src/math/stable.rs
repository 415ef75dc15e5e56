//! Compensated summation for accumulating many small terms.
//!
//! Exact inference sums thousands of joint-probability products spanning
//! several orders of magnitude. Neumaier summation carries a running error
//! term, so strategies that visit the terms in a different order agree to
//! within a few ulps.

/// Running Neumaier (improved Kahan-Babuska) accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeumaierSum {
    sum: f64,
    compensation: f64,
}

impl NeumaierSum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single term.
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    /// Current compensated total.
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl Extend<f64> for NeumaierSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for v in iter {
            self.add(v);
        }
    }
}

/// Compensated sum of a slice.
///
/// Returns 0.0 for empty input. NaN propagates.
pub fn stable_sum(values: &[f64]) -> f64 {
    let mut acc = NeumaierSum::new();
    acc.extend(values.iter().copied());
    acc.value()
}

/// Compensated dot product of two equally long slices.
///
/// Extra trailing elements of the longer slice are ignored.
pub fn stable_dot(a: &[f64], b: &[f64]) -> f64 {
    let mut acc = NeumaierSum::new();
    for (x, y) in a.iter().zip(b.iter()) {
        acc.add(x * y);
    }
    acc.value()
}
