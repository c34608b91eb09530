use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for reuse.
pub struct FftHelper {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    size: usize,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        Self {
            forward,
            inverse,
            size,
        }
    }

    /// Zero-pads (or cuts) `input` to the planned size and transforms it.
    pub fn forward(&self, input: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = input
            .iter()
            .take(self.size)
            .map(|&value| Complex64::new(value, 0.0))
            .collect();
        buffer.resize(self.size, Complex64::zero());
        self.forward.process(&mut buffer);
        buffer
    }

    /// Inverse transform returning the normalized real part.
    pub fn inverse(&self, mut spectrum: Vec<Complex64>) -> Vec<f64> {
        spectrum.resize(self.size, Complex64::zero());
        self.inverse.process(&mut spectrum);
        let scale = self.size as f64;
        spectrum.iter().map(|c| c.re / scale).collect()
    }

    /// Circular cross-correlation `r[k] = sum_n lhs[n + k] * rhs[n]`, padded
    /// so that no wrap-around occurs. Negative lags live at the end of the
    /// returned buffer (`r[size - k]` is lag `-k`).
    pub fn cross_correlate(lhs: &[f64], rhs: &[f64]) -> Vec<f64> {
        let span = (lhs.len() + rhs.len()).max(2) - 1;
        let helper = FftHelper::new(span.next_power_of_two());
        let left = helper.forward(lhs);
        let right = helper.forward(rhs);
        let product = left
            .iter()
            .zip(right.iter())
            .map(|(l, r)| l * r.conj())
            .collect();
        helper.inverse(product)
    }
}
