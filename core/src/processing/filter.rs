//! Smoothing applied to computed signals.

use crate::prelude::ProcessingResult;
use crate::signal::Signal;
use log::debug;
use ndarray::Array1;
use std::f64::consts::{PI, SQRT_2};

/// Post-processing step for a derived signal.
pub trait SignalFilter: Send + Sync {
    fn filter(&self, signal: &Signal) -> ProcessingResult<Signal>;
}

/// Linear interpolation across NaN gaps. Leading and trailing gaps take the
/// nearest finite sample; an all-NaN series is returned unchanged.
pub fn fill_gaps(values: &Array1<f64>) -> Array1<f64> {
    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect();
    let (first, last) = match (known.first(), known.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return values.clone(),
    };

    let mut filled = values.clone();
    for i in 0..first {
        filled[i] = values[first];
    }
    for i in last + 1..values.len() {
        filled[i] = values[last];
    }
    for pair in known.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        let span = (upper - lower) as f64;
        for i in lower + 1..upper {
            let fraction = (i - lower) as f64 / span;
            filled[i] = values[lower] * (1.0 - fraction) + values[upper] * fraction;
        }
    }
    filled
}

/// Second-order Butterworth low-pass run forward then backward, so the
/// output has no phase lag. Gaps are filled first.
#[derive(Debug, Clone, Copy)]
pub struct LowPassFilter {
    cutoff: f64,
}

impl LowPassFilter {
    /// `cutoff` in hertz.
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff }
    }

    /// Bilinear-transform coefficients `(b, a)`, `a[0]` normalized to one.
    fn coefficients(&self, sample_rate: f64) -> ([f64; 3], [f64; 3]) {
        let omega = (PI * self.cutoff / sample_rate).tan();
        let omega_sq = omega * omega;
        let denom = 1.0 + SQRT_2 * omega + omega_sq;
        let k = omega_sq / denom;
        (
            [k, 2.0 * k, k],
            [
                1.0,
                2.0 * (omega_sq - 1.0) / denom,
                (1.0 - SQRT_2 * omega + omega_sq) / denom,
            ],
        )
    }

    /// One causal pass, started in steady state on the first sample.
    fn single_pass(input: &[f64], b: &[f64; 3], a: &[f64; 3]) -> Vec<f64> {
        let first = match input.first() {
            Some(first) => *first,
            None => return Vec::new(),
        };
        let (mut x1, mut x2, mut y1, mut y2) = (first, first, first, first);
        input
            .iter()
            .map(|&x| {
                let y = b[0] * x + b[1] * x1 + b[2] * x2 - a[1] * y1 - a[2] * y2;
                x2 = x1;
                x1 = x;
                y2 = y1;
                y1 = y;
                y
            })
            .collect()
    }
}

impl SignalFilter for LowPassFilter {
    fn filter(&self, signal: &Signal) -> ProcessingResult<Signal> {
        let filled = fill_gaps(signal.values());
        let nyquist = signal.sample_rate() / 2.0;
        if !(self.cutoff > 0.0 && self.cutoff < nyquist) || filled.iter().any(|v| v.is_nan()) {
            debug!(
                "{}: cutoff {} Hz outside (0, {}) Hz or no finite samples, gaps filled only",
                signal.name(),
                self.cutoff,
                nyquist
            );
            return Ok(Signal::new(filled, signal.meta().clone()));
        }

        let (b, a) = self.coefficients(signal.sample_rate());
        let mut forward = Self::single_pass(&filled.to_vec(), &b, &a);
        forward.reverse();
        let mut smoothed = Self::single_pass(&forward, &b, &a);
        smoothed.reverse();
        Ok(Signal::new(Array1::from(smoothed), signal.meta().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{SignalMeta, Source};
    use ndarray::array;

    fn signal(rate: f64, data: Array1<f64>) -> Signal {
        Signal::new(
            data,
            SignalMeta {
                name: "SteerRate".into(),
                run_id: "00105".into(),
                sample_rate: rate,
                source: Source::Derived,
                units: "radian/second".into(),
            },
        )
    }

    fn sine(frequency: f64, rate: f64, n: usize) -> Array1<f64> {
        Array1::from_shape_fn(n, |i| (2.0 * PI * frequency * i as f64 / rate).sin())
    }

    #[test]
    fn gaps_are_interpolated_and_edges_held() {
        let filled = fill_gaps(&array![f64::NAN, 1.0, f64::NAN, 3.0, f64::NAN, f64::NAN]);
        assert_eq!(filled.to_vec(), vec![1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn all_nan_is_left_alone() {
        let filled = fill_gaps(&array![f64::NAN, f64::NAN]);
        assert!(filled.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn constant_passes_unchanged() {
        let out = LowPassFilter::new(50.0)
            .filter(&signal(200.0, Array1::from_elem(300, 0.15)))
            .unwrap();
        assert!(out.values().iter().all(|v| (v - 0.15).abs() < 1e-12));
    }

    #[test]
    fn attenuates_above_cutoff_and_keeps_below() {
        let filter = LowPassFilter::new(10.0);
        let slow = filter.filter(&signal(200.0, sine(1.0, 200.0, 2000))).unwrap();
        let fast = filter.filter(&signal(200.0, sine(60.0, 200.0, 2000))).unwrap();
        let peak = |s: &Signal| {
            s.values()
                .slice(ndarray::s![500..1500])
                .iter()
                .fold(0.0f64, |m, v| m.max(v.abs()))
        };
        assert!(peak(&slow) > 0.95, "slow peak {}", peak(&slow));
        assert!(peak(&fast) < 0.05, "fast peak {}", peak(&fast));
    }

    #[test]
    fn nan_samples_do_not_spread() {
        let mut data = sine(1.0, 200.0, 400);
        data[100] = f64::NAN;
        data[101] = f64::NAN;
        let out = LowPassFilter::new(50.0).filter(&signal(200.0, data)).unwrap();
        assert!(out.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn cutoff_at_nyquist_only_fills_gaps() {
        let out = LowPassFilter::new(50.0)
            .filter(&signal(100.0, array![1.0, f64::NAN, 3.0]))
            .unwrap();
        assert_eq!(out.values().to_vec(), vec![1.0, 2.0, 3.0]);
    }
}
