use crate::math::fft::FftHelper;
use crate::math::stats::StatsHelper;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::signal::{Signal, Source};
use ndarray::Array1;

/// Estimates the offset `tau`, in seconds, between the acquisition and the
/// navigation streams. Positive values mean the acquisition stream lags.
pub trait TimeShiftEstimator: Send + Sync {
    fn estimate(&self, acquisition: &Signal, navigation: &Signal) -> ProcessingResult<f64>;
}

/// Shifts a calibrated signal by `tau` and resamples it onto the grid both
/// streams share.
pub trait SignalAligner: Send + Sync {
    fn align(&self, signal: &Signal, grid: &AlignmentGrid) -> ProcessingResult<Signal>;
}

/// Common window of the aligned streams: navigation samples
/// `start..start + count` at the navigation rate, with acquisition samples
/// read `tau` seconds later on their own clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentGrid {
    pub tau: f64,
    pub rate: f64,
    pub start: usize,
    pub count: usize,
}

impl AlignmentGrid {
    /// `acquisition` and `navigation` are `(samples, sample rate)` of the
    /// two reference streams.
    pub fn new(tau: f64, acquisition: (usize, f64), navigation: (usize, f64)) -> Self {
        let (acquisition_len, acquisition_rate) = acquisition;
        let (navigation_len, rate) = navigation;
        if acquisition_len == 0 || navigation_len == 0 {
            return Self {
                tau,
                rate,
                start: 0,
                count: 0,
            };
        }
        let start = snap(-tau * rate).max(0.0).ceil();
        let acquisition_end = snap(((acquisition_len - 1) as f64 / acquisition_rate - tau) * rate);
        let end = acquisition_end.min((navigation_len - 1) as f64).floor();
        let count = if end < start {
            0
        } else {
            (end - start) as usize + 1
        };
        Self {
            tau,
            rate,
            start: start as usize,
            count,
        }
    }

    /// Fractional index, into a stream of `source` sampled at
    /// `sample_rate`, of grid sample `index`.
    fn position(&self, index: usize, source: Source, sample_rate: f64) -> f64 {
        let time = (self.start + index) as f64 / self.rate;
        let time = match source {
            Source::Acquisition => time + self.tau,
            _ => time,
        };
        snap(time * sample_rate)
    }
}

/// Linear interpolation of `values` at fractional sample `position`.
fn interpolate(values: &Array1<f64>, position: f64) -> f64 {
    let last = values.len().saturating_sub(1);
    let lower = position.floor().max(0.0) as usize;
    if lower >= last {
        return values[last];
    }
    let fraction = position - lower as f64;
    if fraction == 0.0 {
        return values[lower];
    }
    values[lower] * (1.0 - fraction) + values[lower + 1] * fraction
}

/// Rounds sample offsets that are integral up to float noise.
fn snap(offset: f64) -> f64 {
    let rounded = offset.round();
    if (offset - rounded).abs() < 1e-9 {
        rounded
    } else {
        offset
    }
}

/// Resamples a signal's values onto a grid at `target_rate`.
pub fn resample(signal: &Signal, target_rate: f64) -> Array1<f64> {
    let values = signal.values();
    if values.is_empty() || signal.sample_rate() == target_rate {
        return values.clone();
    }
    let duration = (values.len() - 1) as f64 / signal.sample_rate();
    let samples = (duration * target_rate).floor() as usize + 1;
    let ratio = signal.sample_rate() / target_rate;
    Array1::from_shape_fn(samples, |i| interpolate(values, i as f64 * ratio))
}

/// Picks the lag with the strongest (absolute) FFT cross-correlation.
#[derive(Debug, Clone, Copy)]
pub struct CrossCorrelationEstimator {
    max_lag_seconds: f64,
}

impl CrossCorrelationEstimator {
    pub fn new(max_lag_seconds: f64) -> Self {
        Self { max_lag_seconds }
    }
}

impl TimeShiftEstimator for CrossCorrelationEstimator {
    fn estimate(&self, acquisition: &Signal, navigation: &Signal) -> ProcessingResult<f64> {
        for signal in [acquisition, navigation] {
            if signal.is_empty() {
                return Err(ProcessingError::MissingSignal(signal.name().to_string()));
            }
        }
        let rate = acquisition.sample_rate();
        let lhs = StatsHelper::centered(&acquisition.values().to_vec());
        let rhs = StatsHelper::centered(&resample(navigation, rate).to_vec());

        let correlation = FftHelper::cross_correlate(&lhs, &rhs);
        let size = correlation.len() as i64;
        let limit = ((self.max_lag_seconds * rate).round() as i64)
            .min(lhs.len().max(rhs.len()) as i64 - 1)
            .max(0);

        let best = (-limit..=limit)
            .map(|lag| {
                let index = if lag >= 0 { lag } else { size + lag };
                (lag, correlation[index as usize].abs())
            })
            .fold((0i64, f64::MIN), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });

        Ok(best.0 as f64 / rate)
    }
}

/// Interpolates acquisition samples, shifted by `tau`, onto the navigation
/// grid and cuts navigation samples to the common window.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpolatingAligner;

impl SignalAligner for InterpolatingAligner {
    fn align(&self, signal: &Signal, grid: &AlignmentGrid) -> ProcessingResult<Signal> {
        let source = signal.source();
        if source == Source::Derived {
            return Err(ProcessingError::UnknownSource(source.to_string()));
        }
        let values = signal.values();
        let count = if values.is_empty() { 0 } else { grid.count };
        let aligned = Array1::from_shape_fn(count, |i| {
            interpolate(values, grid.position(i, source, signal.sample_rate()))
        });
        let mut meta = signal.meta().clone();
        meta.sample_rate = grid.rate;
        Ok(Signal::new(aligned, meta))
    }
}
