use crate::prelude::{ProcessingError, ProcessingResult};
use crate::signal::descriptor::{CalibrationKind, Source};
use crate::signal::units::conversion_factor;
use chrono::NaiveDateTime;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metadata attached to a sampled series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMeta {
    pub name: String,
    #[serde(rename = "runid")]
    pub run_id: String,
    #[serde(rename = "sampleRate")]
    pub sample_rate: f64,
    pub source: Source,
    pub units: String,
}

/// A time series and its metadata.
///
/// Arithmetic goes through [`Signal::values`] and yields a bare array;
/// callers build a new `Signal` to give the result a name and units.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    data: Array1<f64>,
    meta: SignalMeta,
}

impl Signal {
    pub fn new(data: Array1<f64>, meta: SignalMeta) -> Self {
        Self { data, meta }
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.data
    }

    pub fn meta(&self) -> &SignalMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn units(&self) -> &str {
        &self.meta.units
    }

    pub fn source(&self) -> Source {
        self.meta.source
    }

    pub fn sample_rate(&self) -> f64 {
        self.meta.sample_rate
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample times in seconds, starting at zero.
    pub fn time(&self) -> Array1<f64> {
        time_vector(self.len(), self.sample_rate())
    }

    pub fn convert_units(&self, units: &str) -> ProcessingResult<Signal> {
        let factor = conversion_factor(self.units(), units)?;
        let mut meta = self.meta.clone();
        meta.units = units.to_string();
        Ok(Signal::new(&self.data * factor, meta))
    }

    /// Second-order central differences, one-sided at both ends.
    pub fn time_derivative(&self) -> Array1<f64> {
        let n = self.len();
        let dt = 1.0 / self.sample_rate();
        let x = &self.data;
        match n {
            0 => Array1::zeros(0),
            1 => Array1::zeros(1),
            2 => Array1::from_elem(2, (x[1] - x[0]) / dt),
            _ => Array1::from_shape_fn(n, |i| {
                if i == 0 {
                    (-3.0 * x[0] + 4.0 * x[1] - x[2]) / (2.0 * dt)
                } else if i == n - 1 {
                    (3.0 * x[n - 1] - 4.0 * x[n - 2] + x[n - 3]) / (2.0 * dt)
                } else {
                    (x[i + 1] - x[i - 1]) / (2.0 * dt)
                }
            }),
        }
    }
}

pub fn time_vector(samples: usize, sample_rate: f64) -> Array1<f64> {
    Array1::from_shape_fn(samples, |i| i as f64 / sample_rate)
}

/// Supply voltage seen by a sensor during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum SupplyVoltage {
    Constant(f64),
    /// Measured alongside the signal on another acquisition channel.
    PerSample(Array1<f64>),
}

/// A measured signal as stored for a run, before calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSignal {
    pub signal: Signal,
    pub calibration: CalibrationKind,
    /// Calibration store key; resolved at scaling time.
    pub sensor: String,
    pub timestamp: NaiveDateTime,
    pub supply: Option<SupplyVoltage>,
}

impl RawSignal {
    pub fn name(&self) -> &str {
        self.signal.name()
    }

    pub fn supply(&self) -> ProcessingResult<&SupplyVoltage> {
        self.supply
            .as_ref()
            .ok_or_else(|| ProcessingError::MissingMetadata(format!("{} supply voltage", self.name())))
    }
}
