use serde::{Deserialize, Serialize};

/// Fixed per-run sample-vector length every channel is sized to.
pub const DEFAULT_SAMPLE_COUNT: usize = 18_000;

/// Value used for missing or corrupted samples.
pub const SENTINEL: f64 = f64::NAN;

/// Process-wide processing configuration, fixed once at initialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessingConfig {
    pub sample_count: usize,
    /// Acquisition-side signal used to estimate the time shift.
    pub acquisition_reference: String,
    /// Navigation-side signal used to estimate the time shift.
    pub navigation_reference: String,
    /// Largest shift, in seconds, searched during tau estimation.
    pub max_lag_seconds: f64,
    /// Low-pass cutoff, in hertz, for angles and rates in the computed set.
    pub filter_cutoff_hz: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            acquisition_reference: "AccelerometerAccelerationY".to_string(),
            navigation_reference: "AccelerationZ".to_string(),
            max_lag_seconds: 1.0,
            filter_cutoff_hz: 50.0,
        }
    }
}

/// Common error type for decoding, calibration and run assembly.
#[derive(thiserror::Error, Debug)]
pub enum ProcessingError {
    #[error("checksum mismatch: computed {computed}, provided {provided}")]
    ChecksumMismatch { computed: String, provided: String },
    #[error("frame shape mismatch: expected {expected} values, found {found}")]
    FrameShapeMismatch { expected: usize, found: usize },
    #[error("no calibration records for sensor {0}")]
    MissingCalibrationRecord(String),
    #[error("every calibration of {sensor} postdates the run at {run_timestamp}")]
    NoApplicableCalibration {
        sensor: String,
        run_timestamp: String,
    },
    #[error("unknown calibration kind: {0}")]
    UnknownCalibrationKind(String),
    #[error("unknown signal source: {0}")]
    UnknownSource(String),
    #[error("invalid vector length: {0}")]
    VectorLengthInvariantViolation(i64),
    #[error("invalid supply voltage {voltage} for {signal}")]
    InvalidSupplyVoltage { signal: String, voltage: f64 },
    #[error("length mismatch for {signal}: expected {expected}, got {actual}")]
    SignalLengthMismatch {
        signal: String,
        expected: usize,
        actual: usize,
    },
    #[error("signal {0} is not available")]
    MissingSignal(String),
    #[error("signal {0} already exists")]
    DuplicateSignal(String),
    #[error("physical parameter {0} is not available")]
    MissingParameter(String),
    #[error("run metadata {0} is missing or has the wrong type")]
    MissingMetadata(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("conversion from {from} to {to} is not defined")]
    UnknownConversion { from: String, to: String },
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("serialization failure: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ProcessingError {
    fn from(e: serde_json::Error) -> Self {
        ProcessingError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for ProcessingError {
    fn from(e: std::io::Error) -> Self {
        ProcessingError::Storage(e.to_string())
    }
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Failure of a single run's assembly, tagged with where it happened.
#[derive(thiserror::Error, Debug)]
#[error("run {run_id}{}: {source}", signal_suffix(.signal))]
pub struct AssemblyError {
    pub run_id: String,
    pub signal: Option<String>,
    #[source]
    pub source: ProcessingError,
}

fn signal_suffix(signal: &Option<String>) -> String {
    signal
        .as_ref()
        .map(|name| format!(" signal {}", name))
        .unwrap_or_default()
}

impl AssemblyError {
    pub fn new(run_id: impl Into<String>, signal: Option<&str>, source: ProcessingError) -> Self {
        Self {
            run_id: run_id.into(),
            signal: signal.map(str::to_string),
            source,
        }
    }
}
