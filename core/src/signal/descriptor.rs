use crate::prelude::{ProcessingError, ProcessingResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Where a signal comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "NI")]
    Acquisition,
    #[serde(rename = "VN")]
    Navigation,
    #[serde(rename = "NA")]
    Derived,
}

impl FromStr for Source {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NI" | "acquisition" => Ok(Source::Acquisition),
            "VN" | "navigation" => Ok(Source::Navigation),
            "NA" | "derived" => Ok(Source::Derived),
            other => Err(ProcessingError::UnknownSource(other.to_string())),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Source::Acquisition => "NI",
            Source::Navigation => "VN",
            Source::Derived => "NA",
        };
        f.write_str(tag)
    }
}

/// Which calibration equation maps a raw signal to physical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationKind {
    None,
    Bias,
    Intercept,
    InterceptStar,
    Matrix,
    Na,
}

impl FromStr for CalibrationKind {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CalibrationKind::None),
            "bias" => Ok(CalibrationKind::Bias),
            "intercept" => Ok(CalibrationKind::Intercept),
            "interceptStar" => Ok(CalibrationKind::InterceptStar),
            "matrix" => Ok(CalibrationKind::Matrix),
            "na" => Ok(CalibrationKind::Na),
            other => Err(ProcessingError::UnknownCalibrationKind(other.to_string())),
        }
    }
}

/// Signals computed from the raw channels rather than measured directly.
pub const PROCESSED_SIGNALS: &[&str] = &[
    "FrameAccelerationX",
    "FrameAccelerationY",
    "FrameAccelerationZ",
    "PitchRate",
    "PullForce",
    "RearWheelRate",
    "RollAngle",
    "RollRate",
    "ForwardSpeed",
    "SteerAngle",
    "SteerRate",
    "SteerTorque",
    "tau",
    "YawRate",
];

fn navigation_units(name: &str) -> &'static str {
    match name {
        "MagX" | "MagY" | "MagZ" => "unitless",
        "AccelerationX" | "AccelerationY" | "AccelerationZ" => "meter/second/second",
        "AngularRateX" | "AngularRateY" | "AngularRateZ" => "radian/second",
        "AngularRotationX" | "AngularRotationY" | "AngularRotationZ" => "degree",
        "Temperature" => "kelvin",
        other => {
            debug!("no unit mapping for navigation column {}", other);
            "unitless"
        }
    }
}

fn acquisition_calibration(name: &str) -> CalibrationKind {
    let without_index = name
        .char_indices()
        .last()
        .map(|(index, _)| &name[..index])
        .unwrap_or("");
    if name.starts_with("FrameAccel") || name == "SteerRateGyro" {
        CalibrationKind::Bias
    } else if name.ends_with("Potentiometer") {
        CalibrationKind::InterceptStar
    } else if matches!(name, "WheelSpeedMotor" | "SteerTorqueSensor" | "PullForceBridge") {
        CalibrationKind::Intercept
    } else if without_index.ends_with("Bridge") {
        CalibrationKind::Matrix
    } else {
        CalibrationKind::None
    }
}

/// Static description of one signal column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    pub signal: String,
    pub source: Source,
    #[serde(rename = "isRaw")]
    pub is_raw: bool,
    pub units: String,
    pub calibration: CalibrationKind,
    /// Lookup key into the calibration store.
    pub sensor: String,
}

impl SignalDescriptor {
    pub fn acquisition(name: &str) -> Self {
        Self {
            signal: name.to_string(),
            source: Source::Acquisition,
            is_raw: true,
            units: "volts".to_string(),
            calibration: acquisition_calibration(name),
            sensor: name.to_string(),
        }
    }

    pub fn navigation(name: &str) -> Self {
        Self {
            signal: name.to_string(),
            source: Source::Navigation,
            is_raw: true,
            units: navigation_units(name).to_string(),
            calibration: CalibrationKind::None,
            sensor: name.to_string(),
        }
    }

    pub fn processed(name: &str) -> Self {
        Self {
            signal: name.to_string(),
            source: Source::Derived,
            is_raw: false,
            units: String::new(),
            calibration: CalibrationKind::Na,
            sensor: String::new(),
        }
    }
}

/// Read-only catalogue of every known signal, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalTable {
    descriptors: BTreeMap<String, SignalDescriptor>,
}

impl SignalTable {
    /// Classifies the column names of a run the same way the dataset schema does.
    pub fn build(acquisition_columns: &[String], navigation_columns: &[String]) -> Self {
        let mut table = SignalTable::default();
        for name in PROCESSED_SIGNALS {
            table.insert(SignalDescriptor::processed(name));
        }
        for name in navigation_columns {
            table.insert(SignalDescriptor::navigation(name));
        }
        for name in acquisition_columns {
            table.insert(SignalDescriptor::acquisition(name));
        }
        table
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = SignalDescriptor>) -> Self {
        let mut table = SignalTable::default();
        for descriptor in descriptors {
            table.insert(descriptor);
        }
        table
    }

    fn insert(&mut self, descriptor: SignalDescriptor) {
        self.descriptors.insert(descriptor.signal.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> ProcessingResult<&SignalDescriptor> {
        self.descriptors
            .get(name)
            .ok_or_else(|| ProcessingError::MissingSignal(name.to_string()))
    }

    pub fn raw(&self) -> impl Iterator<Item = &SignalDescriptor> {
        self.descriptors.values().filter(|d| d.is_raw)
    }

    pub fn computed(&self) -> impl Iterator<Item = &SignalDescriptor> {
        self.descriptors.values().filter(|d| !d.is_raw)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
