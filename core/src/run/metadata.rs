use crate::navigation::FrameParser;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::processing::VectorSizer;
use crate::timestamp::parse_matlab_date;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Five-digit run identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u32);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

impl FromStr for RunId {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(RunId)
            .map_err(|_| ProcessingError::MissingMetadata(format!("run id {:?}", s)))
    }
}

/// A single run parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Text(String),
    Vector(Vec<f64>),
}

impl MetadataValue {
    /// Parameters recorded as raw register responses (`$VNRRG,...*HH`) are
    /// reduced to their payload: one token becomes an integer (or text),
    /// several become a vector.
    pub fn decode_register(self) -> Self {
        match self {
            MetadataValue::Text(text) if text.starts_with('$') => Self::from_register_frame(&text),
            other => other,
        }
    }

    fn from_register_frame(text: &str) -> Self {
        let frame = FrameParser::parse(text);
        match frame.register_payload() {
            [single] => single
                .trim()
                .parse::<i64>()
                .map(MetadataValue::Int)
                .unwrap_or_else(|_| MetadataValue::Text(single.clone())),
            payload => MetadataValue::Vector(
                payload
                    .iter()
                    .map(|token| token.trim().parse::<f64>().unwrap_or(f64::NAN))
                    .collect(),
            ),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Int(value) => Some(*value as f64),
            MetadataValue::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Int(value) => write!(f, "{}", value),
            MetadataValue::Float(value) => write!(f, "{}", value),
            MetadataValue::Text(value) => f.write_str(value),
            MetadataValue::Vector(values) => write!(f, "{:?}", values),
        }
    }
}

/// Scalar parameters of a run; immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunMetadata {
    values: BTreeMap<String, MetadataValue>,
}

impl RunMetadata {
    pub fn from_parameters(parameters: BTreeMap<String, MetadataValue>) -> Self {
        let mut values: BTreeMap<String, MetadataValue> = parameters
            .into_iter()
            .map(|(name, value)| (name, value.decode_register()))
            .collect();
        if let Some(MetadataValue::Int(speed)) = values.get("Speed") {
            let speed = *speed as f64;
            values.insert("Speed".to_string(), MetadataValue::Float(speed));
        }
        values
            .entry("Notes".to_string())
            .or_insert_with(|| MetadataValue::Text(String::new()));
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&MetadataValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.values.iter()
    }

    fn missing(name: &str) -> ProcessingError {
        ProcessingError::MissingMetadata(name.to_string())
    }

    pub fn int(&self, name: &str) -> ProcessingResult<i64> {
        match self.get(name) {
            Some(MetadataValue::Int(value)) => Ok(*value),
            _ => Err(Self::missing(name)),
        }
    }

    pub fn float(&self, name: &str) -> ProcessingResult<f64> {
        self.get(name)
            .and_then(MetadataValue::as_f64)
            .ok_or_else(|| Self::missing(name))
    }

    pub fn text(&self, name: &str) -> ProcessingResult<&str> {
        match self.get(name) {
            Some(MetadataValue::Text(value)) => Ok(value),
            _ => Err(Self::missing(name)),
        }
    }

    pub fn notes(&self) -> &str {
        self.text("Notes").unwrap_or("")
    }

    pub fn run_id(&self) -> ProcessingResult<RunId> {
        let id = self.int("RunID")?;
        u32::try_from(id)
            .map(RunId)
            .map_err(|_| Self::missing("RunID"))
    }

    pub fn timestamp(&self) -> ProcessingResult<NaiveDateTime> {
        parse_matlab_date(self.text("DateTime")?)
    }

    /// Number of valid acquisition samples (`NINumSamples`).
    pub fn sample_count(&self) -> ProcessingResult<usize> {
        VectorSizer::checked_length(self.int("NINumSamples")?)
    }

    pub fn summary(&self) -> String {
        let field = |name: &str| {
            self.get(name)
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown".to_string())
        };
        let line = "=".repeat(79);
        format!(
            "{line}\nRun # {}\nEnvironment: {}\nRider: {}\nBicycle: {}\nSpeed: {}\nManeuver: {}\nNotes: {}\n{line}",
            field("RunID"),
            field("Environment"),
            field("Rider"),
            field("Bicycle"),
            field("Speed"),
            field("Maneuver"),
            self.notes(),
        )
    }
}
