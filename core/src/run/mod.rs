//! A run: one recorded trial, its signals and the pipeline that builds them.

pub mod assembler;
pub mod kinematics;
pub mod metadata;

pub use assembler::RunAssembler;
pub use metadata::{MetadataValue, RunId, RunMetadata};

use crate::navigation::DecodeReport;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::signal::{RawSignal, Signal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bicycle and rider model coefficients, looked up by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhysicalParameters {
    values: BTreeMap<String, f64>,
}

impl PhysicalParameters {
    pub fn new(values: BTreeMap<String, f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> ProcessingResult<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| ProcessingError::MissingParameter(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.values.iter()
    }
}

impl FromIterator<(String, f64)> for PhysicalParameters {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Name-keyed signal collection that refuses duplicate names.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMap<T> {
    entries: BTreeMap<String, T>,
}

impl<T> Default for SignalMap<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> SignalMap<T> {
    pub fn insert(&mut self, name: &str, value: T) -> ProcessingResult<()> {
        if self.entries.contains_key(name) {
            return Err(ProcessingError::DuplicateSignal(name.to_string()));
        }
        self.entries.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> ProcessingResult<&T> {
        self.entries
            .get(name)
            .ok_or_else(|| ProcessingError::MissingSignal(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything computed for one run during an analysis session.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: RunId,
    pub metadata: RunMetadata,
    pub raw_signals: SignalMap<RawSignal>,
    pub calibrated_signals: SignalMap<Signal>,
    pub truncated_signals: SignalMap<Signal>,
    pub computed_signals: SignalMap<Signal>,
    /// Shift between acquisition and navigation streams, seconds.
    pub tau: f64,
    pub parameters: PhysicalParameters,
    pub decode_report: DecodeReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_map_rejects_duplicates() {
        let mut map = SignalMap::default();
        map.insert("SteerAngle", 1).unwrap();
        assert!(matches!(
            map.insert("SteerAngle", 2),
            Err(ProcessingError::DuplicateSignal(_))
        ));
        assert_eq!(*map.get("SteerAngle").unwrap(), 1);
        assert!(matches!(map.get("RollAngle"), Err(ProcessingError::MissingSignal(_))));
    }

    #[test]
    fn parameters_report_missing_names() {
        let parameters: PhysicalParameters = vec![("rR".to_string(), 0.34)].into_iter().collect();
        assert_eq!(parameters.get("rR").unwrap(), 0.34);
        assert!(matches!(
            parameters.get("lam"),
            Err(ProcessingError::MissingParameter(_))
        ));
    }
}
