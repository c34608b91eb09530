//! Where runs come from and where processed runs go.

pub mod export;
pub mod json;

pub use export::{JsonExporter, RunExporter};
pub use json::JsonRunStore;

use crate::calibration::CalibrationRecord;
use crate::navigation::ChannelMatrix;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::run::{RunId, RunMetadata};
use crate::signal::SignalTable;
use std::collections::BTreeMap;

/// A run as recorded, before decoding or calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRun {
    pub metadata: RunMetadata,
    /// One row per acquisition channel, in `acquisition_columns` order.
    pub acquisition: ChannelMatrix,
    pub acquisition_columns: Vec<String>,
    /// Sanitized navigation text, one frame per line.
    pub navigation_lines: Vec<String>,
    pub navigation_columns: Vec<String>,
}

/// Read access to recorded runs and their calibration history.
pub trait RunStore: Send + Sync {
    fn run_ids(&self) -> ProcessingResult<Vec<RunId>>;

    fn load_run(&self, id: RunId) -> ProcessingResult<RawRun>;

    fn signal_table(&self) -> ProcessingResult<SignalTable>;

    fn calibrations(&self) -> ProcessingResult<Vec<CalibrationRecord>>;
}

/// Store backed by in-process maps, used by tests and synthetic batches.
#[derive(Debug, Clone, Default)]
pub struct MemoryRunStore {
    runs: BTreeMap<RunId, RawRun>,
    table: SignalTable,
    calibrations: Vec<CalibrationRecord>,
}

impl MemoryRunStore {
    pub fn new(table: SignalTable, calibrations: Vec<CalibrationRecord>) -> Self {
        Self {
            runs: BTreeMap::new(),
            table,
            calibrations,
        }
    }

    pub fn insert_run(&mut self, id: RunId, run: RawRun) {
        self.runs.insert(id, run);
    }
}

impl RunStore for MemoryRunStore {
    fn run_ids(&self) -> ProcessingResult<Vec<RunId>> {
        Ok(self.runs.keys().copied().collect())
    }

    fn load_run(&self, id: RunId) -> ProcessingResult<RawRun> {
        self.runs
            .get(&id)
            .cloned()
            .ok_or_else(|| ProcessingError::Storage(format!("run {} not found", id)))
    }

    fn signal_table(&self) -> ProcessingResult<SignalTable> {
        Ok(self.table.clone())
    }

    fn calibrations(&self) -> ProcessingResult<Vec<CalibrationRecord>> {
        Ok(self.calibrations.clone())
    }
}
