use crate::calibration::CalibrationRecord;
use crate::navigation::sanitize_line;
use crate::prelude::{ProcessingError, ProcessingResult, SENTINEL};
use crate::processing::VectorSizer;
use crate::run::{MetadataValue, RunId, RunMetadata};
use crate::signal::{SignalDescriptor, SignalTable};
use crate::storage::{RawRun, RunStore};
use log::{debug, warn};
use ndarray::Array2;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk form of one recorded run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRunFile {
    pub par: BTreeMap<String, MetadataValue>,
    /// Acquisition samples, one row per entry of `InputPairs`; gaps are `null`.
    #[serde(rename = "NIData")]
    pub ni_data: Vec<Vec<Option<f64>>>,
    /// Acquisition column name to row index.
    #[serde(rename = "InputPairs")]
    pub input_pairs: BTreeMap<String, i64>,
    #[serde(rename = "VNavCols")]
    pub vnav_cols: Vec<String>,
    #[serde(rename = "VNavDataText")]
    pub vnav_data_text: Vec<String>,
}

impl RawRunFile {
    fn into_raw_run(self) -> RawRun {
        let mut pairs: Vec<(String, i64)> = self.input_pairs.into_iter().collect();
        pairs.sort_by_key(|(_, index)| *index);

        let mut acquisition_columns = Vec::with_capacity(pairs.len());
        let mut rows = Vec::with_capacity(pairs.len());
        for (position, (name, _)) in pairs.into_iter().enumerate() {
            match self.ni_data.get(position) {
                Some(row) => {
                    rows.push(row.iter().map(|v| v.unwrap_or(SENTINEL)).collect::<Vec<f64>>());
                    acquisition_columns.push(name);
                }
                None => warn!("{} was not measured", name),
            }
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let flat: Vec<f64> = rows
            .iter()
            .flat_map(|row| VectorSizer::size(row, width))
            .collect();
        let acquisition = Array2::from_shape_vec((rows.len(), width), flat)
            .unwrap_or_else(|_| Array2::zeros((0, 0)));

        let navigation_columns = self
            .vnav_cols
            .iter()
            .map(|column| sanitize_line(column).replace(' ', ""))
            .collect();
        let navigation_lines = self
            .vnav_data_text
            .iter()
            .map(|line| sanitize_line(line).to_string())
            .collect();

        RawRun {
            metadata: RunMetadata::from_parameters(self.par),
            acquisition,
            acquisition_columns,
            navigation_lines,
            navigation_columns,
        }
    }
}

/// Directory-backed store:
///
/// ```text
/// <root>/runs/<id>.json
/// <root>/calibration/<calibration id>.json
/// <root>/signals.json          (optional)
/// ```
#[derive(Debug, Clone)]
pub struct JsonRunStore {
    root: PathBuf,
}

impl JsonRunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn calibration_dir(&self) -> PathBuf {
        self.root.join("calibration")
    }

    fn signals_path(&self) -> PathBuf {
        self.root.join("signals.json")
    }

    fn run_path(&self, id: RunId) -> PathBuf {
        self.runs_dir().join(format!("{}.json", id))
    }

    fn json_files(dir: &Path) -> ProcessingResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> ProcessingResult<T> {
        let text = fs::read_to_string(path)
            .map_err(|e| ProcessingError::Storage(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| ProcessingError::Serialization(format!("{}: {}", path.display(), e)))
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> ProcessingResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    pub fn read_run_file(&self, id: RunId) -> ProcessingResult<RawRunFile> {
        Self::read_json(&self.run_path(id))
    }

    pub fn write_run(&self, id: RunId, run: &RawRunFile) -> ProcessingResult<()> {
        Self::write_json(&self.run_path(id), run)
    }

    pub fn write_calibration(&self, record: &CalibrationRecord) -> ProcessingResult<()> {
        let path = self
            .calibration_dir()
            .join(format!("{}.json", record.calibration_id));
        Self::write_json(&path, record)
    }
}

impl RunStore for JsonRunStore {
    fn run_ids(&self) -> ProcessingResult<Vec<RunId>> {
        let mut ids = Vec::new();
        for path in Self::json_files(&self.runs_dir())? {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            match stem.parse::<RunId>() {
                Ok(id) => ids.push(id),
                Err(_) => debug!("skipping {}", path.display()),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn load_run(&self, id: RunId) -> ProcessingResult<RawRun> {
        Ok(self.read_run_file(id)?.into_raw_run())
    }

    /// Falls back to classifying the columns of the first and last runs
    /// when no explicit table was saved. Unreadable runs are skipped.
    fn signal_table(&self) -> ProcessingResult<SignalTable> {
        let path = self.signals_path();
        if path.is_file() {
            let descriptors: Vec<SignalDescriptor> = Self::read_json(&path)?;
            return Ok(SignalTable::from_descriptors(descriptors));
        }

        let ids = self.run_ids()?;
        let mut acquisition = Vec::new();
        let mut navigation = Vec::new();
        let mut candidates: Vec<RunId> = ids.first().into_iter().chain(ids.last()).copied().collect();
        candidates.dedup();
        for id in candidates {
            let run = match self.load_run(id) {
                Ok(run) => run,
                Err(e) => {
                    warn!("run {} skipped while building the signal table: {}", id, e);
                    continue;
                }
            };
            for column in run.acquisition_columns {
                if !acquisition.contains(&column) {
                    acquisition.push(column);
                }
            }
            for column in run.navigation_columns {
                if !navigation.contains(&column) {
                    navigation.push(column);
                }
            }
        }
        Ok(SignalTable::build(&acquisition, &navigation))
    }

    fn calibrations(&self) -> ProcessingResult<Vec<CalibrationRecord>> {
        Self::json_files(&self.calibration_dir())?
            .iter()
            .map(|path| Self::read_json::<CalibrationRecord>(path).map(CalibrationRecord::with_sized_curves))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::FrameParser;
    use crate::signal::CalibrationKind;
    use crate::timestamp::parse_matlab_date;

    fn run_file() -> RawRunFile {
        let mut par = BTreeMap::new();
        par.insert("RunID".to_string(), MetadataValue::Int(105));
        par.insert("NINumSamples".to_string(), MetadataValue::Int(3));
        let mut input_pairs = BTreeMap::new();
        input_pairs.insert("WheelSpeedMotor".to_string(), 2);
        input_pairs.insert("SteerPotentiometer".to_string(), 1);
        input_pairs.insert("PullForceBridge".to_string(), 3);
        RawRunFile {
            par,
            ni_data: vec![
                vec![Some(1.0), Some(2.0), Some(3.0)],
                vec![Some(4.0), None],
            ],
            input_pairs,
            vnav_cols: vec!["Angular RateZ\u{1}junk".into()],
            vnav_data_text: vec![format!("{}\u{0}\u{7f}", FrameParser::encode("VNQMR,0.1").trim_end())],
        }
    }

    fn record() -> CalibrationRecord {
        CalibrationRecord {
            calibration_id: "A00001".into(),
            name: "SteerPotentiometer".into(),
            signal: "SteerAngle".into(),
            time_stamp: parse_matlab_date("01-Mar-2011 10:00:00").unwrap(),
            slope: 1.0,
            bias: f64::NAN,
            offset: 0.0,
            calibration_supply_voltage: 5.0,
            run_supply_voltage: 5.0,
            run_supply_voltage_source: "na".into(),
            units: "degree".into(),
            rsq: 1.0,
            accuracy: String::new(),
            sensor_type: String::new(),
            notes: String::new(),
            x: vec![1.0],
            y: Vec::new(),
            v: Vec::new(),
        }
    }

    #[test]
    fn loads_run_in_input_pair_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        store.write_run(RunId(105), &run_file()).unwrap();

        assert_eq!(store.run_ids().unwrap(), vec![RunId(105)]);
        let run = store.load_run(RunId(105)).unwrap();
        assert_eq!(run.acquisition_columns, vec!["SteerPotentiometer", "WheelSpeedMotor"]);
        assert_eq!(run.acquisition.dim(), (2, 3));
        assert_eq!(run.acquisition[[1, 0]], 4.0);
        assert!(run.acquisition[[1, 1]].is_nan());
        assert!(run.acquisition[[1, 2]].is_nan());
        assert_eq!(run.navigation_columns, vec!["AngularRateZ"]);
        assert_eq!(run.navigation_lines[0], FrameParser::encode("VNQMR,0.1").trim_end());
        assert_eq!(run.metadata.notes(), "");
    }

    #[test]
    fn signal_table_falls_back_to_run_columns() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        store.write_run(RunId(105), &run_file()).unwrap();

        let table = store.signal_table().unwrap();
        assert_eq!(
            table.get("SteerPotentiometer").unwrap().calibration,
            CalibrationKind::InterceptStar
        );
        assert!(table.get("AngularRateZ").is_ok());
        assert!(table.get("ForwardSpeed").is_ok());

        fs::write(dir.path().join("signals.json"), "[]").unwrap();
        assert!(store.signal_table().unwrap().get("SteerPotentiometer").is_err());
    }

    #[test]
    fn unreadable_last_run_does_not_hide_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        store.write_run(RunId(105), &run_file()).unwrap();
        store.write_run(RunId(106), &run_file()).unwrap();
        fs::write(dir.path().join("runs").join("00107.json"), "{}").unwrap();

        let table = store.signal_table().unwrap();
        assert!(table.get("SteerPotentiometer").is_ok());
        assert!(table.get("AngularRateZ").is_ok());
        assert!(store.load_run(RunId(107)).is_err());
    }

    #[test]
    fn calibration_curves_are_sized_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        store.write_calibration(&record()).unwrap();

        let records = store.calibrations().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].x.len(), 50);
        assert_eq!(records[0].name, "SteerPotentiometer");
    }

    #[test]
    fn missing_run_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        assert!(store.run_ids().unwrap().is_empty());
        assert!(matches!(store.load_run(RunId(1)), Err(ProcessingError::Storage(_))));
    }
}
