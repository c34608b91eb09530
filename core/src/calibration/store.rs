use crate::calibration::record::CalibrationRecord;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::timestamp::format_matlab_date;
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Every calibration record, grouped by sensor and ordered most recent first.
///
/// Read-only once built; batch workers share one instance.
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    records: HashMap<String, Vec<CalibrationRecord>>,
}

impl CalibrationStore {
    pub fn from_records(records: impl IntoIterator<Item = CalibrationRecord>) -> Self {
        let mut grouped: HashMap<String, Vec<CalibrationRecord>> = HashMap::new();
        for record in records {
            grouped.entry(record.name.clone()).or_default().push(record);
        }
        for sensor_records in grouped.values_mut() {
            sensor_records.sort_by(|a, b| b.time_stamp.cmp(&a.time_stamp));
        }
        Self { records: grouped }
    }

    pub fn for_sensor(&self, sensor: &str) -> ProcessingResult<&[CalibrationRecord]> {
        self.records
            .get(sensor)
            .map(Vec::as_slice)
            .filter(|records| !records.is_empty())
            .ok_or_else(|| ProcessingError::MissingCalibrationRecord(sensor.to_string()))
    }

    /// Most recent calibration taken no later than `run_timestamp`.
    pub fn select_for_date(
        &self,
        sensor: &str,
        run_timestamp: NaiveDateTime,
    ) -> ProcessingResult<&CalibrationRecord> {
        self.for_sensor(sensor)?
            .iter()
            .find(|record| record.time_stamp <= run_timestamp)
            .ok_or_else(|| ProcessingError::NoApplicableCalibration {
                sensor: sensor.to_string(),
                run_timestamp: format_matlab_date(&run_timestamp),
            })
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::parse_matlab_date;

    fn record(id: &str, sensor: &str, stamp: &str) -> CalibrationRecord {
        CalibrationRecord {
            calibration_id: id.into(),
            name: sensor.into(),
            signal: "SteerAngle".into(),
            time_stamp: parse_matlab_date(stamp).unwrap(),
            slope: 1.0,
            bias: 0.0,
            offset: 0.0,
            calibration_supply_voltage: 5.0,
            run_supply_voltage: 5.0,
            run_supply_voltage_source: "na".into(),
            units: "degree".into(),
            rsq: 1.0,
            accuracy: String::new(),
            sensor_type: String::new(),
            notes: String::new(),
            x: Vec::new(),
            y: Vec::new(),
            v: Vec::new(),
        }
    }

    fn store() -> CalibrationStore {
        CalibrationStore::from_records(vec![
            record("1", "SteerPotentiometer", "01-Jan-2011 00:00:00"),
            record("3", "SteerPotentiometer", "01-Jun-2011 00:00:00"),
            record("2", "SteerPotentiometer", "01-Mar-2011 00:00:00"),
            record("4", "RollPotentiometer", "01-Feb-2011 00:00:00"),
        ])
    }

    #[test]
    fn records_are_ordered_most_recent_first() {
        let store = store();
        let ids: Vec<&str> = store
            .for_sensor("SteerPotentiometer")
            .unwrap()
            .iter()
            .map(|r| r.calibration_id.as_str())
            .collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn selects_latest_calibration_not_after_run() {
        let store = store();
        let run = parse_matlab_date("15-Apr-2011 12:00:00").unwrap();
        let selected = store.select_for_date("SteerPotentiometer", run).unwrap();
        assert_eq!(selected.calibration_id, "2");

        let same_day = parse_matlab_date("01-Jun-2011 00:00:00").unwrap();
        assert_eq!(
            store.select_for_date("SteerPotentiometer", same_day).unwrap().calibration_id,
            "3"
        );
    }

    #[test]
    fn future_calibrations_are_never_used() {
        let store = store();
        let run = parse_matlab_date("15-Jan-2011 12:00:00").unwrap();
        assert!(matches!(
            store.select_for_date("RollPotentiometer", run),
            Err(ProcessingError::NoApplicableCalibration { .. })
        ));
    }

    #[test]
    fn unknown_sensor_is_missing() {
        let run = parse_matlab_date("15-Jan-2011 12:00:00").unwrap();
        assert!(matches!(
            store().select_for_date("HipPotentiometer", run),
            Err(ProcessingError::MissingCalibrationRecord(_))
        ));
    }
}
