use crate::processing::sizing::{VectorSizer, CURVE_FIT_LENGTH};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

fn missing() -> f64 {
    f64::NAN
}

/// JSON has no NaN; missing measurements round-trip as `null`.
fn nullable<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn nullable_curve<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    let values = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn no_source() -> String {
    "na".to_string()
}

/// One calibration session of one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationRecord {
    #[serde(rename = "calibrationID")]
    pub calibration_id: String,
    /// Sensor name this record belongs to.
    pub name: String,
    /// Name given to the calibrated signal.
    pub signal: String,
    #[serde(with = "crate::timestamp::matlab_date")]
    pub time_stamp: NaiveDateTime,
    #[serde(default = "missing", deserialize_with = "nullable")]
    pub slope: f64,
    #[serde(default = "missing", deserialize_with = "nullable")]
    pub bias: f64,
    /// Intercept of the linear fit.
    #[serde(default = "missing", deserialize_with = "nullable")]
    pub offset: f64,
    #[serde(default = "missing", deserialize_with = "nullable")]
    pub calibration_supply_voltage: f64,
    #[serde(default = "missing", deserialize_with = "nullable")]
    pub run_supply_voltage: f64,
    /// Run column holding the measured supply, or `na` for a fixed value.
    #[serde(default = "no_source")]
    pub run_supply_voltage_source: String,
    #[serde(default)]
    pub units: String,
    #[serde(default = "missing", deserialize_with = "nullable")]
    pub rsq: f64,
    #[serde(default)]
    pub accuracy: String,
    #[serde(default)]
    pub sensor_type: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "nullable_curve")]
    pub x: Vec<f64>,
    #[serde(default, deserialize_with = "nullable_curve")]
    pub y: Vec<f64>,
    #[serde(default, deserialize_with = "nullable_curve")]
    pub v: Vec<f64>,
}

impl CalibrationRecord {
    /// Pads or cuts the curve-fit samples to their stored length.
    pub fn with_sized_curves(mut self) -> Self {
        self.x = VectorSizer::size(&self.x, CURVE_FIT_LENGTH);
        self.y = VectorSizer::size(&self.y, CURVE_FIT_LENGTH);
        self.v = VectorSizer::size(&self.v, CURVE_FIT_LENGTH);
        self
    }

    pub fn measures_supply(&self) -> Option<&str> {
        match self.run_supply_voltage_source.as_str() {
            "" | "na" => None,
            column => Some(column),
        }
    }
}
