use crate::calibration::record::CalibrationRecord;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::signal::{CalibrationKind, RawSignal, Signal, SignalMeta, SupplyVoltage};
use log::debug;
use ndarray::Array1;

/// Sensors whose calibration has not been measured yet; passed through as-is.
pub const NO_SCALE_SENSORS: &[&str] = &["LeanPotentiometer", "HipPotentiometer", "TwistPotentiometer"];

/// Converts raw sensor voltages to physical units.
pub struct SignalCalibrator;

impl SignalCalibrator {
    /// Whether scaling `raw` needs a calibration record at all.
    pub fn requires_calibration(raw: &RawSignal) -> bool {
        !matches!(raw.calibration, CalibrationKind::None | CalibrationKind::Matrix)
            && !NO_SCALE_SENSORS.contains(&raw.name())
    }

    pub fn scale(
        raw: &RawSignal,
        record: &CalibrationRecord,
        supply: &SupplyVoltage,
    ) -> ProcessingResult<Signal> {
        if !Self::requires_calibration(raw) {
            debug!("not scaling {}", raw.name());
            return Ok(raw.signal.clone());
        }
        if raw.calibration == CalibrationKind::Na {
            return Err(ProcessingError::UnknownCalibrationKind("na".to_string()));
        }

        let name = raw.name();
        let values = raw.signal.values();
        let slope = record.slope;
        let bias = record.bias;
        let intercept = record.offset;
        let reference = record.calibration_supply_voltage;
        if reference == 0.0 || !reference.is_finite() {
            return Err(ProcessingError::InvalidSupplyVoltage {
                signal: name.to_string(),
                voltage: reference,
            });
        }
        let supply = Self::supply_samples(name, supply, values.len())?;

        debug!(
            "scaling {} as {:?}: slope {}, bias {}, intercept {}",
            name, raw.calibration, slope, bias, intercept
        );

        let scaled: Array1<f64> = match raw.calibration {
            CalibrationKind::Bias => (values - &(&supply / reference * bias)) * slope,
            CalibrationKind::Intercept => (values * slope + intercept) * reference / &supply,
            CalibrationKind::InterceptStar => values * slope * reference / &supply + intercept,
            CalibrationKind::None | CalibrationKind::Matrix | CalibrationKind::Na => {
                return Ok(raw.signal.clone())
            }
        };

        let meta = SignalMeta {
            name: record.signal.clone(),
            units: record.units.clone(),
            ..raw.signal.meta().clone()
        };
        Ok(Signal::new(scaled, meta))
    }

    fn supply_samples(name: &str, supply: &SupplyVoltage, len: usize) -> ProcessingResult<Array1<f64>> {
        let check = |voltage: f64| {
            if voltage == 0.0 || !voltage.is_finite() {
                Err(ProcessingError::InvalidSupplyVoltage {
                    signal: name.to_string(),
                    voltage,
                })
            } else {
                Ok(())
            }
        };
        match supply {
            SupplyVoltage::Constant(voltage) => {
                check(*voltage)?;
                Ok(Array1::from_elem(len, *voltage))
            }
            SupplyVoltage::PerSample(samples) => {
                if samples.len() != len {
                    return Err(ProcessingError::SignalLengthMismatch {
                        signal: name.to_string(),
                        expected: len,
                        actual: samples.len(),
                    });
                }
                for &voltage in samples.iter() {
                    check(voltage)?;
                }
                Ok(samples.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Source;
    use crate::timestamp::parse_matlab_date;
    use ndarray::array;

    fn raw(name: &str, kind: CalibrationKind, data: Array1<f64>) -> RawSignal {
        RawSignal {
            signal: Signal::new(
                data,
                SignalMeta {
                    name: name.into(),
                    run_id: "00105".into(),
                    sample_rate: 200.0,
                    source: Source::Acquisition,
                    units: "volts".into(),
                },
            ),
            calibration: kind,
            sensor: name.into(),
            timestamp: parse_matlab_date("21-Mar-2011 14:45:54").unwrap(),
            supply: None,
        }
    }

    fn record(slope: f64, bias: f64, offset: f64, reference: f64) -> CalibrationRecord {
        CalibrationRecord {
            calibration_id: "00001".into(),
            name: "Sensor".into(),
            signal: "Physical".into(),
            time_stamp: parse_matlab_date("01-Jan-2011 00:00:00").unwrap(),
            slope,
            bias,
            offset,
            calibration_supply_voltage: reference,
            run_supply_voltage: 5.0,
            run_supply_voltage_source: "na".into(),
            units: "radian".into(),
            rsq: 1.0,
            accuracy: String::new(),
            sensor_type: String::new(),
            notes: String::new(),
            x: Vec::new(),
            y: Vec::new(),
            v: Vec::new(),
        }
    }

    #[test]
    fn bias_equation() {
        let sig = raw("SteerRateGyro", CalibrationKind::Bias, array![3.0]);
        let out = SignalCalibrator::scale(&sig, &record(2.0, 1.0, 0.0, 5.0), &SupplyVoltage::Constant(5.0)).unwrap();
        assert!((out.values()[0] - 4.0).abs() < 1e-12);
        assert_eq!(out.name(), "Physical");
        assert_eq!(out.units(), "radian");
        assert_eq!(out.source(), Source::Acquisition);
    }

    #[test]
    fn intercept_equation() {
        let sig = raw("SteerTorqueSensor", CalibrationKind::Intercept, array![2.0]);
        let out = SignalCalibrator::scale(&sig, &record(1.5, 0.0, 0.2, 5.0), &SupplyVoltage::Constant(5.0)).unwrap();
        assert!((out.values()[0] - 3.2).abs() < 1e-12);
    }

    #[test]
    fn intercept_is_ratiometric() {
        let sig = raw("SteerTorqueSensor", CalibrationKind::Intercept, array![2.0]);
        let out = SignalCalibrator::scale(&sig, &record(1.5, 0.0, 0.2, 5.0), &SupplyVoltage::Constant(2.5)).unwrap();
        assert!((out.values()[0] - 6.4).abs() < 1e-12);
    }

    #[test]
    fn intercept_star_equation() {
        let sig = raw("SteerPotentiometer", CalibrationKind::InterceptStar, array![1.0, 2.0]);
        let out = SignalCalibrator::scale(&sig, &record(3.0, 0.0, -1.0, 5.0), &SupplyVoltage::Constant(2.5)).unwrap();
        assert_eq!(out.values().to_vec(), vec![5.0, 11.0]);
    }

    #[test]
    fn per_sample_supply_is_applied_elementwise() {
        let sig = raw("FrameAccelerometerY", CalibrationKind::Bias, array![3.0, 3.0]);
        let supply = SupplyVoltage::PerSample(array![5.0, 2.5]);
        let out = SignalCalibrator::scale(&sig, &record(2.0, 1.0, 0.0, 5.0), &supply).unwrap();
        assert_eq!(out.values().to_vec(), vec![4.0, 5.0]);

        let short = SupplyVoltage::PerSample(array![5.0]);
        assert!(matches!(
            SignalCalibrator::scale(&sig, &record(2.0, 1.0, 0.0, 5.0), &short),
            Err(ProcessingError::SignalLengthMismatch { .. })
        ));
    }

    #[test]
    fn identity_kinds_and_excluded_sensors_pass_through() {
        let rec = record(2.0, 1.0, 0.0, 5.0);
        let supply = SupplyVoltage::Constant(5.0);
        for sig in [
            raw("FiveVolts", CalibrationKind::None, array![1.0]),
            raw("SeatpostBridge1", CalibrationKind::Matrix, array![1.0]),
            raw("LeanPotentiometer", CalibrationKind::InterceptStar, array![1.0]),
        ] {
            assert!(!SignalCalibrator::requires_calibration(&sig));
            let out = SignalCalibrator::scale(&sig, &rec, &supply).unwrap();
            assert_eq!(out, sig.signal);
        }
    }

    #[test]
    fn zero_supply_fails_fast() {
        let sig = raw("SteerTorqueSensor", CalibrationKind::Intercept, array![2.0]);
        assert!(matches!(
            SignalCalibrator::scale(&sig, &record(1.0, 0.0, 0.0, 5.0), &SupplyVoltage::Constant(0.0)),
            Err(ProcessingError::InvalidSupplyVoltage { .. })
        ));
        assert!(matches!(
            SignalCalibrator::scale(&sig, &record(1.0, 0.0, 0.0, 0.0), &SupplyVoltage::Constant(5.0)),
            Err(ProcessingError::InvalidSupplyVoltage { .. })
        ));
    }

    #[test]
    fn per_sample_supply_rejects_zero_and_non_finite_samples() {
        let sig = raw("SteerTorqueSensor", CalibrationKind::Intercept, array![2.0, 2.0]);
        let rec = record(1.0, 0.0, 0.0, 5.0);
        for bad in [array![5.0, 0.0], array![5.0, f64::NAN], array![f64::INFINITY, 5.0]] {
            assert!(matches!(
                SignalCalibrator::scale(&sig, &rec, &SupplyVoltage::PerSample(bad)),
                Err(ProcessingError::InvalidSupplyVoltage { .. })
            ));
        }
    }

    #[test]
    fn na_kind_is_rejected() {
        let sig = raw("SteerTorque", CalibrationKind::Na, array![2.0]);
        assert!(matches!(
            SignalCalibrator::scale(&sig, &record(1.0, 0.0, 0.0, 5.0), &SupplyVoltage::Constant(5.0)),
            Err(ProcessingError::UnknownCalibrationKind(_))
        ));
    }
}
