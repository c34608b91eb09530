use anyhow::Context;
use bicyclecore::calibration::CalibrationRecord;
use bicyclecore::navigation::FrameParser;
use bicyclecore::run::MetadataValue;
use bicyclecore::signal::CalibrationKind;
use bicyclecore::storage::json::RawRunFile;
use bicyclecore::storage::JsonRunStore;
use bicyclecore::timestamp::parse_matlab_date;
use bicyclecore::{PhysicalParameters, RunId};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fs;

/// Configuration for generating a synthetic dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub runs: usize,
    /// Samples stored per channel.
    pub samples: usize,
    pub sample_rate: f64,
    /// Delay of the acquisition stream behind the navigation stream.
    pub lag_seconds: f64,
    /// Probability that a navigation line is damaged in transit.
    pub corruption_rate: f64,
    pub noise: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            runs: 3,
            samples: 2000,
            sample_rate: 100.0,
            lag_seconds: 0.07,
            corruption_rate: 0.01,
            noise: 0.002,
            seed: 0,
        }
    }
}

/// Navigation columns as the unit reports them; spaces are stripped on load.
const NAVIGATION_COLUMNS: &[&str] = &[
    "Angular Rate X",
    "Angular Rate Y",
    "Angular Rate Z",
    "Acceleration Z",
];

const RUN_DATE: &str = "21-Mar-2011 14:45:54";

/// One acquisition channel and the calibration that maps it to a signal.
struct Channel {
    column: &'static str,
    signal: &'static str,
    units: &'static str,
    kind: CalibrationKind,
    slope: f64,
    bias: f64,
    intercept: f64,
}

const CHANNELS: &[Channel] = &[
    Channel {
        column: "FrameAccelY",
        signal: "AccelerometerAccelerationY",
        units: "meter/second/second",
        kind: CalibrationKind::Bias,
        slope: 9.81,
        bias: 2.5,
        intercept: 0.0,
    },
    Channel {
        column: "SteerPotentiometer",
        signal: "SteerAngle",
        units: "degree",
        kind: CalibrationKind::InterceptStar,
        slope: 30.0,
        bias: 0.0,
        intercept: -75.0,
    },
    Channel {
        column: "RollPotentiometer",
        signal: "RollAngle",
        units: "degree",
        kind: CalibrationKind::InterceptStar,
        slope: 20.0,
        bias: 0.0,
        intercept: -50.0,
    },
    Channel {
        column: "WheelSpeedMotor",
        signal: "RearWheelRate",
        units: "radian/second",
        kind: CalibrationKind::Intercept,
        slope: 5.0,
        bias: 0.0,
        intercept: 0.0,
    },
    Channel {
        column: "SteerRateGyro",
        signal: "ForkRate",
        units: "radian/second",
        kind: CalibrationKind::Bias,
        slope: 1.2,
        bias: 2.5,
        intercept: 0.0,
    },
    Channel {
        column: "SteerTorqueSensor",
        signal: "SteerTubeTorque",
        units: "newton*meter",
        kind: CalibrationKind::Intercept,
        slope: 10.0,
        bias: 0.0,
        intercept: 0.0,
    },
    Channel {
        column: "PullForceBridge",
        signal: "PullForce",
        units: "pound",
        kind: CalibrationKind::Intercept,
        slope: 20.0,
        bias: 0.0,
        intercept: 0.0,
    },
];

const SUPPLY_VOLTAGE: f64 = 5.0;

impl Channel {
    /// Voltage that calibrates back to `physical` with the supply at its
    /// reference value.
    fn voltage(&self, physical: f64) -> f64 {
        match self.kind {
            CalibrationKind::Bias => physical / self.slope + self.bias,
            CalibrationKind::Intercept | CalibrationKind::InterceptStar => {
                (physical - self.intercept) / self.slope
            }
            CalibrationKind::None | CalibrationKind::Matrix | CalibrationKind::Na => physical,
        }
    }

    fn record(&self, date: &str, slope_scale: f64) -> anyhow::Result<CalibrationRecord> {
        let time_stamp = parse_matlab_date(date).with_context(|| format!("parsing {}", date))?;
        Ok(CalibrationRecord {
            calibration_id: format!("{}-{}", self.column, time_stamp.format("%Y%m%d")),
            name: self.column.to_string(),
            signal: self.signal.to_string(),
            time_stamp,
            slope: self.slope * slope_scale,
            bias: self.bias,
            offset: self.intercept,
            calibration_supply_voltage: SUPPLY_VOLTAGE,
            run_supply_voltage: SUPPLY_VOLTAGE,
            run_supply_voltage_source: if self.column == "SteerRateGyro" {
                "FiveVolts".to_string()
            } else {
                "na".to_string()
            },
            units: self.units.to_string(),
            rsq: 0.999,
            accuracy: "synthetic".to_string(),
            sensor_type: String::new(),
            notes: String::new(),
            x: (0..5).map(f64::from).collect(),
            y: (0..5).map(|v| f64::from(v) * self.slope).collect(),
            v: vec![SUPPLY_VOLTAGE; 5],
        })
    }
}

/// Physical state of the bicycle at time `t`.
struct Motion {
    phase: f64,
    centre: f64,
}

impl Motion {
    /// Oscillating lateral acceleration that fades out toward both ends.
    fn acceleration(&self, t: f64) -> f64 {
        let envelope = (-((t - self.centre) / 1.5).powi(2)).exp();
        2.0 * envelope * ((2.1 * t + self.phase).sin() + 0.4 * (5.3 * t).cos())
    }

    fn steer_angle(&self, t: f64) -> f64 {
        5.0 * (2.0 * PI * 0.5 * t + self.phase).sin()
    }

    fn steer_rate(&self, t: f64) -> f64 {
        (5.0 * PI / 180.0) * (2.0 * PI * 0.5) * (2.0 * PI * 0.5 * t + self.phase).cos()
    }

    fn roll_angle(&self, t: f64) -> f64 {
        2.0 * (2.0 * PI * 0.5 * t + self.phase + 0.3).sin()
    }

    fn roll_rate(&self, t: f64) -> f64 {
        (2.0 * PI / 180.0) * (2.0 * PI * 0.5) * (2.0 * PI * 0.5 * t + self.phase + 0.3).cos()
    }

    fn yaw_rate(&self, t: f64) -> f64 {
        0.1 * (2.0 * PI * 0.5 * t + self.phase).sin()
    }
}

fn physical_parameters() -> PhysicalParameters {
    vec![
        ("rR".to_string(), 0.3359),
        ("lam".to_string(), 0.3089),
        ("IHzz".to_string(), 0.0885),
        ("steerDamping".to_string(), 0.1),
        ("steerFriction".to_string(), 0.05),
    ]
    .into_iter()
    .collect()
}

fn parameters(run_id: RunId, config: &GeneratorConfig, rng: &mut StdRng) -> BTreeMap<String, MetadataValue> {
    let mut par = BTreeMap::new();
    par.insert("RunID".to_string(), MetadataValue::Int(i64::from(run_id.0)));
    par.insert("DateTime".to_string(), MetadataValue::Text(RUN_DATE.to_string()));
    par.insert("NINumSamples".to_string(), MetadataValue::Int(config.samples as i64));
    par.insert("NISampleRate".to_string(), MetadataValue::Float(config.sample_rate));
    par.insert("VNavSampleRate".to_string(), MetadataValue::Float(config.sample_rate));
    par.insert("Rider".to_string(), MetadataValue::Text("Synthetic".to_string()));
    par.insert("Bicycle".to_string(), MetadataValue::Text("Rigid".to_string()));
    par.insert("Environment".to_string(), MetadataValue::Text("Treadmill".to_string()));
    par.insert("Maneuver".to_string(), MetadataValue::Text("Balance".to_string()));
    par.insert("Speed".to_string(), MetadataValue::Int(rng.gen_range(2..8)));
    // async output register as the unit reported it at start-up
    par.insert(
        "ADOR".to_string(),
        MetadataValue::Text(FrameParser::encode("VNRRG,06,14").trim_end().to_string()),
    );
    par
}

fn navigation_line(values: &[f64], rng: &mut StdRng, config: &GeneratorConfig) -> String {
    let body: Vec<String> = values.iter().map(|v| format!("{:+.4}", v)).collect();
    let line = FrameParser::encode(&format!("VNQMR,{}", body.join(",")));
    let line = line.trim_end().to_string();
    if rng.gen_bool(config.corruption_rate) {
        // payload damaged after the checksum was computed
        let damaged = line.replacen(',', ";", 1);
        format!("{}\u{0}\u{3}", damaged)
    } else {
        line
    }
}

fn jitter(rng: &mut StdRng, noise: f64) -> f64 {
    rng.gen_range(-noise..=noise)
}

fn run_file(run_id: RunId, config: &GeneratorConfig, rng: &mut StdRng) -> RawRunFile {
    let rate = config.sample_rate;
    let duration = config.samples as f64 / rate;
    let motion = Motion {
        phase: rng.gen_range(0.0..2.0 * PI),
        centre: duration / 2.0,
    };
    let speed = rng.gen_range(3.0..6.0);
    let radius = 0.3359;
    let noise = config.noise;

    let mut ni_data: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(config.samples); CHANNELS.len() + 1];
    let mut vnav_data_text = Vec::with_capacity(config.samples);
    for i in 0..config.samples {
        let t = i as f64 / rate;
        let lagged = t - config.lag_seconds;
        for (row, channel) in CHANNELS.iter().enumerate() {
            let physical = match channel.signal {
                "AccelerometerAccelerationY" if lagged >= 0.0 => motion.acceleration(lagged),
                "AccelerometerAccelerationY" => 0.0,
                "SteerAngle" => motion.steer_angle(t),
                "RollAngle" => motion.roll_angle(t),
                "RearWheelRate" => speed / radius,
                "ForkRate" => motion.steer_rate(t) + motion.yaw_rate(t),
                "SteerTubeTorque" => 0.5 * motion.steer_rate(t),
                "PullForce" => 10.0 * motion.acceleration(t).abs(),
                _ => 0.0,
            };
            ni_data[row].push(Some(channel.voltage(physical) + jitter(rng, noise)));
        }
        ni_data[CHANNELS.len()].push(Some(SUPPLY_VOLTAGE));

        let navigation = [
            motion.roll_rate(t) + jitter(rng, noise),
            jitter(rng, noise),
            motion.yaw_rate(t) + jitter(rng, noise),
            motion.acceleration(t) + jitter(rng, noise),
        ];
        vnav_data_text.push(navigation_line(&navigation, rng, config));
    }

    let mut input_pairs: BTreeMap<String, i64> = CHANNELS
        .iter()
        .enumerate()
        .map(|(index, channel)| (channel.column.to_string(), index as i64 + 1))
        .collect();
    input_pairs.insert("FiveVolts".to_string(), CHANNELS.len() as i64 + 1);

    RawRunFile {
        par: parameters(run_id, config, rng),
        ni_data,
        input_pairs,
        vnav_cols: NAVIGATION_COLUMNS.iter().map(|c| c.to_string()).collect(),
        vnav_data_text,
    }
}

/// Writes runs, calibration history and physical parameters under the
/// store's root. Returns the ids of the written runs.
pub fn synthesize(store: &JsonRunStore, config: &GeneratorConfig) -> anyhow::Result<Vec<RunId>> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    for channel in CHANNELS {
        // the later session postdates every run and must never be chosen
        for (date, scale) in [("01-Mar-2011 09:00:00", 1.0), ("15-Jun-2011 09:00:00", 2.0)] {
            store
                .write_calibration(&channel.record(date, scale)?)
                .with_context(|| format!("writing calibration for {}", channel.column))?;
        }
    }

    let parameters_path = store.root().join("parameters.yaml");
    let yaml = serde_yaml::to_string(&physical_parameters()).context("encoding physical parameters")?;
    fs::write(&parameters_path, yaml)
        .with_context(|| format!("writing {}", parameters_path.display()))?;

    let mut ids = Vec::with_capacity(config.runs);
    for index in 0..config.runs {
        let run_id = RunId(index as u32 + 1);
        let file = run_file(run_id, config, &mut rng);
        store
            .write_run(run_id, &file)
            .with_context(|| format!("writing run {}", run_id))?;
        ids.push(run_id);
    }
    Ok(ids)
}
