//! Physical signals derived from the aligned, calibrated set.

use crate::math::MatrixHelper;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::processing::SignalFilter;
use crate::run::{PhysicalParameters, SignalMap};
use crate::signal::{Signal, SignalMeta, Source};
use ndarray::{array, Array1};

/// Signals copied to the computed set unchanged.
const PASS_THROUGH: &[&str] = &["FiveVolts", "PushButton", "RearWheelRate", "ThreeVolts"];

/// Wraps a freshly computed array with an explicit name and units.
fn derived(from: &Signal, values: Array1<f64>, name: &str, units: &str) -> Signal {
    Signal::new(
        values,
        SignalMeta {
            name: name.to_string(),
            units: units.to_string(),
            source: Source::Derived,
            ..from.meta().clone()
        },
    )
}

fn require_same_length(reference: &Signal, others: &[&Signal]) -> ProcessingResult<()> {
    for other in others {
        if other.len() != reference.len() {
            return Err(ProcessingError::SignalLengthMismatch {
                signal: other.name().to_string(),
                expected: reference.len(),
                actual: other.len(),
            });
        }
    }
    Ok(())
}

/// -1, 0 or 1; NaN stays NaN.
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        value * 0.0
    }
}

/// `rR * RearWheelRate`.
pub fn forward_speed(rear_wheel_rate: &Signal, parameters: &PhysicalParameters) -> ProcessingResult<Signal> {
    let radius = parameters.get("rR")?;
    let values = rear_wheel_rate.values() * radius;
    Ok(derived(rear_wheel_rate, values, "ForwardSpeed", "meter/second"))
}

/// Steer rate relative to the frame.
pub fn steer_rate(fork_rate: &Signal, angular_rate_z: &Signal) -> ProcessingResult<Signal> {
    require_same_length(fork_rate, &[angular_rate_z])?;
    let values = fork_rate.values() - angular_rate_z.values();
    Ok(derived(fork_rate, values, "SteerRate", "radian/second"))
}

/// Frame yaw, roll and pitch rates from the body-fixed rates of a sensor
/// tilted by the steer axis angle `lam`.
pub fn yaw_roll_pitch_rate(
    rate_x: &Signal,
    rate_y: &Signal,
    rate_z: &Signal,
    roll_angle: &Signal,
    parameters: &PhysicalParameters,
) -> ProcessingResult<(Signal, Signal, Signal)> {
    let lam = parameters.get("lam")?;
    require_same_length(rate_x, &[rate_y, rate_z, roll_angle])?;
    let rates = MatrixHelper::stack_rows(&[rate_x.values(), rate_y.values(), rate_z.values()])
        .ok_or_else(|| ProcessingError::SignalLengthMismatch {
            signal: rate_x.name().to_string(),
            expected: rate_y.len(),
            actual: rate_x.len(),
        })?;
    let rotation = array![
        [lam.cos(), 0.0, lam.sin()],
        [0.0, 1.0, 0.0],
        [-lam.sin(), 0.0, lam.cos()],
    ];
    let rotated = MatrixHelper::multiply(rotation.view(), rates.view());

    let roll = roll_angle.values();
    let yaw = Array1::from_shape_fn(rate_x.len(), |i| rotated[[2, i]] / roll[i].cos());
    let pitch = Array1::from_shape_fn(rate_x.len(), |i| {
        rotated[[1, i]] - rotated[[2, i]] * roll[i].tan()
    });
    let roll_rate = rotated.row(0).to_owned();

    Ok((
        derived(rate_z, yaw, "YawRate", "radian/second"),
        derived(rate_x, roll_rate, "RollRate", "radian/second"),
        derived(rate_y, pitch, "PitchRate", "radian/second"),
    ))
}

/// Torque applied by the rider: handlebar inertia about the steer axis,
/// bearing damping and Coulomb friction added to the measured tube torque.
///
/// Simplified model: only the steer-axis inertia term `IHzz * d(ForkRate)/dt`
/// is kept. The handlebar's frame rates about x and y and their derivatives
/// are ignored, as are its products of inertia.
pub fn steer_torque(
    fork_rate: &Signal,
    steer_rate: &Signal,
    steer_tube_torque: &Signal,
    parameters: &PhysicalParameters,
) -> ProcessingResult<Signal> {
    let inertia = parameters.get("IHzz")?;
    let damping = parameters.get("steerDamping")?;
    let friction = parameters.get("steerFriction")?;
    require_same_length(fork_rate, &[steer_rate, steer_tube_torque])?;
    let measured = steer_tube_torque.convert_units("newton*meter")?;

    let acceleration = fork_rate.time_derivative();
    let rate = steer_rate.values();
    let values = Array1::from_shape_fn(fork_rate.len(), |i| {
        inertia * acceleration[i] + damping * rate[i] + friction * sign(rate[i]) + measured.values()[i]
    });
    Ok(derived(fork_rate, values, "SteerTorque", "newton*meter"))
}

/// Builds the computed signal set from aligned signals. Angles, steer rate
/// and the frame rates go through `filter`.
pub fn derive(
    truncated: &SignalMap<Signal>,
    parameters: &PhysicalParameters,
    filter: &dyn SignalFilter,
) -> ProcessingResult<SignalMap<Signal>> {
    let mut computed = SignalMap::default();

    for name in PASS_THROUGH {
        if let Ok(signal) = truncated.get(name) {
            computed.insert(name, signal.clone())?;
        }
    }
    for name in ["RollAngle", "SteerAngle"] {
        if let Ok(signal) = truncated.get(name) {
            computed.insert(name, filter.filter(&signal.convert_units("radian")?)?)?;
        }
    }
    if let Ok(pull) = truncated.get("PullForce") {
        let negated = Signal::new(-pull.values(), pull.meta().clone());
        computed.insert("PullForce", negated.convert_units("newton")?)?;
    }

    computed.insert(
        "ForwardSpeed",
        forward_speed(truncated.get("RearWheelRate")?, parameters)?,
    )?;

    let steer = filter.filter(&steer_rate(
        truncated.get("ForkRate")?,
        truncated.get("AngularRateZ")?,
    )?)?;

    let roll_angle = truncated.get("RollAngle")?.convert_units("radian")?;
    let (yaw, roll, pitch) = yaw_roll_pitch_rate(
        truncated.get("AngularRateX")?,
        truncated.get("AngularRateY")?,
        truncated.get("AngularRateZ")?,
        &roll_angle,
        parameters,
    )?;
    computed.insert("YawRate", filter.filter(&yaw)?)?;
    computed.insert("RollRate", filter.filter(&roll)?)?;
    computed.insert("PitchRate", filter.filter(&pitch)?)?;

    let torque = steer_torque(
        truncated.get("ForkRate")?,
        &steer,
        truncated.get("SteerTubeTorque")?,
        parameters,
    )?;
    computed.insert("SteerRate", steer)?;
    computed.insert("SteerTorque", torque)?;

    Ok(computed)
}
