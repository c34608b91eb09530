//! Time-scoped calibration records and the equations that apply them.

pub mod calibrator;
pub mod record;
pub mod store;

pub use calibrator::{SignalCalibrator, NO_SCALE_SENSORS};
pub use record::CalibrationRecord;
pub use store::CalibrationStore;
