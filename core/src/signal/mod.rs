//! Signal values, their metadata, and the catalogue of known signals.

pub mod descriptor;
pub mod series;
pub mod units;

pub use descriptor::{CalibrationKind, SignalDescriptor, SignalTable, Source, PROCESSED_SIGNALS};
pub use series::{time_vector, RawSignal, Signal, SignalMeta, SupplyVoltage};
pub use units::conversion_factor;
