//! Processing core for instrumented-bicycle runs.
//!
//! Raw acquisition channels and navigation-unit telemetry are decoded,
//! sized to a common length, calibrated against time-scoped records,
//! aligned in time and turned into the physical signals of a run.

pub mod calibration;
pub mod math;
pub mod navigation;
pub mod prelude;
pub mod processing;
pub mod run;
pub mod signal;
pub mod storage;
pub mod telemetry;
pub mod timestamp;

pub use prelude::{AssemblyError, ProcessingConfig, ProcessingError, ProcessingResult};
pub use run::{PhysicalParameters, Run, RunAssembler, RunId};
