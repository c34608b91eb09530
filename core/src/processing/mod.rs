pub mod alignment;
pub mod filter;
pub mod sizing;

pub use alignment::{
    resample, AlignmentGrid, CrossCorrelationEstimator, InterpolatingAligner, SignalAligner,
    TimeShiftEstimator,
};
pub use filter::{fill_gaps, LowPassFilter, SignalFilter};
pub use sizing::{VectorSizer, CURVE_FIT_LENGTH};
