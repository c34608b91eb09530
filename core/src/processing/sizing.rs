use crate::prelude::{ProcessingError, ProcessingResult, SENTINEL};
use log::warn;
use ndarray::Array2;

/// Fixed length of the calibration curve-fit vectors.
pub const CURVE_FIT_LENGTH: usize = 50;

/// Pads or cuts sample vectors to a canonical length and back.
pub struct VectorSizer;

impl VectorSizer {
    /// Keeps the first `target` entries, right-padding with sentinels when short.
    pub fn size(vector: &[f64], target: usize) -> Vec<f64> {
        let mut sized: Vec<f64> = vector.iter().take(target).copied().collect();
        sized.resize(target, SENTINEL);
        sized
    }

    /// Drops padding beyond the reported number of valid samples.
    pub fn unsize(vector: &[f64], valid_count: usize) -> Vec<f64> {
        if valid_count > vector.len() {
            warn!(
                "{} valid samples reported but only {} stored; the source holds more data than was kept",
                valid_count,
                vector.len()
            );
            return vector.to_vec();
        }
        vector[..valid_count].to_vec()
    }

    /// Validates a length read from run metadata.
    pub fn checked_length(length: i64) -> ProcessingResult<usize> {
        usize::try_from(length).map_err(|_| ProcessingError::VectorLengthInvariantViolation(length))
    }

    /// Two-dimensional sizing: rows first, then columns, filling with sentinels.
    pub fn size_matrix(matrix: &Array2<f64>, rows: usize, cols: usize) -> Array2<f64> {
        let (have_rows, have_cols) = matrix.dim();
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            if r < have_rows && c < have_cols {
                matrix[[r, c]]
            } else {
                SENTINEL
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn size_pads_with_sentinels() {
        let sized = VectorSizer::size(&[1.0, 2.0], 5);
        assert_eq!(sized.len(), 5);
        assert_eq!(&sized[..2], &[1.0, 2.0]);
        assert!(sized[2..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn size_truncates_long_vectors() {
        assert_eq!(VectorSizer::size(&[1.0, 2.0, 3.0, 4.0], 2), vec![1.0, 2.0]);
        assert_eq!(VectorSizer::size(&[1.0, 2.0], 2), vec![1.0, 2.0]);
        assert!(VectorSizer::size(&[1.0], 0).is_empty());
    }

    #[test]
    fn unsize_restores_prefix() {
        let padded = VectorSizer::size(&[1.0, 2.0, 3.0], 6);
        assert_eq!(VectorSizer::unsize(&padded, 3), vec![1.0, 2.0, 3.0]);
        assert_eq!(VectorSizer::unsize(&padded, 0), Vec::<f64>::new());
    }

    #[test]
    fn unsize_keeps_vector_when_count_exceeds_length() {
        assert_eq!(VectorSizer::unsize(&[1.0, 2.0], 10), vec![1.0, 2.0]);
    }

    #[test]
    fn negative_lengths_are_rejected() {
        assert_eq!(VectorSizer::checked_length(18000).unwrap(), 18000);
        assert!(matches!(
            VectorSizer::checked_length(-1),
            Err(ProcessingError::VectorLengthInvariantViolation(-1))
        ));
    }

    #[test]
    fn size_matrix_pads_and_cuts() {
        let matrix = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let sized = VectorSizer::size_matrix(&matrix, 3, 2);
        assert_eq!(sized.dim(), (3, 2));
        assert_eq!(sized[[1, 1]], 5.0);
        assert!(sized.row(2).iter().all(|v| v.is_nan()));
    }
}
