use ndarray::{Array1, Array2, ArrayView2};

pub struct MatrixHelper;

impl MatrixHelper {
    pub fn multiply(lhs: ArrayView2<f64>, rhs: ArrayView2<f64>) -> Array2<f64> {
        lhs.dot(&rhs)
    }

    /// Stacks equal-length series as the rows of a matrix.
    pub fn stack_rows(rows: &[&Array1<f64>]) -> Option<Array2<f64>> {
        let width = rows.first()?.len();
        if rows.iter().any(|row| row.len() != width) {
            return None;
        }
        let flat: Vec<f64> = rows.iter().flat_map(|row| row.iter().copied()).collect();
        Array2::from_shape_vec((rows.len(), width), flat).ok()
    }
}
