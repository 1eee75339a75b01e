use ndarray::{Array2, ArrayView1};

use super::error::RetrievalError;

/// Scales `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = ArrayView1::from(&*vector).dot(&ArrayView1::from(&*vector)).sqrt();
    if norm <= f32::EPSILON {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

/// Inner product of every row of `matrix` with `query`, best first.
///
/// Ties keep the lower row index first so results are deterministic.
pub fn rank_rows_by_inner_product(
    matrix: &Array2<f32>,
    query: &[f32],
) -> Result<Vec<(usize, f32)>, RetrievalError> {
    if matrix.ncols() != query.len() {
        return Err(RetrievalError::DimensionMismatch {
            expected: matrix.ncols(),
            actual: query.len(),
        });
    }
    let scores = matrix.dot(&ArrayView1::from(query));
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
    Ok(ranked)
}
