// regress/faer_ndarray.rs

//! Thin bridge between `ndarray` containers and `faer` decompositions.
//!
//! The estimator keeps all of its state in `ndarray` types. The heavy
//! factorizations (symmetric eigendecomposition, Cholesky) are delegated to
//! `faer`, and results are copied back into owned `ndarray` arrays.

use faer::diag::DiagRef;
use faer::linalg::solvers::{self, Solve};
use faer::{Mat, MatRef, Side};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaerLinalgError {
    #[error("Self-adjoint eigendecomposition failed: {0:?}")]
    SelfAdjointEigen(solvers::EvdError),
    #[error("Cholesky factorization failed: {0:?}")]
    Cholesky(solvers::LltError),
    #[error("Matrix contains {count} non-finite entries; refusing to factorize")]
    NonFiniteInput { count: usize },
}

fn mat_to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

fn diag_to_array(diag: DiagRef<'_, f64>) -> Array1<f64> {
    let mat = diag.column_vector().as_mat();
    Array1::from_shape_fn(mat.nrows(), |i| mat[(i, 0)])
}

fn ensure_finite<S: Data<Elem = f64>>(array: &ArrayBase<S, Ix2>) -> Result<(), FaerLinalgError> {
    let count = array.iter().filter(|v| !v.is_finite()).count();
    if count > 0 {
        return Err(FaerLinalgError::NonFiniteInput { count });
    }
    Ok(())
}

enum FaerStorage<'a> {
    Borrowed(MatRef<'a, f64>),
    Owned(Mat<f64>),
}

impl FaerStorage<'_> {
    #[inline]
    fn as_ref(&self) -> MatRef<'_, f64> {
        match self {
            FaerStorage::Borrowed(view) => *view,
            FaerStorage::Owned(mat) => mat.as_ref(),
        }
    }
}

/// A `faer` view over an `ndarray` matrix. Standard (row-major) layouts are
/// borrowed without copying; anything else is copied once.
pub struct FaerArrayView<'a> {
    storage: FaerStorage<'a>,
}

impl<'a> FaerArrayView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix2>) -> Self {
        let storage = match array.as_slice() {
            Some(slice) => FaerStorage::Borrowed(MatRef::from_row_major_slice(
                slice,
                array.nrows(),
                array.ncols(),
            )),
            None => {
                let (rows, cols) = array.dim();
                FaerStorage::Owned(Mat::from_fn(rows, cols, |i, j| array[(i, j)]))
            }
        };
        Self { storage }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        self.storage.as_ref()
    }
}

pub struct FaerColView<'a> {
    storage: FaerStorage<'a>,
}

impl<'a> FaerColView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix1>) -> Self {
        let len = array.len();
        let storage = match array.as_slice() {
            Some(slice) => FaerStorage::Borrowed(MatRef::from_row_major_slice(slice, len, 1)),
            None => FaerStorage::Owned(Mat::from_fn(len, 1, |i, _| array[i])),
        };
        Self { storage }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        self.storage.as_ref()
    }
}

/// Symmetric eigendecomposition with eigenvalues in ascending order.
///
/// Only the triangle selected by `side` is read. The columns of the returned
/// matrix are the orthonormal eigenvectors matching each eigenvalue.
pub trait FaerEigh {
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError>;
}

impl<S: Data<Elem = f64>> FaerEigh for ArrayBase<S, Ix2> {
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError> {
        ensure_finite(self)?;
        let faer_view = FaerArrayView::new(self);
        let eigen = faer_view
            .as_ref()
            .self_adjoint_eigen(side)
            .map_err(FaerLinalgError::SelfAdjointEigen)?;
        let values = diag_to_array(eigen.S());
        let vectors = mat_to_array(eigen.U());

        // faer already returns nondecreasing eigenvalues; sorting keeps the
        // ordering contract independent of the backend.
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
        if order.iter().enumerate().all(|(pos, &idx)| pos == idx) {
            return Ok((values, vectors));
        }
        let sorted_values = Array1::from_shape_fn(values.len(), |k| values[order[k]]);
        let sorted_vectors =
            Array2::from_shape_fn(vectors.dim(), |(row, k)| vectors[(row, order[k])]);
        Ok((sorted_values, sorted_vectors))
    }
}

pub struct FaerCholeskyFactor {
    factor: solvers::Llt<f64>,
}

impl FaerCholeskyFactor {
    pub fn solve_vec<S: Data<Elem = f64>>(&self, rhs: &ArrayBase<S, Ix1>) -> Array1<f64> {
        let rhs_view = FaerColView::new(rhs);
        let sol = self.factor.solve(rhs_view.as_ref());
        Array1::from_shape_fn(rhs.len(), |i| sol[(i, 0)])
    }

    pub fn solve_mat<S: Data<Elem = f64>>(&self, rhs: &ArrayBase<S, Ix2>) -> Array2<f64> {
        let rhs_view = FaerArrayView::new(rhs);
        let sol = self.factor.solve(rhs_view.as_ref());
        mat_to_array(sol.as_ref())
    }

    /// Inverse of the factored matrix, obtained by solving against the identity.
    pub fn inverse(&self, dim: usize) -> Array2<f64> {
        self.solve_mat(&Array2::<f64>::eye(dim))
    }
}

pub trait FaerCholesky {
    fn cholesky(&self, side: Side) -> Result<FaerCholeskyFactor, FaerLinalgError>;
}

impl<S: Data<Elem = f64>> FaerCholesky for ArrayBase<S, Ix2> {
    fn cholesky(&self, side: Side) -> Result<FaerCholeskyFactor, FaerLinalgError> {
        ensure_finite(self)?;
        let faer_view = FaerArrayView::new(self);
        let factor = faer_view
            .as_ref()
            .llt(side)
            .map_err(FaerLinalgError::Cholesky)?;
        Ok(FaerCholeskyFactor { factor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_spd(n: usize, rng: &mut StdRng) -> Array2<f64> {
        let mut mat = Array2::zeros((n, 2 * n));
        for i in 0..n {
            for j in 0..2 * n {
                mat[(i, j)] = rng.gen_range(-1.0..1.0);
            }
        }
        mat.dot(&mat.t())
    }

    #[test]
    fn eigh_reconstructs_symmetric_matrix() {
        let mut rng = StdRng::seed_from_u64(7);
        let matrix = random_spd(6, &mut rng);
        let (values, vectors) = matrix.eigh(Side::Lower).unwrap();

        for w in values.windows(2) {
            assert!(w[0] <= w[1], "eigenvalues not ascending: {values}");
        }

        let rebuilt = vectors.dot(&Array2::from_diag(&values)).dot(&vectors.t());
        for (a, b) in rebuilt.iter().zip(matrix.iter()) {
            assert!((a - b).abs() < 1e-10, "reconstruction mismatch {a} vs {b}");
        }

        let gram = vectors.t().dot(&vectors);
        for ((i, j), v) in gram.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((v - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn eigh_rejects_non_finite_entries() {
        let matrix = array![[1.0, f64::NAN], [f64::NAN, 2.0]];
        match matrix.eigh(Side::Lower) {
            Err(FaerLinalgError::NonFiniteInput { count }) => assert_eq!(count, 2),
            other => panic!("expected NonFiniteInput, got {other:?}"),
        }
    }

    #[test]
    fn eigh_accepts_transposed_views() {
        let matrix = array![[4.0, 1.0, 0.0], [1.0, 3.0, 0.5], [0.0, 0.5, 2.0]];
        let (values, _) = matrix.eigh(Side::Lower).unwrap();
        let (values_t, _) = matrix.t().eigh(Side::Lower).unwrap();
        for (a, b) in values.iter().zip(values_t.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn cholesky_solves_and_inverts() {
        let mut rng = StdRng::seed_from_u64(11);
        let matrix = random_spd(5, &mut rng);
        let rhs = Array1::from_shape_fn(5, |i| i as f64 - 2.0);

        let factor = matrix.cholesky(Side::Lower).unwrap();
        let x = factor.solve_vec(&rhs);
        let back = matrix.dot(&x);
        for (a, b) in back.iter().zip(rhs.iter()) {
            assert!((a - b).abs() < 1e-9);
        }

        let inv = factor.inverse(5);
        let identity = matrix.dot(&inv);
        for ((i, j), v) in identity.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((v - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn cholesky_reports_indefinite_matrix() {
        let matrix = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(matches!(
            matrix.cholesky(Side::Lower),
            Err(FaerLinalgError::Cholesky(_))
        ));
    }
}
