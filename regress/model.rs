use crate::preprocess::apply_feature_transform;
use crate::types::Weights;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Public Data Structures ---
// Configuration and fitted state are plain serde-derivable values so callers
// can persist them however they like.

/// How the posterior mean is recomputed inside the hyperparameter loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PosteriorSolver {
    /// Reuse the one-time eigendecomposition of `phi * phi^T`; every iteration
    /// only rescales the eigenvalues.
    #[default]
    Eigen,
    /// Factor `beta * phi * phi^T + alpha * I` from scratch on every iteration.
    /// Slower, kept as a cross-check of the eigen path.
    Cholesky,
}

/// Estimator settings. Construction stores these and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianRidgeConfig {
    /// Subtract the per-feature mean from the design and the mean from the
    /// responses before fitting.
    pub center: bool,
    /// Divide each feature by its population standard deviation.
    pub scale: bool,
    pub max_iterations: usize,
    /// Stop once `|d_alpha / alpha + d_beta / beta|` falls to or below this.
    pub tolerance: f64,
    /// Relative threshold on `lambda_min / lambda_max` of `phi * phi^T` at or
    /// below which the design is treated as colinear. `None` uses the
    /// numerical-rank threshold `max(P, N) * f64::EPSILON`, the rounding level
    /// of the Gram matrix itself. `Some(0.0)` only rejects eigenvalues that are
    /// exactly zero or negative.
    pub singular_tolerance: Option<f64>,
    pub solver: PosteriorSolver,
}

impl Default for BayesianRidgeConfig {
    fn default() -> Self {
        Self {
            center: true,
            scale: false,
            max_iterations: 50,
            tolerance: 1e-3,
            singular_tolerance: None,
            solver: PosteriorSolver::Eigen,
        }
    }
}

impl BayesianRidgeConfig {
    pub fn with_flags(center: bool, scale: bool) -> Self {
        Self {
            center,
            scale,
            ..Self::default()
        }
    }
}

/// Precision hyperparameters at the end of the fixed-point iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Prior precision of the weights.
    pub alpha: f64,
    /// Noise precision.
    pub beta: f64,
    /// Effective number of well-determined weight directions.
    pub gamma: f64,
}

impl Hyperparameters {
    /// Estimated noise variance, `1 / beta`.
    pub fn noise_variance(&self) -> f64 {
        1.0 / self.beta
    }
}

/// Outcome of the hyperparameter loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// The convergence criterion reached the tolerance.
    Converged,
    /// The iteration cap was hit first; the last estimate is kept.
    MaxIterationsReached,
    /// A precision or the criterion became NaN or infinite, which ends the
    /// loop early. The non-finite values are kept as computed.
    NonFinite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub status: FitStatus,
    pub iterations: usize,
    /// Last value of `|d_alpha / alpha + d_beta / beta|`.
    pub criterion: f64,
    /// Root mean squared error on the raw training data.
    pub training_rmse: f64,
    pub min_eigenvalue: f64,
    pub max_eigenvalue: f64,
    pub solver: PosteriorSolver,
}

/// Everything needed to predict: the preprocessing statistics, the posterior
/// over the weights, and the hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub data_offset: Array1<f64>,
    pub data_scale: Array1<f64>,
    pub response_offset: f64,
    pub weights: Weights,
    /// Posterior covariance of the weights, `(alpha * I + beta * phi * phi^T)^-1`.
    pub covariance: Array2<f64>,
    pub hyperparameters: Hyperparameters,
    pub diagnostics: FitDiagnostics,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("The estimator has not been fitted; call fit before predicting.")]
    NotFitted,
    #[error("Points have {found} feature rows, but the model was trained on {expected}.")]
    FeatureCountMismatch { found: usize, expected: usize },
    #[error("Got {found} responses for {expected} observations.")]
    ResponseLengthMismatch { found: usize, expected: usize },
}

impl FittedModel {
    pub fn num_features(&self) -> usize {
        self.weights.len()
    }

    pub fn noise_variance(&self) -> f64 {
        self.hyperparameters.noise_variance()
    }

    /// Point predictions for the columns of `points`, shape `(P, M)`.
    pub fn predict(&self, points: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        let transformed = self.transform(points)?;
        Ok(self.linear_response(&transformed))
    }

    /// Point predictions plus the predictive standard deviation of each one,
    /// `sqrt(1 / beta + x^T * Sigma * x)` with `x` in the transformed space.
    pub fn predict_with_uncertainty(
        &self,
        points: ArrayView2<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>), ModelError> {
        let transformed = self.transform(points)?;
        let predictions = self.linear_response(&transformed);

        let noise = self.noise_variance();
        let std_devs = transformed
            .columns()
            .into_iter()
            .map(|x| {
                let quad: f64 = self
                    .covariance
                    .rows()
                    .into_iter()
                    .zip(x.iter())
                    .map(|(row, &xi)| xi * sequential_dot(row, x))
                    .sum();
                (noise + quad).sqrt()
            })
            .collect();

        Ok((predictions, std_devs))
    }

    /// Single-observation form of [`FittedModel::predict`]. The column is run
    /// through the batch path, so the result matches slicing a batch call.
    pub fn predict_point(&self, point: ArrayView1<f64>) -> Result<f64, ModelError> {
        let predictions = self.predict(point.insert_axis(Axis(1)))?;
        Ok(predictions[0])
    }

    pub fn predict_point_with_uncertainty(
        &self,
        point: ArrayView1<f64>,
    ) -> Result<(f64, f64), ModelError> {
        let (predictions, std_devs) = self.predict_with_uncertainty(point.insert_axis(Axis(1)))?;
        Ok((predictions[0], std_devs[0]))
    }

    /// Root mean squared error of the predictions on `design` against the raw
    /// `responses`.
    pub fn rmse(
        &self,
        design: ArrayView2<f64>,
        responses: ArrayView1<f64>,
    ) -> Result<f64, ModelError> {
        if responses.len() != design.ncols() {
            return Err(ModelError::ResponseLengthMismatch {
                found: responses.len(),
                expected: design.ncols(),
            });
        }
        let transformed = self.transform(design)?;
        Ok(self.rmse_transformed(&transformed, responses))
    }

    /// RMSE for points already pushed through the feature transform. Shapes
    /// are the caller's responsibility.
    pub(crate) fn rmse_transformed(
        &self,
        transformed: &Array2<f64>,
        responses: ArrayView1<f64>,
    ) -> f64 {
        let predictions = self.linear_response(transformed);
        let mse = (&responses - &predictions).mapv(|r| r * r).mean().unwrap_or(f64::NAN);
        mse.sqrt()
    }

    fn transform(&self, points: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        if points.nrows() != self.num_features() {
            return Err(ModelError::FeatureCountMismatch {
                found: points.nrows(),
                expected: self.num_features(),
            });
        }
        Ok(apply_feature_transform(
            points,
            self.data_offset.view(),
            self.data_scale.view(),
        ))
    }

    fn linear_response(&self, transformed: &Array2<f64>) -> Array1<f64> {
        let weights = self.weights.as_view();
        transformed
            .columns()
            .into_iter()
            .map(|x| sequential_dot(x, weights) + self.response_offset)
            .collect()
    }
}

/// Left-to-right dot product. `ArrayBase::dot` picks an unrolled kernel for
/// contiguous inputs, which would make a lone column disagree in the last bit
/// with the same column taken from a wider batch.
fn sequential_dot(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
