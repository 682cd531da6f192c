// regress/estimate.rs

//! # Evidence Maximization for Bayesian Ridge Regression
//!
//! The model is `t = omega^T * phi + noise` with a zero-mean isotropic Gaussian
//! prior of precision `alpha` on `omega` and Gaussian noise of precision `beta`.
//! Neither precision is supplied by the user; both are estimated from the data
//! by the classic fixed-point iteration that maximizes the marginal likelihood:
//!
//! 1.  **One-time setup:** form the Gram matrix `phi * phi^T` and the projection
//!     `phi * t`, then take a single symmetric eigendecomposition
//!     `phi * phi^T = V * diag(lambda) * V^T`.
//!
//! 2.  **Fixed point:** starting from a nearly flat prior, alternate between the
//!     posterior mean `omega = V * diag(1 / (lambda + alpha / beta)) * V^T * phi * t`,
//!     the effective number of parameters `gamma = sum(beta * lambda / (alpha + beta * lambda))`,
//!     and the precision updates `alpha = gamma / |omega|^2`,
//!     `beta = (N - gamma) / |t - omega^T * phi|^2`.
//!
//! 3.  **Posterior covariance:** once the precisions settle,
//!     `Sigma = V * diag(1 / (beta * lambda + alpha)) * V^T`.
//!
//! Because the eigenbasis does not depend on `alpha` or `beta`, each iteration
//! costs `O(P^2)` after the single `O(P^3)` decomposition. The Cholesky solver
//! refactors `beta * phi * phi^T + alpha * I` every iteration instead and is
//! only there to cross-check the eigen path.

use crate::faer_ndarray::FaerLinalgError;
use crate::model::{
    BayesianRidgeConfig, FitDiagnostics, FitStatus, FittedModel, Hyperparameters, PosteriorSolver,
};
use crate::preprocess::{center_scale, population_variance};
use crate::types::Weights;
use ndarray::{ArrayView1, ArrayView2};
use std::time::Instant;
use thiserror::Error;

/// Starting prior precision. Small enough that the first posterior mean is
/// essentially the least-squares solution.
const INITIAL_ALPHA: f64 = 1e-6;

/// The starting noise variance is this fraction of the response variance.
const INITIAL_NOISE_FRACTION: f64 = 0.1;

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error(
        "Training data is empty: {num_features} features and {num_observations} observations."
    )]
    EmptyInput {
        num_features: usize,
        num_observations: usize,
    },

    #[error(
        "The design matrix has {design_observations} observation columns but {responses} responses were supplied."
    )]
    DimensionMismatch {
        design_observations: usize,
        responses: usize,
    },

    #[error("Invalid estimator configuration: {0}")]
    InvalidConfig(String),

    #[error("Decomposition of the Gram matrix failed: {0}")]
    DecompositionFailed(#[from] FaerLinalgError),

    #[error(
        "The Gram matrix is singular (smallest eigenvalue {min_eigenvalue:.3e}, largest {max_eigenvalue:.3e}); two or more feature rows are colinear."
    )]
    SingularInput {
        min_eigenvalue: f64,
        max_eigenvalue: f64,
    },
}

/// Fits the posterior over the weights and the two precisions.
///
/// `design` has shape `(P, N)` with features as rows; `responses` has length
/// `N`. Nothing is retained between calls: the returned model is built from
/// scratch, so a failure can never leave half-updated state behind.
pub fn fit_posterior(
    design: ArrayView2<f64>,
    responses: ArrayView1<f64>,
    config: &BayesianRidgeConfig,
) -> Result<FittedModel, EstimationError> {
    validate_config(config)?;
    let start = Instant::now();

    let data = center_scale(design, responses, config.center, config.scale)?;
    let (num_features, num_observations) = data.phi.dim();
    log::info!(
        "Fitting Bayesian ridge: {} features, {} observations (center: {}, scale: {}, solver: {:?}).",
        num_features,
        num_observations,
        config.center,
        config.scale,
        config.solver
    );

    let singular_tolerance = config
        .singular_tolerance
        .unwrap_or(num_features.max(num_observations) as f64 * f64::EPSILON);
    let spectrum = internal::GramSpectrum::new(&data.phi, &data.t, singular_tolerance)?;

    let n = num_observations as f64;
    let mut alpha = INITIAL_ALPHA;
    let mut beta = 1.0 / (population_variance(data.t.view()) * INITIAL_NOISE_FRACTION);
    let mut gamma = 0.0;
    let mut omega = Weights::zeros(num_features);
    let mut criterion = f64::INFINITY;
    let mut iterations = 0;

    while criterion > config.tolerance && iterations < config.max_iterations {
        let (previous_alpha, previous_beta) = (alpha, beta);

        omega = Weights::new(match config.solver {
            PosteriorSolver::Eigen => spectrum.posterior_mean(alpha, beta),
            PosteriorSolver::Cholesky => spectrum.posterior_mean_cholesky(alpha, beta)?,
        });

        gamma = spectrum.effective_parameters(alpha, beta);
        alpha = gamma / omega.squared_norm();

        let residual = &data.t - &data.phi.t().dot(&omega.as_view());
        beta = (n - gamma) / residual.dot(&residual);

        criterion = ((alpha - previous_alpha) / alpha + (beta - previous_beta) / beta).abs();
        iterations += 1;

        log::debug!(
            "Iteration {}: alpha = {:.6e}, beta = {:.6e}, gamma = {:.4}, criterion = {:.3e}",
            iterations,
            alpha,
            beta,
            gamma,
            criterion
        );
    }

    let status = if !(alpha.is_finite() && beta.is_finite() && criterion.is_finite()) {
        log::warn!(
            "Precision estimates became non-finite after {} iterations (alpha = {}, beta = {}, criterion = {}); constant responses or a degenerate design are the usual cause.",
            iterations,
            alpha,
            beta,
            criterion
        );
        FitStatus::NonFinite
    } else if criterion <= config.tolerance {
        FitStatus::Converged
    } else {
        log::warn!(
            "Precision estimates did not converge within {} iterations (criterion {:.3e} > tolerance {:.3e}); keeping the last estimate.",
            iterations,
            criterion,
            config.tolerance
        );
        FitStatus::MaxIterationsReached
    };

    let covariance = match config.solver {
        PosteriorSolver::Eigen => spectrum.covariance(alpha, beta),
        PosteriorSolver::Cholesky => spectrum.covariance_cholesky(alpha, beta)?,
    };

    let mut model = FittedModel {
        data_offset: data.offset,
        data_scale: data.scale,
        response_offset: data.response_offset,
        weights: omega,
        covariance,
        hyperparameters: Hyperparameters { alpha, beta, gamma },
        diagnostics: FitDiagnostics {
            status,
            iterations,
            criterion,
            training_rmse: f64::NAN,
            min_eigenvalue: spectrum.min_eigenvalue(),
            max_eigenvalue: spectrum.max_eigenvalue(),
            solver: config.solver,
        },
    };
    model.diagnostics.training_rmse = model.rmse_transformed(&data.phi, responses);

    log::info!(
        "Bayesian ridge fit finished after {} iterations in {:.2?} ({:?}): alpha = {:.4e}, beta = {:.4e}, gamma = {:.3}, training RMSE = {:.6e}",
        iterations,
        start.elapsed(),
        status,
        alpha,
        beta,
        gamma,
        model.diagnostics.training_rmse
    );

    Ok(model)
}

fn validate_config(config: &BayesianRidgeConfig) -> Result<(), EstimationError> {
    if config.max_iterations == 0 {
        return Err(EstimationError::InvalidConfig(
            "max_iterations must be at least 1".to_string(),
        ));
    }
    if !config.tolerance.is_finite() || config.tolerance < 0.0 {
        return Err(EstimationError::InvalidConfig(format!(
            "tolerance must be finite and non-negative, got {}",
            config.tolerance
        )));
    }
    if let Some(tolerance) = config.singular_tolerance {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(EstimationError::InvalidConfig(format!(
                "singular_tolerance must be finite and non-negative, got {tolerance}"
            )));
        }
    }
    Ok(())
}

mod internal {
    use super::EstimationError;
    use crate::faer_ndarray::{FaerCholesky, FaerEigh};
    use faer::Side;
    use ndarray::{Array1, Array2, Axis, Zip};

    /// The one-time quantities of the fit: the Gram matrix, its eigenpairs, and
    /// the data projections every iteration reuses.
    pub(super) struct GramSpectrum {
        gram: Array2<f64>,
        eigenvalues: Array1<f64>,
        eigenvectors: Array2<f64>,
        /// `phi * t`.
        phi_t: Array1<f64>,
        /// `V^T * phi * t`, the projection rescaled on every iteration.
        rotated_phi_t: Array1<f64>,
    }

    impl GramSpectrum {
        pub(super) fn new(
            phi: &Array2<f64>,
            t: &Array1<f64>,
            singular_tolerance: f64,
        ) -> Result<Self, EstimationError> {
            let gram = symmetric_gram(phi);
            let (eigenvalues, eigenvectors) = gram.eigh(Side::Lower).map_err(|e| {
                log::warn!("Eigendecomposition of phi * phi^T failed: {e}");
                EstimationError::DecompositionFailed(e)
            })?;

            let min_eigenvalue = eigenvalues[0];
            let max_eigenvalue = eigenvalues[eigenvalues.len() - 1];
            if max_eigenvalue <= 0.0 || min_eigenvalue <= singular_tolerance * max_eigenvalue {
                log::warn!(
                    "Singular Gram matrix: smallest eigenvalue {min_eigenvalue:.3e}, largest {max_eigenvalue:.3e}. Two or more rows are colinear."
                );
                return Err(EstimationError::SingularInput {
                    min_eigenvalue,
                    max_eigenvalue,
                });
            }

            let phi_t = phi.dot(t);
            let rotated_phi_t = eigenvectors.t().dot(&phi_t);
            Ok(Self {
                gram,
                eigenvalues,
                eigenvectors,
                phi_t,
                rotated_phi_t,
            })
        }

        pub(super) fn min_eigenvalue(&self) -> f64 {
            self.eigenvalues[0]
        }

        pub(super) fn max_eigenvalue(&self) -> f64 {
            self.eigenvalues[self.eigenvalues.len() - 1]
        }

        /// `V * diag(1 / (lambda + alpha / beta)) * V^T * phi * t`.
        pub(super) fn posterior_mean(&self, alpha: f64, beta: f64) -> Array1<f64> {
            let ratio = alpha / beta;
            let shrunk = Zip::from(&self.rotated_phi_t)
                .and(&self.eigenvalues)
                .map_collect(|&r, &lambda| r / (lambda + ratio));
            self.eigenvectors.dot(&shrunk)
        }

        /// Solves `(beta * phi * phi^T + alpha * I) * omega = beta * phi * t` directly.
        pub(super) fn posterior_mean_cholesky(
            &self,
            alpha: f64,
            beta: f64,
        ) -> Result<Array1<f64>, EstimationError> {
            let factor = self.precision_matrix(alpha, beta).cholesky(Side::Lower)?;
            Ok(factor.solve_vec(&(&self.phi_t * beta)))
        }

        /// `gamma = sum(beta * lambda / (alpha + beta * lambda))`.
        pub(super) fn effective_parameters(&self, alpha: f64, beta: f64) -> f64 {
            self.eigenvalues
                .iter()
                .map(|&lambda| {
                    let scaled = beta * lambda;
                    scaled / (alpha + scaled)
                })
                .sum()
        }

        /// `V * diag(1 / (beta * lambda + alpha)) * V^T`.
        pub(super) fn covariance(&self, alpha: f64, beta: f64) -> Array2<f64> {
            let inverse = self.eigenvalues.mapv(|lambda| 1.0 / (beta * lambda + alpha));
            let scaled_vectors = &self.eigenvectors * &inverse.insert_axis(Axis(0));
            symmetrize(scaled_vectors.dot(&self.eigenvectors.t()))
        }

        pub(super) fn covariance_cholesky(
            &self,
            alpha: f64,
            beta: f64,
        ) -> Result<Array2<f64>, EstimationError> {
            let factor = self.precision_matrix(alpha, beta).cholesky(Side::Lower)?;
            Ok(symmetrize(factor.inverse(self.gram.nrows())))
        }

        /// `beta * phi * phi^T + alpha * I`, the posterior precision of the weights.
        fn precision_matrix(&self, alpha: f64, beta: f64) -> Array2<f64> {
            let mut precision = &self.gram * beta;
            precision.diag_mut().mapv_inplace(|d| d + alpha);
            precision
        }
    }

    /// `phi * phi^T` with the lower triangle mirrored from the upper one so the
    /// result is exactly symmetric.
    pub(super) fn symmetric_gram(phi: &Array2<f64>) -> Array2<f64> {
        let mut gram = phi.dot(&phi.t());
        let p = gram.nrows();
        for i in 0..p {
            for j in 0..i {
                gram[(i, j)] = gram[(j, i)];
            }
        }
        gram
    }

    pub(super) fn symmetrize(matrix: Array2<f64>) -> Array2<f64> {
        let transposed = matrix.t().to_owned();
        (matrix + transposed) * 0.5
    }
}
