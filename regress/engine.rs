//! The user-facing estimator.
//!
//! A `BayesianRidge` owns its configuration and at most one fitted model. A
//! successful `fit` replaces the previous model wholesale; a failed `fit`
//! leaves it untouched.

use crate::estimate::{EstimationError, fit_posterior};
use crate::model::{BayesianRidgeConfig, FitDiagnostics, FittedModel, Hyperparameters, ModelError};
use crate::types::Weights;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BayesianRidge {
    config: BayesianRidgeConfig,
    model: Option<FittedModel>,
}

impl BayesianRidge {
    pub fn new(config: BayesianRidgeConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// Default iteration cap (50) and tolerance (1e-3) with the given
    /// preprocessing flags.
    pub fn with_flags(center: bool, scale: bool) -> Self {
        Self::new(BayesianRidgeConfig::with_flags(center, scale))
    }

    /// Wraps an existing fitted model, e.g. one restored through serde.
    pub fn from_model(config: BayesianRidgeConfig, model: FittedModel) -> Self {
        Self {
            config,
            model: Some(model),
        }
    }

    /// Fits the model to `design` (features as rows, shape `(P, N)`) and
    /// `responses` (length `N`) and returns the training RMSE.
    pub fn fit(
        &mut self,
        design: ArrayView2<f64>,
        responses: ArrayView1<f64>,
    ) -> Result<f64, EstimationError> {
        let model = fit_posterior(design, responses, &self.config)?;
        let rmse = model.diagnostics.training_rmse;
        self.model = Some(model);
        Ok(rmse)
    }

    pub fn predict(&self, points: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        self.fitted()?.predict(points)
    }

    pub fn predict_with_uncertainty(
        &self,
        points: ArrayView2<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>), ModelError> {
        self.fitted()?.predict_with_uncertainty(points)
    }

    pub fn predict_point(&self, point: ArrayView1<f64>) -> Result<f64, ModelError> {
        self.fitted()?.predict_point(point)
    }

    pub fn predict_point_with_uncertainty(
        &self,
        point: ArrayView1<f64>,
    ) -> Result<(f64, f64), ModelError> {
        self.fitted()?.predict_point_with_uncertainty(point)
    }

    pub fn rmse(
        &self,
        design: ArrayView2<f64>,
        responses: ArrayView1<f64>,
    ) -> Result<f64, ModelError> {
        self.fitted()?.rmse(design, responses)
    }

    pub fn fitted(&self) -> Result<&FittedModel, ModelError> {
        self.model.as_ref().ok_or(ModelError::NotFitted)
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    pub fn config(&self) -> &BayesianRidgeConfig {
        &self.config
    }

    /// Moves the fitted model out, leaving the estimator unfitted.
    pub fn take_model(&mut self) -> Option<FittedModel> {
        self.model.take()
    }

    /// Drops the fitted model. The configuration is kept.
    pub fn reset(&mut self) {
        self.model = None;
    }

    // --- Read-only accessors; all `None` before the first successful fit ---

    pub fn weights(&self) -> Option<&Weights> {
        self.model.as_ref().map(|m| &m.weights)
    }

    pub fn covariance(&self) -> Option<&Array2<f64>> {
        self.model.as_ref().map(|m| &m.covariance)
    }

    pub fn data_offset(&self) -> Option<&Array1<f64>> {
        self.model.as_ref().map(|m| &m.data_offset)
    }

    pub fn data_scale(&self) -> Option<&Array1<f64>> {
        self.model.as_ref().map(|m| &m.data_scale)
    }

    pub fn response_offset(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.response_offset)
    }

    pub fn hyperparameters(&self) -> Option<Hyperparameters> {
        self.model.as_ref().map(|m| m.hyperparameters)
    }

    pub fn alpha(&self) -> Option<f64> {
        self.hyperparameters().map(|h| h.alpha)
    }

    pub fn beta(&self) -> Option<f64> {
        self.hyperparameters().map(|h| h.beta)
    }

    pub fn gamma(&self) -> Option<f64> {
        self.hyperparameters().map(|h| h.gamma)
    }

    /// Estimated noise variance, `1 / beta`.
    pub fn variance(&self) -> Option<f64> {
        self.hyperparameters().map(|h| h.noise_variance())
    }

    pub fn diagnostics(&self) -> Option<&FitDiagnostics> {
        self.model.as_ref().map(|m| &m.diagnostics)
    }
}
