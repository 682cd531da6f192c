#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Bayesian ridge regression.
//!
//! Fits a linear model together with its weight-prior precision `alpha` and
//! noise precision `beta` by evidence maximization, then predicts with
//! per-point uncertainty. Designs are laid out with features as rows and
//! observations as columns.

pub mod engine;
pub mod estimate;
pub mod faer_ndarray;
pub mod model;
pub mod preprocess;
pub mod types;

pub use engine::BayesianRidge;
pub use estimate::{EstimationError, fit_posterior};
pub use model::{
    BayesianRidgeConfig, FitDiagnostics, FitStatus, FittedModel, Hyperparameters, ModelError,
    PosteriorSolver,
};
pub use types::Weights;
