// regress/preprocess.rs

//! # Data Preprocessing
//!
//! Before fitting, each feature row of the design matrix is optionally centered
//! on its mean and divided by its population standard deviation, and the
//! responses are optionally centered on their mean. The offsets and scales are
//! returned alongside the transformed data because they become part of the
//! fitted model: every prediction must push new points through exactly the same
//! transformation.
//!
//! Layout convention used throughout the crate: features are rows, observations
//! are columns. A design of shape `(P, N)` holds `N` observations of `P`
//! features.

use crate::estimate::EstimationError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// The transformed training problem plus the statistics needed to undo the
/// transformation at prediction time.
#[derive(Clone, Debug)]
pub struct PreprocessedData {
    /// Centered and scaled design, shape `(P, N)`.
    pub phi: Array2<f64>,
    /// Centered responses, length `N`.
    pub t: Array1<f64>,
    /// Per-feature offsets. All zeros when centering is disabled.
    pub offset: Array1<f64>,
    /// Per-feature scales. All ones when scaling is disabled.
    pub scale: Array1<f64>,
    /// Mean of the responses, or zero when centering is disabled.
    pub response_offset: f64,
}

/// Checks that the design and responses describe the same, non-empty set of
/// observations.
pub fn validate_training_shapes(
    design: ArrayView2<f64>,
    responses: ArrayView1<f64>,
) -> Result<(), EstimationError> {
    let (num_features, num_observations) = design.dim();
    if num_features == 0 || num_observations == 0 {
        return Err(EstimationError::EmptyInput {
            num_features,
            num_observations,
        });
    }
    if responses.len() != num_observations {
        return Err(EstimationError::DimensionMismatch {
            design_observations: num_observations,
            responses: responses.len(),
        });
    }
    Ok(())
}

/// Centers and scales the training data.
///
/// The caller's arrays are only read. With `center == false` the offsets are
/// exactly zero; with `scale == false` the scales are exactly one, so the
/// transformation is the identity bit for bit.
pub fn center_scale(
    design: ArrayView2<f64>,
    responses: ArrayView1<f64>,
    center: bool,
    scale: bool,
) -> Result<PreprocessedData, EstimationError> {
    validate_training_shapes(design, responses)?;
    let (num_features, num_observations) = design.dim();

    let (offset, response_offset) = if center {
        let empty = || EstimationError::EmptyInput {
            num_features,
            num_observations,
        };
        let offset = design.mean_axis(Axis(1)).ok_or_else(empty)?;
        let response_offset = responses.mean().ok_or_else(empty)?;
        (offset, response_offset)
    } else {
        (Array1::zeros(num_features), 0.0)
    };

    let scale_vec = if scale {
        let stddev = design.std_axis(Axis(1), 0.0);
        let constant: Vec<usize> = stddev
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == 0.0)
            .map(|(j, _)| j)
            .collect();
        if !constant.is_empty() {
            log::warn!(
                "Features {:?} have zero standard deviation; scaling them yields non-finite values.",
                constant
            );
        }
        stddev
    } else {
        Array1::ones(num_features)
    };

    let phi = apply_feature_transform(design, offset.view(), scale_vec.view());
    let t = responses.mapv(|y| y - response_offset);

    Ok(PreprocessedData {
        phi,
        t,
        offset,
        scale: scale_vec,
        response_offset,
    })
}

/// Applies `(x - offset) / scale` to every column of `points`.
///
/// `points` has shape `(P, M)`; `offset` and `scale` have length `P`.
pub fn apply_feature_transform(
    points: ArrayView2<f64>,
    offset: ArrayView1<f64>,
    scale: ArrayView1<f64>,
) -> Array2<f64> {
    let offset_col = offset.insert_axis(Axis(1));
    let scale_col = scale.insert_axis(Axis(1));
    (&points - &offset_col) / &scale_col
}

/// Population variance (divides by `N`).
pub fn population_variance(values: ArrayView1<f64>) -> f64 {
    values.var(0.0)
}
