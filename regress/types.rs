use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Posterior mean of the weight vector, one entry per feature, expressed in the
/// centered and scaled feature space the model was trained in.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights(pub Array1<f64>);

impl Weights {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    pub fn zeros(len: usize) -> Self {
        Self(Array1::zeros(len))
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }

    /// Squared Euclidean norm, the denominator of the prior-precision update.
    pub fn squared_norm(&self) -> f64 {
        self.0.dot(&self.0)
    }
}

impl Deref for Weights {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Array1<f64>> for Weights {
    fn from(values: Array1<f64>) -> Self {
        Self(values)
    }
}

impl From<Weights> for Array1<f64> {
    fn from(values: Weights) -> Self {
        values.0
    }
}
