//! Logistic regression on encoded records

use crate::error::{FairBalanceError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Weights {
    coefficients: Array1<f64>,
    intercept: f64,
}

/// L2-regularised logistic regression fitted by batch gradient descent.
///
/// The intercept is always fitted and is not regularised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// L2 penalty on the coefficients
    pub l2: f64,
    pub max_iter: usize,
    /// Stop once the gradient norm drops below this
    pub tol: f64,
    pub learning_rate: f64,
    weights: Option<Weights>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            l2: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            weights: None,
        }
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }

    fn sigmoid(v: f64) -> f64 {
        1.0 / (1.0 + (-v).exp())
    }

    /// Fit on an encoded matrix and 0/1 targets
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(FairBalanceError::ShapeError {
                expected: format!("{} targets", n_samples),
                actual: format!("{} targets", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(FairBalanceError::InsufficientData {
                required: 1,
                available: 0,
                class: None,
            });
        }

        let n = n_samples as f64;
        let mut coefficients = Array1::zeros(x.ncols());
        let mut intercept = 0.0;

        for _ in 0..self.max_iter {
            let errors = (x.dot(&coefficients) + intercept).mapv(Self::sigmoid) - y;
            let grad_w = x.t().dot(&errors) / n + self.l2 * &coefficients;
            let grad_b = errors.sum() / n;

            if (grad_w.dot(&grad_w) + grad_b * grad_b).sqrt() < self.tol {
                break;
            }
            coefficients.scaled_add(-self.learning_rate, &grad_w);
            intercept -= self.learning_rate * grad_b;
        }

        self.weights = Some(Weights {
            coefficients,
            intercept,
        });
        Ok(())
    }

    fn weights(&self) -> Result<&Weights> {
        self.weights.as_ref().ok_or(FairBalanceError::ModelNotFitted)
    }

    /// Positive-class probability of every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.weights()?;
        if x.ncols() != w.coefficients.len() {
            return Err(FairBalanceError::ShapeError {
                expected: format!("{} columns", w.coefficients.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok((x.dot(&w.coefficients) + w.intercept).mapv(Self::sigmoid))
    }

    /// Positive-class probability of a single encoded row
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let w = self.weights()?;
        if row.len() != w.coefficients.len() {
            return Err(FairBalanceError::ShapeError {
                expected: format!("{} values", w.coefficients.len()),
                actual: format!("{} values", row.len()),
            });
        }
        Ok(Self::sigmoid(row.dot(&w.coefficients) + w.intercept))
    }
}
