//! L2-regularized logistic regression fitted by Newton's method

use super::sigmoid;
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

const PIVOT_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    c: f64,
    max_iter: usize,
    tol: f64,
    weights: Vec<f64>,
    intercept: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-8,
            weights: Vec::new(),
            intercept: 0.0,
        }
    }
}

impl LogisticRegression {
    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Minimizes mean log-loss + ‖w‖²/(2·C·n); the intercept is unpenalized
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        let (n, d) = x.dim();
        let alpha = 1.0 / (self.c * n as f64);
        let mut theta = Array1::<f64>::zeros(d + 1);

        for _ in 0..self.max_iter {
            let mut grad = Array1::<f64>::zeros(d + 1);
            let mut hess = Array2::<f64>::zeros((d + 1, d + 1));

            for (row, &target) in x.rows().into_iter().zip(y.iter()) {
                let z = row.dot(&theta.slice(ndarray::s![..d])) + theta[d];
                let p = sigmoid(z);
                let s = p * (1.0 - p);
                let r = p - target;

                for j in 0..d {
                    grad[j] += r * row[j];
                    for k in j..d {
                        hess[[j, k]] += s * row[j] * row[k];
                    }
                    hess[[j, d]] += s * row[j];
                }
                grad[d] += r;
                hess[[d, d]] += s;
            }

            grad /= n as f64;
            hess /= n as f64;
            for j in 0..d {
                grad[j] += alpha * theta[j];
                hess[[j, j]] += alpha;
                for k in (j + 1)..=d {
                    hess[[k, j]] = hess[[j, k]];
                }
            }
            hess[[d, d]] += PIVOT_EPS;

            let step = solve(hess, grad)?;
            theta -= &step;
            if step.iter().all(|v| v.abs() < self.tol) {
                break;
            }
        }

        self.weights = theta.slice(ndarray::s![..d]).to_vec();
        self.intercept = theta[d];
        Ok(())
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let z: f64 = row.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>() + self.intercept;
        sigmoid(z)
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[[i, col]]
                    .abs()
                    .partial_cmp(&a[[j, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[[pivot, col]].abs() < PIVOT_EPS {
            return Err(Error::Training("Singular Hessian in logistic regression".to_string()));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut out = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * out[k]).sum();
        out[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(out)
}
