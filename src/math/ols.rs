//! Weighted least squares and ridge regression.
//!
//! The explainer repeatedly solves tiny regression problems of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - b - x_i^T β)^2 + α ||β||^2
//! ```
//!
//! Implementation choices:
//! - The intercept is handled by centering `X` and `y` on their weighted means
//!   and recovering `b = ȳ - x̄^T β` afterwards, so it is never penalized.
//! - Rows are scaled by `sqrt(w_i)` and the ridge penalty is appended as
//!   `sqrt(α) I` rows, which turns every variant into one ordinary least
//!   squares problem.
//! - That problem is solved with SVD so rank-deficient designs (a binary
//!   column that is constant in the neighborhood) still yield the minimum-norm
//!   solution instead of failing.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// A fitted linear model with an unpenalized intercept.
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub intercept: f64,
    pub coef: Vec<f64>,
}

impl LinearFit {
    /// Predict for one row (`row.len()` must match `coef.len()`).
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coef
                .iter()
                .zip(row.iter())
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }

    /// Predict for every row of `x`.
    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        DVector::from_iterator(
            x.nrows(),
            (0..x.nrows()).map(|i| {
                self.intercept
                    + self
                        .coef
                        .iter()
                        .enumerate()
                        .map(|(j, b)| b * x[(i, j)])
                        .sum::<f64>()
            }),
        )
    }
}

/// Fit weighted ridge regression with an intercept.
///
/// `alpha = 0` gives plain weighted least squares. Returns `None` for empty
/// input, mismatched shapes, non-positive total weight, or an unsolvable system.
pub fn fit_weighted_ridge(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    w: &DVector<f64>,
    alpha: f64,
) -> Option<LinearFit> {
    let n = x.nrows();
    let p = x.ncols();
    if n == 0 || y.len() != n || w.len() != n || !(alpha.is_finite() && alpha >= 0.0) {
        return None;
    }

    let w_sum: f64 = w.iter().sum();
    if !(w_sum.is_finite() && w_sum > 0.0) || w.iter().any(|v| *v < 0.0) {
        return None;
    }

    let y_mean = w.dot(y) / w_sum;
    if p == 0 {
        return Some(LinearFit {
            intercept: y_mean,
            coef: Vec::new(),
        });
    }

    let x_mean: Vec<f64> = (0..p)
        .map(|j| x.column(j).dot(w) / w_sum)
        .collect();

    let penalty_rows = if alpha > 0.0 { p } else { 0 };
    let mut a = DMatrix::<f64>::zeros(n + penalty_rows, p);
    let mut b = DVector::<f64>::zeros(n + penalty_rows);

    for i in 0..n {
        let sw = w[i].sqrt();
        for j in 0..p {
            a[(i, j)] = sw * (x[(i, j)] - x_mean[j]);
        }
        b[i] = sw * (y[i] - y_mean);
    }
    let sa = alpha.sqrt();
    for j in 0..penalty_rows {
        a[(n + j, j)] = sa;
    }

    let beta = solve_least_squares(&a, &b)?;
    let coef: Vec<f64> = beta.iter().copied().collect();
    let intercept = y_mean - coef.iter().zip(x_mean.iter()).map(|(b, m)| b * m).sum::<f64>();

    if !intercept.is_finite() {
        return None;
    }

    Some(LinearFit { intercept, coef })
}

/// Weighted coefficient of determination.
///
/// Matches the usual convention for degenerate targets: a constant `y` scores
/// `1.0` when predicted exactly and `0.0` otherwise.
pub fn weighted_r2(y: &DVector<f64>, y_hat: &DVector<f64>, w: &DVector<f64>) -> f64 {
    let w_sum: f64 = w.iter().sum();
    if !(w_sum > 0.0) {
        return 0.0;
    }
    let y_mean = w.dot(y) / w_sum;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for i in 0..y.len() {
        ss_res += w[i] * (y[i] - y_hat[i]).powi(2);
        ss_tot += w[i] * (y[i] - y_mean).powi(2);
    }

    if ss_tot <= f64::EPSILON * w_sum {
        return if ss_res <= f64::EPSILON * w_sum { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
