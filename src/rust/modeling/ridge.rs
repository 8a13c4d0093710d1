use anyhow::{bail, ensure, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Linear regression with an L2 penalty on the coefficients (not the intercept).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegressor {
    pub alpha: f64,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl RidgeRegressor {
    /// Solves `(XcᵀXc + αI) w = Xcᵀyc` on mean-centered data, then recovers
    /// the intercept from the column means.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Self> {
        ensure!(x.nrows() > 0, "cannot fit on an empty feature matrix");
        ensure!(
            x.nrows() == y.len(),
            "feature rows ({}) and targets ({}) differ",
            x.nrows(),
            y.len()
        );
        ensure!(alpha >= 0.0, "alpha must be non-negative, got {}", alpha);

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| anyhow::anyhow!("feature matrix has no rows"))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let mut gram = xc.t().dot(&xc);
        for i in 0..gram.nrows() {
            gram[[i, i]] += alpha;
        }
        let rhs = xc.t().dot(&yc);
        let weights = solve(gram, rhs)?;
        let intercept = y_mean - x_mean.dot(&weights);

        Ok(Self {
            alpha,
            intercept,
            coefficients: weights.to_vec(),
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            bail!(
                "expected {} features, got {}",
                self.coefficients.len(),
                x.ncols()
            );
        }
        let weights = Array1::from(self.coefficients.clone());
        Ok(x.dot(&weights) + self.intercept)
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            bail!("normal equations are singular; increase alpha");
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
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

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_linear_relationship() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 3.0], [3.0, 1.0], [4.0, 5.0]];
        let y = x.column(0).mapv(|v| 2.0 * v) - x.column(1).to_owned() + 3.0;

        let model = RidgeRegressor::fit(&x, &y, 0.0).unwrap();
        assert!((model.intercept - 3.0).abs() < 1e-9);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients[1] + 1.0).abs() < 1e-9);

        let predicted = model.predict(&x).unwrap();
        for (p, t) in predicted.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_penalty_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let plain = RidgeRegressor::fit(&x, &y, 0.0).unwrap();
        let shrunk = RidgeRegressor::fit(&x, &y, 10.0).unwrap();
        assert!(shrunk.coefficients[0].abs() < plain.coefficients[0].abs());
    }

    #[test]
    fn test_singular_system_without_penalty() {
        // Duplicate columns make XᵀX singular.
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let y = array![1.0, 2.0, 3.0];
        assert!(RidgeRegressor::fit(&x, &y, 0.0).is_err());
        assert!(RidgeRegressor::fit(&x, &y, 1.0).is_ok());
    }

    #[test]
    fn test_predict_rejects_width_mismatch() {
        let model = RidgeRegressor {
            alpha: 1.0,
            intercept: 0.0,
            coefficients: vec![1.0, 2.0],
        };
        let x = array![[1.0, 2.0, 3.0]];
        assert!(model.predict(&x).is_err());
    }
}
