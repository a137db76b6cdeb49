//! ARIMA(p,d,q) forecaster estimated by conditional least squares.
//!
//! AR-only orders are fitted with one OLS pass; mixed ARMA orders use the
//! Hannan-Rissanen two-stage regression (long-AR residuals feed the MA
//! lags). Prediction runs the residual recursion on the d-times differenced
//! series and integrates back to price levels. A pre-fitted parameter vector
//! can be supplied to skip estimation entirely.

use super::Forecaster;
use crate::domain::error::TreefolioError;

#[derive(Debug, Clone)]
pub struct Arima {
    ar: usize,
    diff: usize,
    ma: usize,
    fixed_params: Option<Vec<f64>>,
    obs: Vec<f64>,
    intercept: f64,
    phi: Vec<f64>,
    theta: Vec<f64>,
    fitted: bool,
}

impl Arima {
    pub fn new(ar: usize, diff: usize, ma: usize) -> Self {
        Arima {
            ar,
            diff,
            ma,
            fixed_params: None,
            obs: Vec::new(),
            intercept: 0.0,
            phi: Vec::new(),
            theta: Vec::new(),
            fitted: false,
        }
    }

    /// Parameter layout: `[intercept, phi_1..phi_p, theta_1..theta_q]`.
    pub fn with_params(ar: usize, diff: usize, ma: usize, params: Vec<f64>) -> Self {
        let mut model = Self::new(ar, diff, ma);
        model.fixed_params = Some(params);
        model
    }

    pub fn order(&self) -> (usize, usize, usize) {
        (self.ar, self.diff, self.ma)
    }

    /// `levels[k]` is the k-times differenced observation buffer.
    fn levels(&self) -> Result<Vec<Vec<f64>>, TreefolioError> {
        if self.obs.len() <= self.diff {
            return Err(TreefolioError::FitFailed {
                reason: format!(
                    "need more than {} observations for {} rounds of differencing",
                    self.diff, self.diff
                ),
            });
        }
        let mut current = self.obs.clone();
        let mut levels = vec![current.clone()];
        for _ in 0..self.diff {
            current = difference(&current);
            levels.push(current.clone());
        }
        Ok(levels)
    }

    /// One-step predictions of the differenced series: `preds[t]` predicts
    /// `w[t]`; `preds[w.len()]` is the trailing forecast. Positions without
    /// enough AR lags predict the observation itself (zero residual).
    fn diff_predictions(&self, w: &[f64]) -> Vec<f64> {
        let n = w.len();
        let p = self.ar;
        let q = self.ma;
        let mut preds = vec![0.0; n + 1];
        let mut resid = vec![0.0; n];
        for t in 0..=n {
            if t < p {
                preds[t] = if t < n {
                    w[t]
                } else if n > 0 {
                    w[n - 1]
                } else {
                    self.intercept
                };
                continue;
            }
            let mut v = self.intercept;
            for i in 0..p {
                v += self.phi[i] * w[t - 1 - i];
            }
            for j in 0..q {
                if t > j {
                    v += self.theta[j] * resid[t - 1 - j];
                }
            }
            preds[t] = v;
            if t < n {
                resid[t] = w[t] - v;
            }
        }
        preds
    }

    fn estimate(&mut self) -> Result<(), TreefolioError> {
        if let Some(params) = &self.fixed_params {
            let expected = 1 + self.ar + self.ma;
            if params.len() != expected {
                return Err(TreefolioError::FitFailed {
                    reason: format!(
                        "expected {} parameters for ARIMA({},{},{}), got {}",
                        expected,
                        self.ar,
                        self.diff,
                        self.ma,
                        params.len()
                    ),
                });
            }
            self.intercept = params[0];
            self.phi = params[1..=self.ar].to_vec();
            self.theta = params[1 + self.ar..].to_vec();
            self.fitted = true;
            return Ok(());
        }

        let levels = self.levels()?;
        let w = &levels[self.diff];
        let (p, q) = (self.ar, self.ma);
        let n = w.len();
        if n < p + q + 2 {
            return Err(TreefolioError::FitFailed {
                reason: format!(
                    "{} differenced observations are too few for ARMA({p},{q})",
                    n
                ),
            });
        }

        let (intercept, phi, theta) = if q == 0 {
            if p == 0 {
                (w.iter().sum::<f64>() / n as f64, Vec::new(), Vec::new())
            } else {
                let mut rows = Vec::with_capacity(n - p);
                let mut ys = Vec::with_capacity(n - p);
                for t in p..n {
                    let mut x = Vec::with_capacity(p + 1);
                    x.push(1.0);
                    for i in 0..p {
                        x.push(w[t - 1 - i]);
                    }
                    rows.push(x);
                    ys.push(w[t]);
                }
                let coef = ols(&rows, &ys).ok_or_else(singular)?;
                (coef[0], coef[1..].to_vec(), Vec::new())
            }
        } else {
            // Hannan-Rissanen: long-AR residuals stand in for the
            // unobserved innovations in the MA regression.
            let m = (p + q + 2).min(n.saturating_sub(2) / 2).max(1);
            let mut resid = vec![0.0; n];
            {
                let mut rows = Vec::with_capacity(n - m);
                let mut ys = Vec::with_capacity(n - m);
                for t in m..n {
                    let mut x = Vec::with_capacity(m + 1);
                    x.push(1.0);
                    for i in 0..m {
                        x.push(w[t - 1 - i]);
                    }
                    rows.push(x);
                    ys.push(w[t]);
                }
                let coef = ols(&rows, &ys).ok_or_else(singular)?;
                for t in m..n {
                    let mut v = coef[0];
                    for i in 0..m {
                        v += coef[1 + i] * w[t - 1 - i];
                    }
                    resid[t] = w[t] - v;
                }
            }

            let t0 = p.max(m + q);
            if n <= t0 + p + q + 1 {
                return Err(TreefolioError::FitFailed {
                    reason: format!(
                        "{} differenced observations are too few for ARMA({p},{q})",
                        n
                    ),
                });
            }
            let mut rows = Vec::with_capacity(n - t0);
            let mut ys = Vec::with_capacity(n - t0);
            for t in t0..n {
                let mut x = Vec::with_capacity(1 + p + q);
                x.push(1.0);
                for i in 0..p {
                    x.push(w[t - 1 - i]);
                }
                for j in 0..q {
                    x.push(resid[t - 1 - j]);
                }
                rows.push(x);
                ys.push(w[t]);
            }
            let coef = ols(&rows, &ys).ok_or_else(singular)?;
            (
                coef[0],
                coef[1..=p].to_vec(),
                coef[1 + p..].to_vec(),
            )
        };

        if !intercept.is_finite()
            || phi.iter().any(|v| !v.is_finite())
            || theta.iter().any(|v| !v.is_finite())
        {
            return Err(TreefolioError::FitFailed {
                reason: "non-finite parameter estimate".into(),
            });
        }

        self.intercept = intercept;
        self.phi = phi;
        self.theta = theta;
        self.fitted = true;
        Ok(())
    }

    fn check_fitted(&self) -> Result<(), TreefolioError> {
        if self.fitted {
            Ok(())
        } else {
            Err(TreefolioError::FitFailed {
                reason: "ARIMA model used before fit".into(),
            })
        }
    }
}

impl Forecaster for Arima {
    fn fit(&mut self, obs: &[f64]) -> Result<(), TreefolioError> {
        self.obs = obs.to_vec();
        self.estimate()
    }

    fn extend(&mut self, obs: &[f64], refit: bool) -> Result<(), TreefolioError> {
        self.obs.extend_from_slice(obs);
        if refit { self.estimate() } else { Ok(()) }
    }

    fn forecast(&self) -> Result<f64, TreefolioError> {
        let n = self.obs.len();
        self.predict(n, n).map(|v| v[0])
    }

    fn predict(&self, start: usize, end: usize) -> Result<Vec<f64>, TreefolioError> {
        self.check_fitted()?;
        let n = self.obs.len();
        if start == 0 || end > n || start > end {
            return Err(TreefolioError::FitFailed {
                reason: format!("prediction range {start}..={end} outside 1..={n}"),
            });
        }
        let levels = self.levels()?;
        let preds = self.diff_predictions(&levels[self.diff]);
        let mut out = Vec::with_capacity(end - start + 1);
        for t in start..=end {
            if t < self.diff {
                // Not enough history to integrate back; neutral prediction.
                out.push(self.obs[t]);
                continue;
            }
            let mut v = preds[t - self.diff];
            for k in 0..self.diff {
                v += levels[k][t - 1 - k];
            }
            out.push(v);
        }
        Ok(out)
    }

    fn n_obs(&self) -> usize {
        self.obs.len()
    }
}

fn singular() -> TreefolioError {
    TreefolioError::FitFailed {
        reason: "singular normal equations".into(),
    }
}

fn difference(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// Least squares via normal equations.
fn ols(rows: &[Vec<f64>], ys: &[f64]) -> Option<Vec<f64>> {
    let k = rows.first()?.len();
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &y) in rows.iter().zip(ys) {
        for i in 0..k {
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
            xty[i] += row[i] * y;
        }
    }
    solve(xtx, xty)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for c in col..n {
                a[row][c] -= factor * a[col][c];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut v = b[row];
        for c in row + 1..n {
            v -= a[row][c] * x[c];
        }
        x[row] = v / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Pure AR(2) recursion with two starting values: the regression is
    /// exactly determined, so estimation recovers the generating parameters.
    fn ar2_series(n: usize) -> Vec<f64> {
        let mut x = vec![1.0, 2.0];
        for t in 2..n {
            let v = 0.9 * x[t - 1] - 0.2 * x[t - 2];
            x.push(v);
        }
        x
    }

    #[test]
    fn recovers_exact_ar2_parameters() {
        let mut model = Arima::new(2, 0, 0);
        model.fit(&ar2_series(30)).unwrap();
        assert_relative_eq!(model.phi[0], 0.9, epsilon = 1e-6);
        assert_relative_eq!(model.phi[1], -0.2, epsilon = 1e-6);
        assert_relative_eq!(model.intercept, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn forecast_follows_ar2_recursion() {
        let x = ar2_series(30);
        let mut model = Arima::new(2, 0, 0);
        model.fit(&x).unwrap();
        let expected = 0.9 * x[29] - 0.2 * x[28];
        assert_relative_eq!(model.forecast().unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn differencing_handles_linear_trend() {
        // x_t = 3t differences to a constant, so ARIMA(0,1,0) forecasts
        // last + 3 exactly.
        let x: Vec<f64> = (0..20).map(|t| 3.0 * t as f64).collect();
        let mut model = Arima::new(0, 1, 0);
        model.fit(&x).unwrap();
        assert_relative_eq!(model.forecast().unwrap(), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn fixed_params_skip_estimation() {
        // phi = 1 with zero intercept is the persistence forecast.
        let x = vec![5.0, 7.0, 6.0, 9.0];
        let mut model = Arima::with_params(1, 0, 0, vec![0.0, 1.0]);
        model.fit(&x).unwrap();
        assert_eq!(model.predict(1, 4).unwrap(), vec![5.0, 7.0, 6.0, 9.0]);
    }

    #[test]
    fn fixed_params_wrong_arity_fails() {
        let mut model = Arima::with_params(2, 0, 1, vec![0.0, 1.0]);
        let err = model.fit(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, TreefolioError::FitFailed { .. }));
    }

    #[test]
    fn too_few_observations_fail() {
        let mut model = Arima::new(3, 1, 2);
        let err = model.fit(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, TreefolioError::FitFailed { .. }));
    }

    /// Trend plus a seeded LCG perturbation. A noiseless deterministic
    /// series is fitted exactly by the long-AR stage, which leaves the MA
    /// regression with an all-zero residual column and singular normal
    /// equations.
    fn noisy_trend(n: usize) -> Vec<f64> {
        let mut state: u64 = 0x2545_F491_4F6C_DD1D;
        (0..n)
            .map(|t| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let noise = (state >> 33) as f64 / (1u64 << 31) as f64 - 0.5;
                100.0 + 0.5 * t as f64 + 2.0 * noise
            })
            .collect()
    }

    #[test]
    fn mixed_arma_order_estimates_finite_parameters() {
        let x = noisy_trend(80);
        let mut model = Arima::new(1, 0, 1);
        model.fit(&x).unwrap();
        assert!(model.forecast().unwrap().is_finite());
        assert_eq!(model.phi.len(), 1);
        assert_eq!(model.theta.len(), 1);
    }

    #[test]
    fn extend_without_refit_keeps_parameters() {
        let x = ar2_series(30);
        let mut model = Arima::new(2, 0, 0);
        model.fit(&x[..20]).unwrap();
        let phi_before = model.phi.clone();
        model.extend(&x[20..], false).unwrap();
        assert_eq!(model.phi, phi_before);
        assert_eq!(model.n_obs(), 30);
    }

    #[test]
    fn used_before_fit_fails() {
        let model = Arima::new(1, 0, 0);
        assert!(model.forecast().is_err());
    }
}
