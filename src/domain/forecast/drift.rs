//! Random-walk-with-drift forecaster.
//!
//! Predicts the previous observation plus the average step of the fit set.
//! Deterministic and cheap; the baseline model and the workhorse of the
//! engine tests.

use super::Forecaster;
use crate::domain::error::TreefolioError;

#[derive(Debug, Clone, Default)]
pub struct Drift {
    obs: Vec<f64>,
    drift: f64,
    fitted: bool,
}

impl Drift {
    pub fn new() -> Self {
        Self::default()
    }

    fn estimate(&mut self) -> Result<(), TreefolioError> {
        let n = self.obs.len();
        if n < 2 {
            return Err(TreefolioError::FitFailed {
                reason: format!("drift needs at least 2 observations, got {n}"),
            });
        }
        self.drift = (self.obs[n - 1] - self.obs[0]) / (n - 1) as f64;
        if !self.drift.is_finite() {
            return Err(TreefolioError::FitFailed {
                reason: "non-finite drift estimate".into(),
            });
        }
        self.fitted = true;
        Ok(())
    }

    fn check_fitted(&self) -> Result<(), TreefolioError> {
        if self.fitted {
            Ok(())
        } else {
            Err(TreefolioError::FitFailed {
                reason: "drift model used before fit".into(),
            })
        }
    }
}

impl Forecaster for Drift {
    fn fit(&mut self, obs: &[f64]) -> Result<(), TreefolioError> {
        self.obs = obs.to_vec();
        self.estimate()
    }

    fn extend(&mut self, obs: &[f64], refit: bool) -> Result<(), TreefolioError> {
        self.obs.extend_from_slice(obs);
        if refit { self.estimate() } else { Ok(()) }
    }

    fn forecast(&self) -> Result<f64, TreefolioError> {
        self.check_fitted()?;
        Ok(self.obs[self.obs.len() - 1] + self.drift)
    }

    fn predict(&self, start: usize, end: usize) -> Result<Vec<f64>, TreefolioError> {
        self.check_fitted()?;
        if start == 0 || end > self.obs.len() || start > end {
            return Err(TreefolioError::FitFailed {
                reason: format!(
                    "prediction range {start}..={end} outside 1..={}",
                    self.obs.len()
                ),
            });
        }
        Ok((start..=end).map(|t| self.obs[t - 1] + self.drift).collect())
    }

    fn n_obs(&self) -> usize {
        self.obs.len()
    }
}
