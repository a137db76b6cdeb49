//! Pluggable one-step-ahead forecasters.
//!
//! The weighting layer consumes forecasters only through [`Forecaster`]; the
//! concrete estimator is swappable. Each instance is exclusively owned by one
//! weight generator and mutated only through sequential recompute calls.

pub mod arima;
pub mod drift;

pub use arima::Arima;
pub use drift::Drift;

use crate::domain::error::TreefolioError;

/// A forecaster over a buffer of scalar observations.
///
/// Positions refer to the observation buffer: `predict(start, end)` returns
/// one-step-ahead predictions for positions `start..=end` using the current
/// parameters, where position `n_obs()` is the trailing out-of-sample
/// forecast. Estimation failure surfaces as
/// [`TreefolioError::FitFailed`] and is never retried here.
pub trait Forecaster {
    /// Re-estimate from scratch on `obs`, replacing the observation buffer.
    fn fit(&mut self, obs: &[f64]) -> Result<(), TreefolioError>;

    /// Append observations to the buffer; re-estimate parameters on the
    /// expanded buffer only when `refit` is set.
    fn extend(&mut self, obs: &[f64], refit: bool) -> Result<(), TreefolioError>;

    /// One-step-ahead forecast past the end of the buffer.
    fn forecast(&self) -> Result<f64, TreefolioError>;

    /// One-step-ahead predictions for buffer positions `start..=end`.
    fn predict(&self, start: usize, end: usize) -> Result<Vec<f64>, TreefolioError>;

    fn n_obs(&self) -> usize;
}
