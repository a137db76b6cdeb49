//! Weight generation: the polymorphic capability a derivative delegates to.
//!
//! Two variants implement [`WeightStrategy`]: forecast-driven models
//! ([`model::ModelWeights`]) and allocation-driven optimizers
//! ([`optimizer::EqualWeights`]). Variants are wired through a static
//! registry of tagged kinds rather than loaded by name at runtime.

pub mod model;
pub mod optimizer;

pub use model::{FitPolicy, ModelConfig, ModelWeights};
pub use optimizer::EqualWeights;

use crate::domain::error::TreefolioError;
use crate::domain::forecast::{Arima, Drift, Forecaster};
use crate::domain::series::Timestamp;
use crate::domain::signal::{PeriodReturn, Signal};

/// Read-only view of one child's history, precomputed by the environment.
/// Missing values stay `NaN`; `opens` already falls back to the close for
/// feeds without an open column, so the bar leg carries the whole
/// close-to-close move there.
#[derive(Debug, Clone)]
pub struct ChildWindow {
    pub stamps: Vec<Timestamp>,
    pub opens: Vec<f64>,
    pub closes: Vec<f64>,
    pub bar_returns: Vec<f64>,
    pub gap_returns: Vec<f64>,
}

impl ChildWindow {
    pub fn position(&self, ts: Timestamp) -> Option<usize> {
        self.stamps.binary_search(&ts).ok()
    }

    /// Both legs of the period return at `ts`, or `None` when the child has
    /// no computable return there (absent row, partial bar, or no prior
    /// close).
    pub fn period_return(&self, ts: Timestamp) -> Option<PeriodReturn> {
        let pos = self.position(ts)?;
        let bar = self.bar_returns[pos];
        let gap = self.gap_returns[pos];
        if bar.is_finite() && gap.is_finite() {
            Some(PeriodReturn { bar, gap })
        } else {
            None
        }
    }
}

/// The weight-generator contract consumed by derivatives.
///
/// `union` is the merged timestamp index of all children; the result is
/// aligned to `union[idx..]`, one `Vec<Signal>` (one entry per child) per
/// timestamp. `idx` is strictly an output-trimming hint: implementations are
/// free to recompute the full window and must produce the same suffix either
/// way.
pub trait WeightStrategy {
    fn weights(
        &mut self,
        children: &[ChildWindow],
        union: &[Timestamp],
        idx: usize,
    ) -> Result<Vec<Vec<Signal>>, TreefolioError>;
}

/// Forecasting model variants known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Arima { ar: usize, diff: usize, ma: usize },
    Drift,
}

/// Optimizer variants known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    EqualWeights,
}

/// Build a forecast-driven weight generator. `config.params` is consumed by
/// the ARIMA kind (pre-fitted parameter vector) and ignored by kinds without
/// estimated parameters.
pub fn create_model(kind: ModelKind, config: ModelConfig) -> Box<dyn WeightStrategy> {
    let forecaster: Box<dyn Forecaster> = match kind {
        ModelKind::Arima { ar, diff, ma } => match &config.params {
            Some(params) => Box::new(Arima::with_params(ar, diff, ma, params.clone())),
            None => Box::new(Arima::new(ar, diff, ma)),
        },
        ModelKind::Drift => Box::new(Drift::new()),
    };
    Box::new(ModelWeights::new(forecaster, config))
}

pub fn create_optimizer(kind: OptimizerKind) -> Box<dyn WeightStrategy> {
    match kind {
        OptimizerKind::EqualWeights => Box::new(EqualWeights),
    }
}
