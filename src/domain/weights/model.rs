//! Forecast-driven weight generation with four re-fit policies.
//!
//! Signal construction: with one-step predictions `preds` starting at clean
//! position `s`, `raw[j] = sign(preds[j] - close[s+j-1])`. At position `t`
//! the bar leg takes `raw[t-s]` (the forecast made entering the bar) and the
//! gap leg `raw[t-s+1]`. Positions before `s` and the whole warm-up range
//! stay neutral. Rows with a missing close are excluded from the estimation
//! input until their complete print arrives.

use std::collections::HashMap;

use super::{ChildWindow, WeightStrategy};
use crate::domain::error::TreefolioError;
use crate::domain::forecast::Forecaster;
use crate::domain::series::Timestamp;
use crate::domain::signal::{Signal, sign};

/// Re-estimation cadence of the model's forecaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitPolicy {
    /// Fit once on the whole window and predict in-sample. Look-ahead within
    /// the fit is accepted; diagnostic use only.
    InSample,
    /// Fit on the first `window` rows, then extend observations without
    /// re-estimating.
    FitOnce,
    /// Re-estimate from scratch on the trailing `window` rows at every
    /// post-warm-up position.
    FitWindow,
    /// Fit on the first `window` rows, then re-estimate on an ever-expanding
    /// observation set.
    FitAll,
}

impl FitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitPolicy::InSample => "inSample",
            FitPolicy::FitOnce => "fitOnce",
            FitPolicy::FitWindow => "fitWindow",
            FitPolicy::FitAll => "fitAll",
        }
    }
}

impl std::str::FromStr for FitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insample" => Ok(FitPolicy::InSample),
            "fitonce" => Ok(FitPolicy::FitOnce),
            "fitwindow" => Ok(FitPolicy::FitWindow),
            "fitall" => Ok(FitPolicy::FitAll),
            _ => Err(format!(
                "unknown fit policy {s:?} (expected inSample, fitOnce, fitWindow or fitAll)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub window: usize,
    pub fit: FitPolicy,
    pub bar_only: bool,
    pub log_prices: bool,
    /// Pre-fitted parameter vector; when present, estimation is skipped and
    /// predictions run in-sample with the given parameters.
    pub params: Option<Vec<f64>>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            window: 1000,
            fit: FitPolicy::InSample,
            bar_only: true,
            log_prices: true,
            params: None,
        }
    }
}

pub struct ModelWeights {
    config: ModelConfig,
    forecaster: Box<dyn Forecaster>,
    last_processed: usize,
}

impl ModelWeights {
    pub fn new(forecaster: Box<dyn Forecaster>, config: ModelConfig) -> Self {
        ModelWeights {
            config,
            forecaster,
            last_processed: 0,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Union length as of the last `weights` call.
    pub fn last_processed(&self) -> usize {
        self.last_processed
    }

    /// Transformed close series of the first child, rows with a missing
    /// close dropped, paired with their timestamps.
    fn clean_input(
        &self,
        child: &ChildWindow,
    ) -> Result<(Vec<Timestamp>, Vec<f64>), TreefolioError> {
        let mut stamps = Vec::with_capacity(child.closes.len());
        let mut closes = Vec::with_capacity(child.closes.len());
        for (i, &close) in child.closes.iter().enumerate() {
            if !close.is_finite() {
                continue;
            }
            let value = if self.config.log_prices {
                if close <= 0.0 {
                    return Err(TreefolioError::FitFailed {
                        reason: format!("log transform requires positive close, got {close}"),
                    });
                }
                close.ln()
            } else {
                close
            };
            stamps.push(child.stamps[i]);
            closes.push(value);
        }
        Ok((stamps, closes))
    }

    /// One-step predictions and the clean position of the first one.
    fn predictions(&mut self, closes: &[f64]) -> Result<(usize, Vec<f64>), TreefolioError> {
        let n = closes.len();
        let window = self.config.window;
        let in_sample =
            matches!(self.config.fit, FitPolicy::InSample) || self.config.params.is_some();

        if in_sample {
            if n < 2 {
                return Ok((0, Vec::new()));
            }
            self.forecaster.fit(closes)?;
            return Ok((1, self.forecaster.predict(1, n)?));
        }
        if n <= window {
            // Warm-up: nothing to fit on yet, neutral output.
            return Ok((0, Vec::new()));
        }

        self.forecaster.fit(&closes[..window])?;
        let preds = match self.config.fit {
            FitPolicy::FitOnce => {
                self.forecaster.extend(&closes[window..], false)?;
                self.forecaster.predict(window, n)?
            }
            FitPolicy::FitWindow => {
                let mut preds = Vec::with_capacity(n - window + 1);
                preds.push(self.forecaster.forecast()?);
                for i in 1..=(n - window) {
                    self.forecaster.fit(&closes[i..i + window])?;
                    preds.push(self.forecaster.forecast()?);
                }
                preds
            }
            FitPolicy::FitAll => {
                let mut preds = Vec::with_capacity(n - window + 1);
                preds.push(self.forecaster.forecast()?);
                for i in 1..=(n - window) {
                    self.forecaster
                        .extend(&closes[window + i - 1..window + i], true)?;
                    preds.push(self.forecaster.forecast()?);
                }
                preds
            }
            FitPolicy::InSample => unreachable!("in-sample handled above"),
        };
        Ok((window, preds))
    }
}

impl WeightStrategy for ModelWeights {
    fn weights(
        &mut self,
        children: &[ChildWindow],
        union: &[Timestamp],
        idx: usize,
    ) -> Result<Vec<Vec<Signal>>, TreefolioError> {
        let k = children.len();
        if k == 0 || union.len() <= idx {
            self.last_processed = union.len();
            return Ok(Vec::new());
        }

        // Forecast models read their first child; with several children the
        // signal is broadcast, scaled to keep total exposure at one.
        let (stamps, closes) = self.clean_input(&children[0])?;
        let (start, preds) = self.predictions(&closes)?;

        let mut signals: HashMap<Timestamp, Signal> = HashMap::new();
        if preds.len() >= 2 {
            let raw: Vec<f64> = preds
                .iter()
                .enumerate()
                .map(|(j, &pred)| sign(pred - closes[start + j - 1]))
                .collect();
            for t in start..=(start + raw.len() - 2) {
                let bar = raw[t - start];
                let gap = if self.config.bar_only {
                    0.0
                } else {
                    raw[t - start + 1]
                };
                signals.insert(stamps[t], Signal { bar, gap });
            }
        }

        self.last_processed = union.len();
        let scale = 1.0 / k as f64;
        Ok(union[idx..]
            .iter()
            .map(|ts| {
                let sig = signals.get(ts).copied().unwrap_or(Signal::ZERO);
                vec![
                    Signal {
                        bar: sig.bar * scale,
                        gap: sig.gap * scale,
                    };
                    k
                ]
            })
            .collect())
    }
}
