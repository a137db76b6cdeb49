//! Allocation-driven weight generation.
//!
//! Equal weighting: at each timestamp every child with a computable period
//! return gets `1/k` on both legs, children without data get 0. Further
//! optimizers plug in through the same [`WeightStrategy`] contract.

use super::{ChildWindow, WeightStrategy};
use crate::domain::error::TreefolioError;
use crate::domain::series::Timestamp;
use crate::domain::signal::Signal;

pub struct EqualWeights;

impl WeightStrategy for EqualWeights {
    fn weights(
        &mut self,
        children: &[ChildWindow],
        union: &[Timestamp],
        idx: usize,
    ) -> Result<Vec<Vec<Signal>>, TreefolioError> {
        let mut out = Vec::with_capacity(union.len().saturating_sub(idx));
        for &ts in &union[idx.min(union.len())..] {
            let available: Vec<bool> = children
                .iter()
                .map(|child| child.period_return(ts).is_some())
                .collect();
            let k = available.iter().filter(|&&a| a).count();
            let weight = if k > 0 { 1.0 / k as f64 } else { 0.0 };
            out.push(
                available
                    .into_iter()
                    .map(|a| {
                        if a {
                            Signal {
                                bar: weight,
                                gap: weight,
                            }
                        } else {
                            Signal::ZERO
                        }
                    })
                    .collect(),
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn child(days: &[u32], closes: &[f64]) -> ChildWindow {
        let stamps: Vec<Timestamp> = days.iter().map(|&d| ts(d)).collect();
        let mut bar_returns = vec![f64::NAN];
        let mut gap_returns = vec![f64::NAN];
        for i in 1..closes.len() {
            bar_returns.push(closes[i] / closes[i - 1] - 1.0);
            gap_returns.push(0.0);
        }
        ChildWindow {
            stamps,
            opens: closes.to_vec(),
            closes: closes.to_vec(),
            bar_returns,
            gap_returns,
        }
    }

    #[test]
    fn splits_evenly_across_available_children() {
        let a = child(&[1, 2, 3], &[100.0, 101.0, 102.0]);
        let b = child(&[1, 2, 3], &[50.0, 51.0, 52.0]);
        let union = vec![ts(1), ts(2), ts(3)];
        let out = EqualWeights.weights(&[a, b], &union, 0).unwrap();

        // First timestamp has no prior close anywhere: all zero.
        assert_eq!(out[0], vec![Signal::ZERO, Signal::ZERO]);
        for row in &out[1..] {
            let total: f64 = row.iter().map(|w| w.bar).sum();
            assert!((total - 1.0).abs() < f64::EPSILON);
            assert_eq!(row[0], Signal { bar: 0.5, gap: 0.5 });
        }
    }

    #[test]
    fn child_without_data_gets_zero() {
        let a = child(&[1, 2, 3, 4], &[100.0, 101.0, 102.0, 103.0]);
        let b = child(&[3, 4], &[50.0, 51.0]);
        let union = vec![ts(1), ts(2), ts(3), ts(4)];
        let out = EqualWeights.weights(&[a, b], &union, 0).unwrap();

        // Day 2: only a has a return. Day 3: b still has no prior close.
        assert_eq!(out[1], vec![Signal { bar: 1.0, gap: 1.0 }, Signal::ZERO]);
        assert_eq!(out[2], vec![Signal { bar: 1.0, gap: 1.0 }, Signal::ZERO]);
        // Day 4: both.
        assert_eq!(
            out[3],
            vec![
                Signal { bar: 0.5, gap: 0.5 },
                Signal { bar: 0.5, gap: 0.5 }
            ]
        );
    }

    #[test]
    fn partial_bar_counts_as_missing() {
        let a = child(&[1, 2], &[100.0, 101.0]);
        let b = child(&[1, 2], &[50.0, f64::NAN]);
        let union = vec![ts(1), ts(2)];
        let out = EqualWeights.weights(&[a, b], &union, 0).unwrap();
        assert_eq!(out[1], vec![Signal { bar: 1.0, gap: 1.0 }, Signal::ZERO]);
    }

    #[test]
    fn idx_trims_output() {
        let a = child(&[1, 2, 3], &[100.0, 101.0, 102.0]);
        let union = vec![ts(1), ts(2), ts(3)];
        let full = EqualWeights.weights(&[a.clone()], &union, 0).unwrap();
        let trimmed = EqualWeights.weights(&[a], &union, 2).unwrap();
        assert_eq!(trimmed, full[2..].to_vec());
    }
}
