//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;

use treefolio::domain::bar::{Bar, Schema};
use treefolio::domain::env::{Environment, NodeId};
use treefolio::domain::series::{BarFrame, Timestamp};
use treefolio::domain::weights::WeightStrategy;

pub fn ts(day: u32) -> Timestamp {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn close_frame(rows: &[(u32, f64)]) -> BarFrame {
    let mut frame = BarFrame::new(Schema::CLOSE_ONLY);
    for &(day, close) in rows {
        frame.upsert(ts(day), Bar::close_only(close));
    }
    frame
}

pub fn oc_frame(rows: &[(u32, f64, f64)]) -> BarFrame {
    let mut frame = BarFrame::new(Schema::OPEN_CLOSE);
    for &(day, open, close) in rows {
        frame.upsert(ts(day), Bar::open_close(open, close));
    }
    frame
}

/// Deterministic positive price path with trend and oscillation.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + 0.3 * i as f64 + 5.0 * (0.7 * i as f64).sin())
        .collect()
}

pub fn day_rows(closes: &[f64]) -> Vec<(u32, f64)> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| (i as u32 + 1, c))
        .collect()
}

/// One asset under one derivative, portfolio set, no data loaded yet.
pub fn single_asset_env(
    symbol: &str,
    strategy: Box<dyn WeightStrategy>,
) -> (Environment, NodeId) {
    let mut env = Environment::new("test");
    let asset = env.create_asset(symbol, Schema::CLOSE_ONLY).unwrap();
    let portfolio = env.create_derivative("p", strategy).unwrap();
    env.add_child(portfolio, asset).unwrap();
    env.set_portfolio(portfolio).unwrap();
    (env, portfolio)
}

/// Feed `rows` in one batch and refresh.
pub fn run_batch(env: &mut Environment, symbol: &str, rows: &[(u32, f64)]) {
    env.append(symbol, &close_frame(rows), false).unwrap();
    env.refresh().unwrap();
}

/// Feed `rows` one bar at a time with incremental refresh.
pub fn run_online(env: &mut Environment, symbol: &str, rows: &[(u32, f64)]) {
    for &row in rows {
        env.append(symbol, &close_frame(&[row]), true).unwrap();
    }
}
