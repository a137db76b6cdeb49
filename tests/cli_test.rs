//! Config-to-result pipeline tests: INI files and CSV data through the
//! same building blocks the binary uses.

mod common;

use std::fs;

use tempfile::TempDir;

use treefolio::adapters::csv_source::CsvSource;
use treefolio::adapters::ini_config::IniConfig;
use treefolio::cli::{StrategySpec, parse_strategy, resolve_symbol, validate_config};
use treefolio::domain::env::Environment;
use treefolio::domain::error::TreefolioError;
use treefolio::domain::weights::{FitPolicy, ModelKind};
use treefolio::ports::data_port::BarSource;

fn write_config(dir: &TempDir, content: &str) -> IniConfig {
    let path = dir.path().join("backtest.ini");
    fs::write(&path, content).unwrap();
    IniConfig::from_file(&path).unwrap()
}

fn write_csv(dir: &TempDir, symbol: &str, closes: &[f64]) {
    let mut content = String::from("date,close\n");
    for (i, close) in closes.iter().enumerate() {
        content.push_str(&format!("2024-01-{:02},{close}\n", i + 1));
    }
    fs::write(dir.path().join(format!("{symbol}.csv")), content).unwrap();
}

fn run_pipeline(config: &IniConfig, source: &CsvSource) -> Environment {
    validate_config(config).unwrap();
    let spec = parse_strategy(config).unwrap();
    let symbol = resolve_symbol(None, config).unwrap();
    let frame = source.load(&symbol).unwrap();

    let mut env = Environment::new("test");
    let asset = env.create_asset(&symbol, frame.schema()).unwrap();
    let portfolio = env.create_derivative("p", spec.build()).unwrap();
    env.add_child(portfolio, asset).unwrap();
    env.set_portfolio(portfolio).unwrap();
    env.append(&symbol, &frame, false).unwrap();
    env.refresh().unwrap();
    env
}

#[test]
fn equal_weight_backtest_from_files_tracks_the_asset() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[portfolio]\nname = p\nsymbol = DOW\noptimizer = equal\n");
    write_csv(&dir, "DOW", &[100.0, 110.0, 99.0]);
    let source = CsvSource::new(dir.path().to_path_buf());

    let env = run_pipeline(&config, &source);
    let portfolio = env.portfolio().unwrap();
    let expected = (110.0 / 100.0) * (99.0 / 110.0);
    assert!((env.compounded_return(portfolio) - expected).abs() < 1e-12);
}

#[test]
fn arima_backtest_from_files_produces_a_finite_result() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "[portfolio]\nname = p\nsymbol = DOW\n\
         [model]\nkind = arima\nar = 1\nwindow = 6\nfit = fitWindow\n",
    );
    let closes: Vec<f64> = common::wave_closes(20);
    write_csv(&dir, "DOW", &closes);
    let source = CsvSource::new(dir.path().to_path_buf());

    let env = run_pipeline(&config, &source);
    let portfolio = env.portfolio().unwrap();
    let total = env.compounded_return(portfolio);
    assert!(total.is_finite() && total > 0.0);

    // Warm-up prefix stays at the unit base.
    let values = env.values(portfolio);
    assert_eq!(values.len(), 20);
    assert!((values.series().values()[5].close - 1.0).abs() < 1e-12);
}

#[test]
fn config_file_with_unknown_option_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "[portfolio]\nname = p\nsymbol = DOW\n[model]\nkind = arima\nrefit = daily\n",
    );
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(
        err,
        TreefolioError::ConfigInvalid { ref key, .. } if key == "refit"
    ));
}

#[test]
fn model_spec_round_trips_through_a_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "[portfolio]\nname = p\nsymbol = DOW\n\
         [model]\nkind = arima\nar = 2\ni = 1\nma = 1\nwindow = 30\nfit = fitAll\n\
         bar_only = false\nlog = false\n",
    );
    validate_config(&config).unwrap();
    match parse_strategy(&config).unwrap() {
        StrategySpec::Model { kind, config } => {
            assert_eq!(kind, ModelKind::Arima { ar: 2, diff: 1, ma: 1 });
            assert_eq!(config.window, 30);
            assert_eq!(config.fit, FitPolicy::FitAll);
            assert!(!config.bar_only);
            assert!(!config.log_prices);
        }
        _ => panic!("expected a model spec"),
    }
}

#[test]
fn missing_data_file_surfaces_as_an_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[portfolio]\nname = p\nsymbol = GONE\n");
    let symbol = resolve_symbol(None, &config).unwrap();
    let source = CsvSource::new(dir.path().to_path_buf());
    assert!(source.load(&symbol).is_err());
}
