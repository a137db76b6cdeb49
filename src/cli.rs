//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_source::CsvSource;
use crate::adapters::ini_config::IniConfig;
use crate::domain::env::Environment;
use crate::domain::error::TreefolioError;
use crate::domain::series::BarFrame;
use crate::domain::weights::{
    FitPolicy, ModelConfig, ModelKind, OptimizerKind, WeightStrategy, create_model,
    create_optimizer,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::BarSource;

#[derive(Parser, Debug)]
#[command(name = "treefolio", about = "Hierarchical trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of per-symbol CSV files
        #[arg(short, long)]
        data: PathBuf,
        /// Override the configured asset symbol
        #[arg(long)]
        symbol: Option<String>,
        /// Feed bars one at a time instead of in one batch
        #[arg(long)]
        online: bool,
    },
    /// Validate a backtest configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            symbol,
            online,
        } => run_backtest(&config, &data, symbol.as_deref(), online),
        Command::Validate { config } => run_validate(&config),
    }
}

fn load_config(path: &PathBuf) -> Result<IniConfig, ExitCode> {
    IniConfig::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        (&e).into()
    })
}

fn run_backtest(
    config_path: &PathBuf,
    data_path: &PathBuf,
    symbol_override: Option<&str>,
    online: bool,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&config) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 2: Build the strategy and environment
    let spec = match parse_strategy(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let name = config
        .get_string("portfolio", "name")
        .unwrap_or_else(|| "portfolio".to_string());
    let symbol = match resolve_symbol(symbol_override, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Portfolio {name}: {} on {symbol}", spec.describe());

    // Stage 3: Load bar data
    let source = CsvSource::new(data_path.clone());
    let frame = match source.load(&symbol) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "Loaded {} bars [{}] for {symbol}",
        frame.len(),
        frame.schema().describe()
    );

    // Stage 4: Run
    let mut env = Environment::new(&name);
    let result = (|| -> Result<(), TreefolioError> {
        let asset = env.create_asset(&symbol, frame.schema())?;
        let portfolio = env.create_derivative(&name, spec.build())?;
        env.add_child(portfolio, asset)?;
        env.set_portfolio(portfolio)?;

        if online {
            for (ts, bar) in frame.series().iter() {
                let mut row = BarFrame::new(frame.schema());
                row.upsert(ts, *bar);
                env.append(&symbol, &row, true)?;
            }
        } else {
            env.append(&symbol, &frame, false)?;
            env.refresh()?;
        }
        Ok(())
    })();
    if let Err(e) = result {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 5: Print summary
    let portfolio = match env.node_id(&name) {
        Some(id) => id,
        None => return ExitCode::from(4),
    };
    let asset_return = env
        .node_id(&symbol)
        .map(|id| env.compounded_return(id))
        .unwrap_or(1.0);
    let total = env.compounded_return(portfolio);

    eprintln!("\n=== Results ===");
    eprintln!("Periods:          {}", env.values(portfolio).len());
    eprintln!("Buy-and-hold:     {:+.2}%", (asset_return - 1.0) * 100.0);
    eprintln!("Strategy return:  {:+.2}%", (total - 1.0) * 100.0);
    println!("{total:.6}");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&config) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let spec = match parse_strategy(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let symbol = match resolve_symbol(None, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("  strategy: {}", spec.describe());
    eprintln!("  symbol:   {symbol}");
    eprintln!("Configuration is valid.");
    ExitCode::SUCCESS
}

/// A parsed weight-generator specification, kept inspectable so validation
/// can report what it understood before anything runs.
#[derive(Debug)]
pub enum StrategySpec {
    Model { kind: ModelKind, config: ModelConfig },
    Optimizer(OptimizerKind),
}

impl StrategySpec {
    pub fn build(self) -> Box<dyn WeightStrategy> {
        match self {
            StrategySpec::Model { kind, config } => create_model(kind, config),
            StrategySpec::Optimizer(kind) => create_optimizer(kind),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            StrategySpec::Model {
                kind: ModelKind::Arima { ar, diff, ma },
                config,
            } => format!(
                "ARIMA({ar},{diff},{ma}) window={} fit={}",
                config.window,
                config.fit.as_str()
            ),
            StrategySpec::Model {
                kind: ModelKind::Drift,
                config,
            } => format!(
                "drift window={} fit={}",
                config.window,
                config.fit.as_str()
            ),
            StrategySpec::Optimizer(OptimizerKind::EqualWeights) => "equal weights".to_string(),
        }
    }
}

const PORTFOLIO_KEYS: &[&str] = &["name", "optimizer", "symbol"];
const MODEL_KEYS: &[&str] = &[
    "kind", "ar", "i", "ma", "window", "fit", "bar_only", "log", "params",
];

/// Reject options the engine would otherwise silently ignore.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TreefolioError> {
    if !config.has_section("portfolio") {
        return Err(TreefolioError::ConfigMissing {
            section: "portfolio".into(),
            key: "name".into(),
        });
    }
    for (section, allowed) in [("portfolio", PORTFOLIO_KEYS), ("model", MODEL_KEYS)] {
        for key in config.keys(section) {
            if !allowed.contains(&key.as_str()) {
                return Err(TreefolioError::ConfigInvalid {
                    section: section.into(),
                    key,
                    reason: "unknown option".into(),
                });
            }
        }
    }
    Ok(())
}

pub fn resolve_symbol(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, TreefolioError> {
    if let Some(s) = symbol_override {
        return Ok(s.to_uppercase());
    }
    config
        .get_string("portfolio", "symbol")
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TreefolioError::ConfigMissing {
            section: "portfolio".into(),
            key: "symbol".into(),
        })
}

/// Build a [`StrategySpec`] from config: a `[model]` section selects a
/// forecast model, otherwise the `[portfolio]` optimizer key decides.
pub fn parse_strategy(config: &dyn ConfigPort) -> Result<StrategySpec, TreefolioError> {
    if config.has_section("model") {
        return parse_model(config);
    }
    let optimizer = config
        .get_string("portfolio", "optimizer")
        .unwrap_or_else(|| "equal".to_string());
    match optimizer.to_lowercase().as_str() {
        "equal" => Ok(StrategySpec::Optimizer(OptimizerKind::EqualWeights)),
        _ => Err(TreefolioError::ConfigInvalid {
            section: "portfolio".into(),
            key: "optimizer".into(),
            reason: format!("unknown optimizer {optimizer:?} (expected equal)"),
        }),
    }
}

fn parse_model(config: &dyn ConfigPort) -> Result<StrategySpec, TreefolioError> {
    let kind_str = config
        .get_string("model", "kind")
        .ok_or_else(|| TreefolioError::ConfigMissing {
            section: "model".into(),
            key: "kind".into(),
        })?;
    let kind = match kind_str.to_lowercase().as_str() {
        "arima" => ModelKind::Arima {
            ar: get_usize(config, "model", "ar", 1)?,
            diff: get_usize(config, "model", "i", 0)?,
            ma: get_usize(config, "model", "ma", 0)?,
        },
        "drift" => ModelKind::Drift,
        _ => {
            return Err(TreefolioError::ConfigInvalid {
                section: "model".into(),
                key: "kind".into(),
                reason: format!("unknown model kind {kind_str:?} (expected arima or drift)"),
            });
        }
    };

    let defaults = ModelConfig::default();
    let fit = match config.get_string("model", "fit") {
        Some(s) => s.parse::<FitPolicy>().map_err(|reason| {
            TreefolioError::ConfigInvalid {
                section: "model".into(),
                key: "fit".into(),
                reason,
            }
        })?,
        None => defaults.fit,
    };
    let params = match config.get_string("model", "params") {
        Some(s) => Some(parse_params(&s)?),
        None => None,
    };
    let model_config = ModelConfig {
        window: get_usize(config, "model", "window", defaults.window)?,
        fit,
        bar_only: get_bool(config, "model", "bar_only", defaults.bar_only)?,
        log_prices: get_bool(config, "model", "log", defaults.log_prices)?,
        params,
    };
    Ok(StrategySpec::Model {
        kind,
        config: model_config,
    })
}

fn parse_params(text: &str) -> Result<Vec<f64>, TreefolioError> {
    text.split(',')
        .map(|s| {
            s.trim().parse().map_err(|_| TreefolioError::ConfigInvalid {
                section: "model".into(),
                key: "params".into(),
                reason: format!("invalid number {:?}", s.trim()),
            })
        })
        .collect()
}

fn get_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TreefolioError> {
    match config.get_string(section, key) {
        Some(s) => s.trim().parse().map_err(|_| TreefolioError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("expected a non-negative integer, got {s:?}"),
        }),
        None => Ok(default),
    }
}

fn get_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, TreefolioError> {
    match config.get_string(section, key) {
        Some(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(TreefolioError::ConfigInvalid {
                section: section.into(),
                key: key.into(),
                reason: format!("expected a boolean, got {s:?}"),
            }),
        },
        None => Ok(default),
    }
}
