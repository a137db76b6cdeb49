//! Domain error types.
//!
//! Insufficient data for a model fit is deliberately NOT an error: the
//! weighting layer treats a short window as a warm-up state and emits
//! neutral signals instead.

/// Top-level error type for treefolio.
#[derive(Debug, thiserror::Error)]
pub enum TreefolioError {
    #[error("schema mismatch: existing frame declares [{existing}], incoming declares [{incoming}]")]
    SchemaMismatch { existing: String, incoming: String },

    #[error("model fit failed: {reason}")]
    FitFailed { reason: String },

    #[error("no node named {name}")]
    UnknownNode { name: String },

    #[error("a node named {name} already exists")]
    DuplicateName { name: String },

    #[error("{name} is not a derivative")]
    NotADerivative { name: String },

    #[error("{name} is not a raw asset")]
    NotAnAsset { name: String },

    #[error("adding {child} under {parent} would create a cycle")]
    CycleDetected { parent: String, child: String },

    #[error("no portfolio has been set")]
    NoPortfolio,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data parse error: {reason}")]
    DataParse { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl From<&TreefolioError> for std::process::ExitCode {
    fn from(err: &TreefolioError) -> Self {
        let code: u8 = match err {
            TreefolioError::Io(_) | TreefolioError::Csv(_) => 1,
            TreefolioError::ConfigParse { .. }
            | TreefolioError::ConfigMissing { .. }
            | TreefolioError::ConfigInvalid { .. } => 2,
            TreefolioError::DataParse { .. } => 3,
            TreefolioError::UnknownNode { .. }
            | TreefolioError::DuplicateName { .. }
            | TreefolioError::NotADerivative { .. }
            | TreefolioError::NotAnAsset { .. }
            | TreefolioError::CycleDetected { .. }
            | TreefolioError::NoPortfolio => 4,
            TreefolioError::SchemaMismatch { .. } => 5,
            TreefolioError::FitFailed { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
