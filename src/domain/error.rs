//! Domain error types.

/// Top-level error type for trendsim.
#[derive(Debug, thiserror::Error)]
pub enum TrendsimError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("insufficient data: have {points} points, need {minimum}")]
    InsufficientData { points: usize, minimum: usize },

    #[error("no initial capital available for first trade of {ticker}")]
    MissingCapital { ticker: String },

    #[error("feed error for {ticker}: {reason}")]
    Feed { ticker: String, reason: String },

    #[error("index integrity violation: {reason}")]
    IndexIntegrity { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TrendsimError> for std::process::ExitCode {
    fn from(err: &TrendsimError) -> Self {
        let code: u8 = match err {
            TrendsimError::Io(_) => 1,
            TrendsimError::ConfigParse { .. }
            | TrendsimError::ConfigMissing { .. }
            | TrendsimError::ConfigInvalid { .. }
            | TrendsimError::MissingCapital { .. } => 2,
            TrendsimError::Database { .. } | TrendsimError::DatabaseQuery { .. } => 3,
            TrendsimError::Feed { .. } | TrendsimError::IndexIntegrity { .. } => 4,
            TrendsimError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
