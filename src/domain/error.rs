//! Domain error types.
//!
//! Cell-level "no data" is never an error: it travels as `Option::None`
//! through every computation. The variants here cover rows that fail
//! validation, configuration problems and boundary I/O.

/// Top-level error type for commodash.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

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

    #[error("missing coefficient: {name}")]
    MissingCoefficient { name: String },

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        DashboardError::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}

impl From<&DashboardError> for std::process::ExitCode {
    fn from(err: &DashboardError) -> Self {
        let code: u8 = match err {
            DashboardError::Io(_) | DashboardError::Csv(_) => 1,
            DashboardError::ConfigParse { .. }
            | DashboardError::ConfigMissing { .. }
            | DashboardError::ConfigInvalid { .. }
            | DashboardError::MissingCoefficient { .. } => 2,
            DashboardError::DataSource { .. } | DashboardError::MalformedRecord { .. } => 3,
            DashboardError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
