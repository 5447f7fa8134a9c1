use thiserror::Error;

/// Run-level failures. Everything here surfaces before the first sales row
/// is processed; row-level problems are reported as [`crate::model::LogEntry`]
/// values instead.
#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty pattern, blank column name, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A reference table lacks a column the loader needs.
    #[error("{table}: missing column '{column}'")]
    MissingColumn { table: String, column: String },
    /// A reference table cell that must be numeric is not.
    #[error("{table}, row {row}: {reason} ('{value}')")]
    BadReferenceValue {
        table: String,
        row: usize,
        value: String,
        reason: String,
    },
    /// A required reference table is absent or empty.
    #[error("fatal precondition: {0}")]
    FatalPrecondition(String),
    /// Reading a source file failed.
    #[error("cannot read {path}: {message}")]
    Read { path: String, message: String },
    /// IO error (file write, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl ReconError {
    pub fn is_fatal_precondition(&self) -> bool {
        matches!(self, Self::FatalPrecondition(_))
    }
}

impl From<std::io::Error> for ReconError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
