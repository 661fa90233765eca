//! Error types and exit codes for tedbench

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for tedbench operations
#[derive(Error, Debug)]
pub enum TedbenchError {
    #[error("Config error: {message}")]
    Config { message: String },

    #[error("Missing required benchmark parameter: '{key}'")]
    MissingParameter { key: String },

    #[error("Size expression error: {message}")]
    Expr { message: String },

    #[error("Connection to '{target}' failed: {message}")]
    Connection { target: String, message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Inconsistent data for version '{version}', phrase '{phrase}': {message}")]
    ParseInconsistency {
        version: String,
        phrase: String,
        message: String,
    },

    #[error("Chart rendering failed: {message}")]
    Plot { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TedbenchError {
    /// Convert error to appropriate exit code:
    /// - 0: Success
    /// - 1: IO / input file error
    /// - 2: Configuration error (bad table, missing key, bad expression)
    /// - 3: Connection or session control failure
    /// - 4: Captured-log inconsistency or chart failure
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config { .. } => ExitCode::from(2),
            Self::MissingParameter { .. } => ExitCode::from(2),
            Self::Expr { .. } => ExitCode::from(2),
            Self::Connection { .. } => ExitCode::from(3),
            Self::Session { .. } => ExitCode::from(3),
            Self::ParseInconsistency { .. } => ExitCode::from(4),
            Self::Plot { .. } => ExitCode::from(4),
            Self::Io(_) => ExitCode::from(1),
            Self::Csv(_) => ExitCode::from(1),
        }
    }
}

/// Result type alias for tedbench operations
pub type Result<T> = std::result::Result<T, TedbenchError>;
