// Error handling utilities
// Author: Gabriel Demetrios Lafis

use thiserror::Error;

use crate::data::DataError;
use crate::extract::ExtractionError;
use crate::load::LoadError;
use crate::processing::ProcessingError;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing configuration value. Always fatal.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// No rows were produced by extraction
    #[error("No data: {0}")]
    DataAbsent(String),
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Logger error: {0}")]
    Logging(#[from] log::SetLoggerError),
}

impl AppError {
    /// Shorthand for a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }
}

/// Result type alias for AppError
pub type AppResult<T> = Result<T, AppError>;
