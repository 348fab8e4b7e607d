//! Import/export error types

use thiserror::Error;

/// Errors while reading or writing network files
#[derive(Error, Debug)]
pub enum ImportExportError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON could not be parsed or produced
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV could not be parsed or produced
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Input does not have the expected shape
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Required file is missing
    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl ImportExportError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ImportExportError::Io(_) | ImportExportError::FileNotFound(_) => "IO_ERROR",
            ImportExportError::Json(_)
            | ImportExportError::Csv(_)
            | ImportExportError::InvalidFormat(_) => "INVALID_FORMAT",
        }
    }
}
