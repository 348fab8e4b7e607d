//! Domain-specific error types for netmerge
//!
//! # Error Categories
//!
//! - **MergeError**: merge session, engine and assembler failures
//! - **ImportExportError**: reading and writing network bundles and tables
//!
//! # Examples
//!
//! ```rust
//! use netmerge::errors::MergeError;
//!
//! let err = MergeError::MissingMatchingColumn {
//!     network: "net-1".to_string(),
//!     column: "name".to_string(),
//! };
//! assert!(err.is_client_error());
//! ```

pub mod import_export;
pub mod merge;

pub use import_export::ImportExportError;
pub use merge::MergeError;

/// Result type alias for merge operations
pub type MergeResult<T> = Result<T, MergeError>;

/// Result type alias for import/export operations
pub type ImportExportResult<T> = Result<T, ImportExportError>;

/// Error code of an error reaching the binary, and whether bad input caused it
pub fn classify(err: &anyhow::Error) -> (&'static str, bool) {
    if let Some(e) = err.downcast_ref::<MergeError>() {
        return (e.error_code(), e.is_client_error());
    }
    if let Some(e) = err.downcast_ref::<ImportExportError>() {
        return (e.error_code(), !matches!(e, ImportExportError::Io(_)));
    }
    ("INTERNAL_ERROR", false)
}
