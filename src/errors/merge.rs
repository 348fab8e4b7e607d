//! Merge-related error types
//!
//! Errors raised while building matching tables, combining networks and
//! assembling the merged network. None of them leave partial state behind.

use thiserror::Error;

/// Merge-related errors
#[derive(Error, Debug)]
pub enum MergeError {
    /// Merge was requested without any network to merge
    #[error("No networks selected for merge")]
    NoNetworks,

    /// A network taking part in the merge has no loaded record
    #[error("Network '{0}' has not been loaded")]
    MissingRecord(String),

    /// Network is not part of the current merge session
    #[error("Network '{0}' is not part of this merge")]
    UnknownNetwork(String),

    /// Selected matching column does not exist in the network's table
    #[error("Matching column '{column}' not found in network '{network}'")]
    MissingMatchingColumn {
        /// Network identifier
        network: String,
        /// Column name
        column: String,
    },

    /// Column does not exist in the network's table
    #[error("Column '{column}' not found in {kind} table of network '{network}'")]
    MissingColumn {
        /// Table kind (node, edge or network)
        kind: String,
        /// Network identifier
        network: String,
        /// Column name
        column: String,
    },

    /// Matching table does not agree with the networks being merged
    #[error("Inconsistent matching table: {0}")]
    InconsistentMatchingTable(String),

    /// Matching table row index out of range
    #[error("Matching table row {0} not found")]
    RowNotFound(usize),

    /// Source network is internally inconsistent
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// Option combination that the merge type does not allow
    #[error("Invalid merge options: {0}")]
    InvalidOptions(String),

    /// Session is not ready: some matching column is stale
    #[error("Merge is not ready: {0}")]
    NotReady(String),

    /// Loading a source network from the data service failed
    #[error("Failed to load network '{network}': {reason}")]
    LoadFailed {
        /// Network identifier
        network: String,
        /// Error message from the data service
        reason: String,
    },

    /// Layout pass failed or was discarded
    #[error("Layout failed: {0}")]
    LayoutFailed(String),
}

impl MergeError {
    /// Check if this error was caused by user input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MergeError::NoNetworks
                | MergeError::UnknownNetwork(_)
                | MergeError::MissingMatchingColumn { .. }
                | MergeError::MissingColumn { .. }
                | MergeError::RowNotFound(_)
                | MergeError::InvalidOptions(_)
                | MergeError::NotReady(_)
        )
    }

    /// Get error code for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            MergeError::NoNetworks | MergeError::NotReady(_) => "NOT_READY",
            MergeError::MissingRecord(_)
            | MergeError::UnknownNetwork(_)
            | MergeError::RowNotFound(_) => "NOT_FOUND",
            MergeError::MissingMatchingColumn { .. }
            | MergeError::MissingColumn { .. }
            | MergeError::InvalidOptions(_) => "VALIDATION_FAILED",
            MergeError::InconsistentMatchingTable(_) | MergeError::InvalidNetwork(_) => {
                "INCONSISTENT_STATE"
            }
            MergeError::LoadFailed { .. } => "LOAD_FAILED",
            MergeError::LayoutFailed(_) => "OPERATION_FAILED",
        }
    }
}
