//! Network import/export
//!
//! JSON bundles carry a complete network (tables, style, views). CSV
//! covers node and edge tables only.

pub mod csv_io;
pub mod json_io;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::errors::{ImportExportError, ImportExportResult};
use crate::network::{LoadedNetwork, NetworkWithView};

/// Supported import/export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    /// Network bundle as JSON
    #[default]
    Json,
    /// `<base>_nodes.csv` and `<base>_edges.csv`
    Csv,
}

impl GraphFormat {
    /// Format from a file extension; a path without extension is a CSV base
    pub fn detect<P: AsRef<Path>>(path: P) -> Option<GraphFormat> {
        match path.as_ref().extension() {
            None => Some(GraphFormat::Csv),
            Some(ext) => match ext.to_str()?.to_lowercase().as_str() {
                "json" => Some(GraphFormat::Json),
                "csv" => Some(GraphFormat::Csv),
                _ => None,
            },
        }
    }
}

/// Summary of a completed export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub output_paths: Vec<String>,
    pub nodes_exported: usize,
    pub edges_exported: usize,
}

/// Write a merged network in the given format
pub fn export_network_with_view<P: AsRef<Path>>(
    merged: &NetworkWithView,
    path: P,
    format: GraphFormat,
) -> ImportExportResult<ExportResult> {
    let path = path.as_ref();
    info!("Exporting {} to {}", merged.network.name, path.display());
    let result = match format {
        GraphFormat::Json => json_io::export_bundle(merged, path, true)?,
        GraphFormat::Csv => csv_io::export_tables(merged, path)?,
    };
    info!(
        "Export completed: {} nodes, {} edges",
        result.nodes_exported, result.edges_exported
    );
    Ok(result)
}

/// Read a source network, detecting the format from the path
pub fn import_network<P: AsRef<Path>>(path: P) -> ImportExportResult<LoadedNetwork> {
    let path = path.as_ref();
    match GraphFormat::detect(path) {
        Some(GraphFormat::Json) => json_io::import_network(path),
        Some(GraphFormat::Csv) => csv_io::import_network(path),
        None => Err(ImportExportError::InvalidFormat(format!(
            "unsupported file type: {}",
            path.display()
        ))),
    }
}
