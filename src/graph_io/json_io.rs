//! JSON import/export of network bundles

use std::fs;
use std::path::Path;
use tracing::debug;

use super::ExportResult;
use crate::errors::{ImportExportError, ImportExportResult};
use crate::network::{LoadedNetwork, NetworkWithView};

fn read(file_path: &Path) -> ImportExportResult<String> {
    if !file_path.exists() {
        return Err(ImportExportError::FileNotFound(
            file_path.display().to_string(),
        ));
    }
    Ok(fs::read_to_string(file_path)?)
}

fn write<T: serde::Serialize>(value: &T, file_path: &Path, prettify: bool) -> ImportExportResult<()> {
    let json_string = if prettify {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(file_path, json_string)?;
    Ok(())
}

/// Import a source network bundle
pub fn import_network(file_path: &Path) -> ImportExportResult<LoadedNetwork> {
    debug!("Importing network JSON from: {}", file_path.display());
    let content = read(file_path)?;
    let network: LoadedNetwork = serde_json::from_str(&content)?;
    debug!("Imported {} ({})", network.network.name, network.network.stats());
    Ok(network)
}

/// Export a source network bundle
pub fn export_network(
    network: &LoadedNetwork,
    file_path: &Path,
    prettify: bool,
) -> ImportExportResult<ExportResult> {
    debug!("Exporting network JSON to: {}", file_path.display());
    write(network, file_path, prettify)?;
    Ok(ExportResult {
        output_paths: vec![file_path.display().to_string()],
        nodes_exported: network.network.nodes.len(),
        edges_exported: network.network.edges.len(),
    })
}

/// Import a merged network bundle, views included
pub fn import_bundle(file_path: &Path) -> ImportExportResult<NetworkWithView> {
    debug!("Importing merged network from: {}", file_path.display());
    let content = read(file_path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Export a merged network bundle, views included
pub fn export_bundle(
    merged: &NetworkWithView,
    file_path: &Path,
    prettify: bool,
) -> ImportExportResult<ExportResult> {
    debug!("Exporting merged network to: {}", file_path.display());
    write(merged, file_path, prettify)?;
    Ok(ExportResult {
        output_paths: vec![file_path.display().to_string()],
        nodes_exported: merged.network.nodes.len(),
        edges_exported: merged.network.edges.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        Column, Edge, Network, NetworkView, Node, Row, Table, ValueType, VisualStyle,
    };
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn create_test_network() -> LoadedNetwork {
        let mut node_table = Table::new("nodes", vec![Column::new("name", ValueType::String)]);
        for (id, name) in [("1", "X"), ("2", "Y")] {
            let mut row = Row::new();
            row.insert("name".to_string(), json!(name));
            node_table.insert_row(id, row);
        }
        LoadedNetwork {
            network: Network {
                id: "net".to_string(),
                name: "Test Network".to_string(),
                nodes: vec![Node { id: "1".to_string() }, Node { id: "2".to_string() }],
                edges: vec![Edge {
                    id: "e1".to_string(),
                    source: "1".to_string(),
                    target: "2".to_string(),
                }],
            },
            node_table,
            edge_table: Table::new("edges", vec![]),
            visual_style: VisualStyle(json!({"defaultNodeColor": "#ffffff"})),
            ..Default::default()
        }
    }

    #[test]
    fn test_network_export_import() {
        let original = create_test_network();
        let temp_file = NamedTempFile::new().unwrap();

        let result = export_network(&original, temp_file.path(), false).unwrap();
        assert_eq!(result.nodes_exported, 2);
        assert_eq!(result.edges_exported, 1);

        let imported = import_network(temp_file.path()).unwrap();
        assert_eq!(imported.network, original.network);
        assert_eq!(imported.node_table.get_value("2", "name"), Some(&json!("Y")));
        assert_eq!(imported.visual_style, original.visual_style);
    }

    #[test]
    fn test_import_without_optional_parts() {
        let temp_file = NamedTempFile::new().unwrap();
        let payload = json!({
            "network": {"id": "n", "nodes": [], "edges": []},
            "node_table": {"id": "t", "columns": [], "rows": {}},
            "edge_table": {"id": "t", "columns": [], "rows": {}}
        });
        fs::write(temp_file.path(), payload.to_string()).unwrap();
        let imported = import_network(temp_file.path()).unwrap();
        assert_eq!(imported.network.name, "");
        assert_eq!(imported.visual_style, VisualStyle::default());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = import_network(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ImportExportError::FileNotFound(_)));
    }

    #[test]
    fn test_bundle_keeps_views() {
        let loaded = create_test_network();
        let merged = NetworkWithView {
            network_views: vec![NetworkView::unpositioned(&loaded.network)],
            network: loaded.network,
            node_table: loaded.node_table,
            edge_table: loaded.edge_table,
            net_table: loaded.net_table,
            visual_style: loaded.visual_style,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("merged.json");
        export_bundle(&merged, &path, true).unwrap();
        let imported = import_bundle(&path).unwrap();
        assert_eq!(imported.network_views, merged.network_views);
    }
}
