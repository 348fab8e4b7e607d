//! CSV import/export of node and edge tables

use csv::{Reader, StringRecord, Writer};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::ExportResult;
use crate::errors::{ImportExportError, ImportExportResult};
use crate::network::{
    Column, Edge, LoadedNetwork, Network, NetworkWithView, Node, Row, Table, ValueType,
};

const ID_COLUMN: &str = "id";
const SOURCE_COLUMN: &str = "source";
const TARGET_COLUMN: &str = "target";

/// Resolve `<base>_nodes.csv` and `<base>_edges.csv` from a base path or either file
fn resolve_csv_paths(base_path: &Path) -> (PathBuf, PathBuf, String) {
    let parent = base_path.parent().unwrap_or(Path::new("."));
    let file_stem = base_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("network");
    let base_name = file_stem
        .strip_suffix("_nodes")
        .or_else(|| file_stem.strip_suffix("_edges"))
        .unwrap_or(file_stem)
        .to_string();

    (
        parent.join(format!("{}_nodes.csv", base_name)),
        parent.join(format!("{}_edges.csv", base_name)),
        base_name,
    )
}

/// Narrowest type that parses every non-empty value
fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> ValueType {
    let present: Vec<&str> = values.map(str::trim).filter(|v| !v.is_empty()).collect();
    if present.is_empty() {
        return ValueType::String;
    }
    if present.iter().all(|v| v.parse::<i64>().is_ok()) {
        ValueType::Long
    } else if present.iter().all(|v| v.parse::<f64>().is_ok()) {
        ValueType::Double
    } else if present
        .iter()
        .all(|v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false"))
    {
        ValueType::Boolean
    } else {
        ValueType::String
    }
}

/// Rows of a CSV file keyed by header
struct RawTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl RawTable {
    fn read(file_path: &Path) -> ImportExportResult<Self> {
        let mut reader = Reader::from_path(file_path)?;
        let headers = reader.headers()?.clone();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, records })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Attribute columns with inferred types, skipping the structural ones
    fn columns(&self, reserved: &[&str]) -> Vec<(usize, Column)> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !reserved.contains(name))
            .map(|(i, name)| {
                let values = self.records.iter().map(move |r| r.get(i).unwrap_or(""));
                (i, Column::new(name, infer_type(values)))
            })
            .collect()
    }
}

fn row_from(record: &StringRecord, columns: &[(usize, Column)]) -> Row {
    columns
        .iter()
        .map(|(i, column)| {
            let cell = record.get(*i).unwrap_or("");
            let value = if cell.trim().is_empty() {
                Value::Null
            } else {
                column.value_type.coerce(&Value::String(cell.to_string()))
            };
            (column.name.clone(), value)
        })
        .collect()
}

/// Import a network from `<base>_nodes.csv` and, when present, `<base>_edges.csv`
pub fn import_network(base_path: &Path) -> ImportExportResult<LoadedNetwork> {
    let (nodes_path, edges_path, base_name) = resolve_csv_paths(base_path);
    if !nodes_path.exists() {
        return Err(ImportExportError::FileNotFound(
            nodes_path.display().to_string(),
        ));
    }

    debug!("Importing nodes from: {}", nodes_path.display());
    let raw_nodes = RawTable::read(&nodes_path)?;
    let id_idx = raw_nodes.position(ID_COLUMN);
    let node_columns = raw_nodes.columns(&[ID_COLUMN]);
    let mut node_table = Table::new(
        &format!("{}-nodes", base_name),
        node_columns.iter().map(|(_, c)| c.clone()).collect(),
    );
    let mut nodes = Vec::with_capacity(raw_nodes.records.len());
    for (line, record) in raw_nodes.records.iter().enumerate() {
        let id = id_idx
            .and_then(|i| record.get(i))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| line.to_string());
        node_table.insert_row(&id, row_from(record, &node_columns));
        nodes.push(Node { id });
    }
    let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let mut edge_table = Table::new(&format!("{}-edges", base_name), vec![]);
    let mut edges = Vec::new();
    if edges_path.exists() {
        debug!("Importing edges from: {}", edges_path.display());
        let raw_edges = RawTable::read(&edges_path)?;
        let (Some(source_idx), Some(target_idx)) = (
            raw_edges.position(SOURCE_COLUMN),
            raw_edges.position(TARGET_COLUMN),
        ) else {
            return Err(ImportExportError::InvalidFormat(format!(
                "{} needs '{}' and '{}' columns",
                edges_path.display(),
                SOURCE_COLUMN,
                TARGET_COLUMN
            )));
        };
        let edge_id_idx = raw_edges.position(ID_COLUMN);
        let edge_columns = raw_edges.columns(&[ID_COLUMN, SOURCE_COLUMN, TARGET_COLUMN]);
        edge_table.columns = edge_columns.iter().map(|(_, c)| c.clone()).collect();

        for (line, record) in raw_edges.records.iter().enumerate() {
            let source = record.get(source_idx).unwrap_or("");
            let target = record.get(target_idx).unwrap_or("");
            if !node_ids.contains(source) || !node_ids.contains(target) {
                warn!(
                    "Line {}: edge {} -> {} references an unknown node, skipping",
                    line + 2,
                    source,
                    target
                );
                continue;
            }
            let id = edge_id_idx
                .and_then(|i| record.get(i))
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("e{}", line));
            edge_table.insert_row(&id, row_from(record, &edge_columns));
            edges.push(Edge {
                id,
                source: source.to_string(),
                target: target.to_string(),
            });
        }
    } else {
        debug!("No edges file found, network will have no edges");
    }

    let network = Network {
        id: base_name.clone(),
        name: base_name,
        nodes,
        edges,
    };
    debug!("Imported {} ({})", network.name, network.stats());
    Ok(LoadedNetwork {
        network,
        node_table,
        edge_table,
        ..Default::default()
    })
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn write_table(
    file_path: &Path,
    leading: &[&str],
    table: &Table,
    mut leading_values: impl FnMut(&str) -> Vec<String>,
) -> ImportExportResult<()> {
    let mut writer = Writer::from_path(file_path)?;
    let mut header: Vec<&str> = leading.to_vec();
    header.extend(table.columns.iter().map(|c| c.name.as_str()));
    writer.write_record(&header)?;

    for (id, row) in &table.rows {
        let mut record = leading_values(id);
        record.extend(table.columns.iter().map(|c| cell(row.get(&c.name))));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export node and edge tables to `<base>_nodes.csv` and `<base>_edges.csv`
pub fn export_tables(merged: &NetworkWithView, base_path: &Path) -> ImportExportResult<ExportResult> {
    let (nodes_path, edges_path, _) = resolve_csv_paths(base_path);
    if let Some(parent) = nodes_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    debug!("Exporting nodes to: {}", nodes_path.display());
    write_table(&nodes_path, &[ID_COLUMN], &merged.node_table, |id| {
        vec![id.to_string()]
    })?;

    debug!("Exporting edges to: {}", edges_path.display());
    let endpoints: std::collections::HashMap<&str, &Edge> = merged
        .network
        .edges
        .iter()
        .map(|e| (e.id.as_str(), e))
        .collect();
    write_table(
        &edges_path,
        &[ID_COLUMN, SOURCE_COLUMN, TARGET_COLUMN],
        &merged.edge_table,
        |id| match endpoints.get(id) {
            Some(edge) => vec![id.to_string(), edge.source.clone(), edge.target.clone()],
            None => vec![id.to_string(), String::new(), String::new()],
        },
    )?;

    Ok(ExportResult {
        output_paths: vec![
            nodes_path.display().to_string(),
            edges_path.display().to_string(),
        ],
        nodes_exported: merged.node_table.rows.len(),
        edges_exported: merged.edge_table.rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_csv_paths() {
        let (nodes, edges, base) = resolve_csv_paths(Path::new("data/ppi_nodes.csv"));
        assert_eq!(nodes, Path::new("data/ppi_nodes.csv"));
        assert_eq!(edges, Path::new("data/ppi_edges.csv"));
        assert_eq!(base, "ppi");
    }

    #[test]
    fn test_infer_type() {
        assert_eq!(infer_type(["1", "", "3"].into_iter()), ValueType::Long);
        assert_eq!(infer_type(["1", "2.5"].into_iter()), ValueType::Double);
        assert_eq!(infer_type(["TRUE", "false"].into_iter()), ValueType::Boolean);
        assert_eq!(infer_type(["a", "1"].into_iter()), ValueType::String);
        assert_eq!(infer_type(["", " "].into_iter()), ValueType::String);
    }

    #[test]
    fn test_import_network_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ppi_nodes.csv"),
            "id,name,degree\nn1,TP53,4\nn2,MDM2,\nn3,EGFR,2\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("ppi_edges.csv"),
            "source,target,interaction\nn1,n2,pp\nn2,n9,pp\n",
        )
        .unwrap();

        let loaded = import_network(&dir.path().join("ppi")).unwrap();
        assert_eq!(loaded.network.name, "ppi");
        assert_eq!(loaded.network.nodes.len(), 3);
        assert_eq!(loaded.network.edges.len(), 1);
        assert_eq!(
            loaded.node_table.column("degree"),
            Some(&Column::new("degree", ValueType::Long))
        );
        assert_eq!(loaded.node_table.get_value("n1", "degree"), Some(&json!(4)));
        assert!(loaded.node_table.get_value("n2", "degree").is_none());
        assert_eq!(loaded.edge_table.get_value("e0", "interaction"), Some(&json!("pp")));
    }

    #[test]
    fn test_edges_without_endpoints_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x_nodes.csv"), "name\nA\n").unwrap();
        fs::write(dir.path().join("x_edges.csv"), "from,to\n0,0\n").unwrap();
        let err = import_network(&dir.path().join("x_nodes.csv")).unwrap_err();
        assert!(matches!(err, ImportExportError::InvalidFormat(_)));
    }

    #[test]
    fn test_missing_nodes_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = import_network(&dir.path().join("none")).unwrap_err();
        assert!(matches!(err, ImportExportError::FileNotFound(_)));
    }

    #[test]
    fn test_export_tables() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_nodes.csv"), "id,name\n0,X\n1,Y\n").unwrap();
        fs::write(dir.path().join("a_edges.csv"), "id,source,target,interaction\ne0,0,1,pp\n")
            .unwrap();
        let loaded = import_network(&dir.path().join("a")).unwrap();
        let merged = NetworkWithView {
            network: loaded.network,
            node_table: loaded.node_table,
            edge_table: loaded.edge_table,
            net_table: Table::default(),
            visual_style: Default::default(),
            network_views: vec![],
        };

        let result = export_tables(&merged, &dir.path().join("out").join("merged")).unwrap();
        assert_eq!(result.nodes_exported, 2);
        let edges = fs::read_to_string(dir.path().join("out").join("merged_edges.csv")).unwrap();
        assert_eq!(edges, "id,source,target,interaction\ne0,0,1,pp\n");
        let nodes = fs::read_to_string(dir.path().join("out").join("merged_nodes.csv")).unwrap();
        assert_eq!(nodes, "id,name\n0,X\n1,Y\n");
    }
}
