//! Matching tables map the attribute columns of every source network onto the
//! columns of the merged network. There is one store per entity kind.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::column_matcher::MatchingColumns;
use crate::common::unique_name;
use crate::errors::{MergeError, MergeResult};
use crate::network::{Column, NetworkId, NetworkRecord, Table};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Node,
    Edge,
    Network,
}

impl TableKind {
    pub fn table<'a>(&self, record: &'a NetworkRecord) -> &'a Table {
        match self {
            TableKind::Node => &record.node_table,
            TableKind::Edge => &record.edge_table,
            TableKind::Network => &record.net_table,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TableKind::Node => "node",
            TableKind::Edge => "edge",
            TableKind::Network => "network",
        }
    }
}

/// One merged output column and the source column each network contributes to it
#[derive(Clone, Debug, PartialEq)]
pub struct MatchingTableRow {
    pub id: usize,
    pub is_matching: bool,
    entries: IndexMap<NetworkId, Option<Column>>,
    output_name: Option<String>,
}

impl MatchingTableRow {
    fn new(id: usize, is_matching: bool, networks: &[NetworkId]) -> Self {
        Self {
            id,
            is_matching,
            entries: networks.iter().map(|n| (n.clone(), None)).collect(),
            output_name: None,
        }
    }

    pub fn entry(&self, network_id: &str) -> Option<&Column> {
        self.entries.get(network_id).and_then(|c| c.as_ref())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&NetworkId, Option<&Column>)> {
        self.entries.iter().map(|(n, c)| (n, c.as_ref()))
    }

    pub fn output_name_override(&self) -> Option<&str> {
        self.output_name.as_deref()
    }

    fn is_empty(&self) -> bool {
        self.entries.values().all(|c| c.is_none())
    }

    /// Output column with contributors visited in `order`
    fn output_column_in(&self, order: &[NetworkId]) -> Option<Column> {
        let mut contributing = order.iter().filter_map(|n| self.entry(n));
        let first = contributing.next()?;
        let value_type = contributing.fold(first.value_type, |t, c| t.widen(c.value_type));
        let name = self
            .output_name
            .clone()
            .unwrap_or_else(|| first.name.clone());
        Some(Column { name, value_type })
    }

    fn resolved_name(&self) -> Option<&str> {
        if let Some(name) = &self.output_name {
            return Some(name);
        }
        self.entries.values().flatten().next().map(|c| c.name.as_str())
    }
}

/// Mutable matching table of one entity kind, kept in sync with the merge list
#[derive(Clone, Debug, PartialEq)]
pub struct MatchingTableStore {
    kind: TableKind,
    networks: Vec<NetworkId>,
    column_order: IndexMap<NetworkId, Vec<String>>,
    rows: Vec<MatchingTableRow>,
}

impl MatchingTableStore {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            networks: Vec::new(),
            column_order: IndexMap::new(),
            rows: Vec::new(),
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn rows(&self) -> &[MatchingTableRow] {
        &self.rows
    }

    pub fn networks(&self) -> &[NetworkId] {
        &self.networks
    }

    pub fn reset(&mut self) {
        self.networks.clear();
        self.column_order.clear();
        self.rows.clear();
    }

    /// Add the columns of each network. Networks already present are skipped.
    pub fn add_networks(
        &mut self,
        ids: &[NetworkId],
        records: &IndexMap<NetworkId, NetworkRecord>,
        matching_cols: &MatchingColumns,
    ) -> MergeResult<()> {
        for id in ids {
            if self.networks.contains(id) {
                debug!("{} matching table already holds {}", self.kind.label(), id);
                continue;
            }
            let record = records
                .get(id)
                .ok_or_else(|| MergeError::MissingRecord(id.clone()))?;
            self.add_network(id, record, matching_cols);
        }
        self.normalize();
        Ok(())
    }

    fn add_network(
        &mut self,
        id: &NetworkId,
        record: &NetworkRecord,
        matching_cols: &MatchingColumns,
    ) {
        let table = self.kind.table(record);
        self.networks.push(id.clone());
        self.column_order.insert(
            id.clone(),
            table.columns.iter().map(|c| c.name.clone()).collect(),
        );
        for row in &mut self.rows {
            row.entries.insert(id.clone(), None);
        }

        let mut matching_name = None;
        if self.kind == TableKind::Node {
            let proposed;
            let column = match matching_cols.get(id) {
                Some(column) => column,
                None => {
                    proposed = MatchingColumns::propose_default(table);
                    &proposed
                }
            };
            let idx = self.matching_row_index();
            if table.has_column(column) {
                self.rows[idx].entries.insert(id.clone(), Some(column.clone()));
                matching_name = Some(column.name.clone());
            } else {
                warn!(
                    "Matching column {} missing from node table of {}",
                    column.name, id
                );
            }
        }

        for column in &table.columns {
            if matching_name.as_deref() == Some(column.name.as_str()) {
                continue;
            }
            self.place_column(id, column.clone());
        }
        debug!(
            "Added {} to {} matching table ({} rows)",
            id,
            self.kind.label(),
            self.rows.len()
        );
    }

    /// Join the first row with the same name that has no column from this network, else open a new row
    fn place_column(&mut self, id: &NetworkId, column: Column) {
        let existing = self.rows.iter().position(|row| {
            !row.is_matching
                && row.entry(id).is_none()
                && row.resolved_name() == Some(column.name.as_str())
        });
        match existing {
            Some(idx) => {
                self.rows[idx].entries.insert(id.clone(), Some(column));
            }
            None => {
                let mut row = MatchingTableRow::new(self.rows.len(), false, &self.networks);
                row.entries.insert(id.clone(), Some(column));
                self.rows.push(row);
            }
        }
    }

    fn matching_row_index(&mut self) -> usize {
        if let Some(idx) = self.rows.iter().position(|r| r.is_matching) {
            return idx;
        }
        let row = MatchingTableRow::new(0, true, &self.networks);
        self.rows.insert(0, row);
        0
    }

    /// Remove each network's contribution; rows left without any column are dropped
    pub fn remove_networks(&mut self, ids: &[NetworkId]) {
        self.networks.retain(|n| !ids.contains(n));
        for id in ids {
            self.column_order.shift_remove(id);
        }
        for row in &mut self.rows {
            for id in ids {
                row.entries.shift_remove(id);
            }
        }
        self.normalize();
    }

    /// Move a network's key to another node column
    pub fn set_matching_column(
        &mut self,
        id: &str,
        record: &NetworkRecord,
        column: Column,
    ) -> MergeResult<()> {
        if self.kind != TableKind::Node {
            return Err(MergeError::InvalidOptions(format!(
                "{} matching table has no matching row",
                self.kind.label()
            )));
        }
        if !self.networks.iter().any(|n| n == id) {
            return Err(MergeError::UnknownNetwork(id.to_string()));
        }
        if !record.node_table.has_column(&column) {
            return Err(MergeError::MissingMatchingColumn {
                network: id.to_string(),
                column: column.name,
            });
        }

        let network_id = id.to_string();
        let matching_idx = self.matching_row_index();
        let previous = self.rows[matching_idx]
            .entries
            .insert(network_id.clone(), Some(column.clone()))
            .flatten();

        for row in self.rows.iter_mut().filter(|r| !r.is_matching) {
            if row.entry(id) == Some(&column) {
                row.entries.insert(network_id.clone(), None);
            }
        }
        if let Some(previous) = previous.filter(|p| *p != column) {
            self.place_column(&network_id, previous);
        }
        self.normalize();
        Ok(())
    }

    /// Point a row at another source column of a network, or at none
    pub fn set_entry(
        &mut self,
        row_id: usize,
        id: &str,
        record: &NetworkRecord,
        column: Option<Column>,
    ) -> MergeResult<()> {
        if !self.networks.iter().any(|n| n == id) {
            return Err(MergeError::UnknownNetwork(id.to_string()));
        }
        if let Some(column) = &column {
            if !self.kind.table(record).has_column(column) {
                return Err(MergeError::MissingColumn {
                    kind: self.kind.label().to_string(),
                    network: id.to_string(),
                    column: column.name.clone(),
                });
            }
        }
        let row = self
            .rows
            .get_mut(row_id)
            .ok_or(MergeError::RowNotFound(row_id))?;
        row.entries.insert(id.to_string(), column);
        self.normalize();
        Ok(())
    }

    pub fn rename_output(&mut self, row_id: usize, name: &str) -> MergeResult<()> {
        let row = self
            .rows
            .get_mut(row_id)
            .ok_or(MergeError::RowNotFound(row_id))?;
        row.output_name = Some(name.to_string()).filter(|n| !n.trim().is_empty());
        Ok(())
    }

    /// Drop empty rows and order the rest: matching row first, then by the
    /// network that contributes first and that network's column order
    fn normalize(&mut self) {
        let has_networks = !self.networks.is_empty();
        self.rows
            .retain(|row| (row.is_matching && has_networks) || !row.is_empty());

        let networks = &self.networks;
        let column_order = &self.column_order;
        self.rows.sort_by_key(|row| {
            let rank = networks.iter().enumerate().find_map(|(pos, n)| {
                row.entry(n).map(|c| {
                    let col_idx = column_order
                        .get(n)
                        .and_then(|cols| cols.iter().position(|name| *name == c.name))
                        .unwrap_or(usize::MAX);
                    (pos, col_idx)
                })
            });
            (!row.is_matching, rank.unwrap_or((usize::MAX, usize::MAX)))
        });
        for (idx, row) in self.rows.iter_mut().enumerate() {
            row.id = idx;
        }
    }

    pub fn to_matching_table(&self, order: &[NetworkId]) -> MatchingTable {
        create_matching_table(self.kind, &self.rows, order)
    }
}

/// Resolved output column of a matching table
#[derive(Clone, Debug, PartialEq)]
pub struct MatchedColumn {
    pub output: Column,
    pub is_matching: bool,
    /// Source column name per contributing network, in merge order
    pub sources: IndexMap<NetworkId, String>,
}

/// Immutable lookup built from matching table rows for one merge
#[derive(Clone, Debug, PartialEq)]
pub struct MatchingTable {
    kind: TableKind,
    columns: Vec<MatchedColumn>,
}

/// Convert rows into a lookup. Contributors are read in merge `order`; duplicate
/// output names get a numbered suffix.
pub fn create_matching_table(
    kind: TableKind,
    rows: &[MatchingTableRow],
    order: &[NetworkId],
) -> MatchingTable {
    let mut ranked: Vec<(usize, usize, &MatchingTableRow)> = rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| {
            let first = order.iter().position(|n| row.entry(n).is_some())?;
            Some((first, idx, row))
        })
        .collect();
    ranked.sort_by_key(|(first, idx, row)| (!row.is_matching, *first, *idx));

    let mut columns: Vec<MatchedColumn> = Vec::new();
    for (_, _, row) in ranked {
        let Some(mut output) = row.output_column_in(order) else {
            continue;
        };
        if columns.iter().any(|c| c.output.name == output.name) {
            let renamed = unique_name(&output.name, columns.iter().map(|c| c.output.name.as_str()));
            warn!(
                "Duplicate {} output column {}, renamed to {}",
                kind.label(),
                output.name,
                renamed
            );
            output.name = renamed;
        }
        let sources = order
            .iter()
            .filter_map(|n| row.entry(n).map(|c| (n.clone(), c.name.clone())))
            .collect();
        columns.push(MatchedColumn {
            output,
            is_matching: row.is_matching,
            sources,
        });
    }

    MatchingTable { kind, columns }
}

impl MatchingTable {
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn columns(&self) -> &[MatchedColumn] {
        &self.columns
    }

    pub fn output_columns(&self) -> Vec<Column> {
        self.columns.iter().map(|c| c.output.clone()).collect()
    }

    pub fn matching_column(&self) -> Option<&MatchedColumn> {
        self.columns.iter().find(|c| c.is_matching)
    }

    /// Source column of `network` feeding the output column `output`
    pub fn source_column(&self, output: &str, network: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.output.name == output)
            .and_then(|c| c.sources.get(network))
            .map(|s| s.as_str())
    }

    /// Check every source column against the networks' tables
    pub fn validate(
        &self,
        order: &[NetworkId],
        records: &IndexMap<NetworkId, NetworkRecord>,
    ) -> MergeResult<()> {
        for column in &self.columns {
            for (network, source) in &column.sources {
                if !order.contains(network) {
                    return Err(MergeError::InconsistentMatchingTable(format!(
                        "column {} refers to network {} which is not being merged",
                        column.output.name, network
                    )));
                }
                let record = records
                    .get(network)
                    .ok_or_else(|| MergeError::MissingRecord(network.clone()))?;
                if self.kind.table(record).column(source).is_none() {
                    return Err(MergeError::InconsistentMatchingTable(format!(
                        "{} column {} of network {} does not exist",
                        self.kind.label(),
                        source,
                        network
                    )));
                }
            }
        }
        Ok(())
    }
}
