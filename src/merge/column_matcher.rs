use indexmap::IndexMap;
use tracing::debug;

use crate::network::{Column, NetworkId, NetworkRecord, Table, ValueType};

pub const DEFAULT_MATCHING_COLUMN: &str = "name";
pub const NONE_COLUMN: &str = "none";

/// Column used as identity key for each network of a merge
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchingColumns {
    columns: IndexMap<NetworkId, Column>,
}

impl MatchingColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default key for a node table: a string `name` column, else the first column,
    /// else the `none` sentinel
    pub fn propose_default(node_table: &Table) -> Column {
        if let Some(column) = node_table
            .columns
            .iter()
            .find(|c| c.name == DEFAULT_MATCHING_COLUMN && c.value_type == ValueType::String)
        {
            return column.clone();
        }
        node_table
            .columns
            .first()
            .cloned()
            .unwrap_or_else(|| Column::new(NONE_COLUMN, ValueType::String))
    }

    /// Register a network with its proposed default column.
    /// An existing selection is kept.
    pub fn register(&mut self, network_id: &str, record: &NetworkRecord) -> &Column {
        self.columns
            .entry(network_id.to_string())
            .or_insert_with(|| Self::propose_default(&record.node_table))
    }

    /// Record a user override; networks not registered in this session are ignored
    pub fn set_match(&mut self, network_id: &str, column: Column) {
        match self.columns.get_mut(network_id) {
            Some(existing) => {
                debug!(
                    "Matching column for {} set to {} ({:?})",
                    network_id, column.name, column.value_type
                );
                *existing = column;
            }
            None => debug!("Ignoring matching column for unknown network {}", network_id),
        }
    }

    pub fn get(&self, network_id: &str) -> Option<&Column> {
        self.columns.get(network_id)
    }

    pub fn remove(&mut self, network_id: &str) -> Option<Column> {
        self.columns.shift_remove(network_id)
    }

    pub fn contains(&self, network_id: &str) -> bool {
        self.columns.contains_key(network_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NetworkId, &Column)> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn reset(&mut self) {
        self.columns.clear();
    }

    /// Networks of `order` whose selected column no longer exists in their node table
    pub fn stale_networks<'a>(
        &self,
        order: &'a [NetworkId],
        records: &IndexMap<NetworkId, NetworkRecord>,
    ) -> Vec<&'a NetworkId> {
        order
            .iter()
            .filter(|id| {
                match (self.columns.get(id.as_str()), records.get(id.as_str())) {
                    (Some(column), Some(record)) => !record.node_table.has_column(column),
                    _ => true,
                }
            })
            .collect()
    }

    /// True when every network of `order` has a selected column present in its node table
    pub fn is_ready(
        &self,
        order: &[NetworkId],
        records: &IndexMap<NetworkId, NetworkRecord>,
    ) -> bool {
        !order.is_empty() && self.stale_networks(order, records).is_empty()
    }
}
