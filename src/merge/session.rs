//! State of one merge, from network selection to committing the result.

use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::assembler::{create_merged_network_with_view, MergeContext};
use super::column_matcher::MatchingColumns;
use super::engine::{MergeOptions, MergeType};
use super::matching_table::{MatchingTable, MatchingTableStore, TableKind};
use crate::common::unique_name;
use crate::errors::{MergeError, MergeResult};
use crate::network::{Column, LoadedNetwork, NetworkId, NetworkRecord, VisualStyle};
use crate::services::{NetworkLoader, Workspace};

pub const DEFAULT_OUTPUT_NAME: &str = "Merged Network";

/// A network offered for merging, as (name, id)
pub type NetworkEntry = (String, NetworkId);

pub struct MergeSession {
    workspace_order: Vec<NetworkId>,
    available: Vec<NetworkEntry>,
    to_merge: Vec<NetworkEntry>,
    selected_available: IndexSet<NetworkId>,
    selected_to_merge: IndexSet<NetworkId>,
    preloaded: HashSet<NetworkId>,
    records: IndexMap<NetworkId, NetworkRecord>,
    styles: IndexMap<NetworkId, VisualStyle>,
    matching_columns: MatchingColumns,
    node_store: MatchingTableStore,
    edge_store: MatchingTableStore,
    net_store: MatchingTableStore,
    options: MergeOptions,
    default_name: String,
    output_name: String,
}

impl MergeSession {
    pub fn new(
        workspace_networks: Vec<NetworkEntry>,
        preloaded: IndexMap<NetworkId, LoadedNetwork>,
        unique_name: String,
    ) -> Self {
        let mut records = IndexMap::new();
        let mut styles = IndexMap::new();
        for (id, loaded) in preloaded {
            let (record, style) = loaded.into_parts();
            records.insert(id.clone(), record);
            styles.insert(id, style);
        }
        Self {
            workspace_order: workspace_networks.iter().map(|(_, id)| id.clone()).collect(),
            available: workspace_networks,
            to_merge: Vec::new(),
            selected_available: IndexSet::new(),
            selected_to_merge: IndexSet::new(),
            preloaded: records.keys().cloned().collect(),
            records,
            styles,
            matching_columns: MatchingColumns::new(),
            node_store: MatchingTableStore::new(TableKind::Node),
            edge_store: MatchingTableStore::new(TableKind::Edge),
            net_store: MatchingTableStore::new(TableKind::Network),
            options: MergeOptions::default(),
            default_name: unique_name.clone(),
            output_name: unique_name,
        }
    }

    /// Session over every network of a workspace; all of them count as cached
    pub fn from_workspace(workspace: &Workspace) -> Self {
        let names = workspace.network_names();
        let output_name = unique_name(
            DEFAULT_OUTPUT_NAME,
            names.iter().map(|(name, _)| name.as_str()),
        );
        let preloaded = names
            .iter()
            .filter_map(|(_, id)| Some((id.clone(), workspace.loaded_network(id)?)))
            .collect();
        Self::new(names, preloaded, output_name)
    }

    pub fn available(&self) -> &[NetworkEntry] {
        &self.available
    }

    pub fn to_merge(&self) -> &[NetworkEntry] {
        &self.to_merge
    }

    /// Network ids in merge order; the first one is the base network
    pub fn merge_order(&self) -> Vec<NetworkId> {
        self.to_merge.iter().map(|(_, id)| id.clone()).collect()
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn matching_columns(&self) -> &MatchingColumns {
        &self.matching_columns
    }

    pub fn record(&self, network_id: &str) -> Option<&NetworkRecord> {
        self.records.get(network_id)
    }

    pub fn store(&self, kind: TableKind) -> &MatchingTableStore {
        match kind {
            TableKind::Node => &self.node_store,
            TableKind::Edge => &self.edge_store,
            TableKind::Network => &self.net_store,
        }
    }

    fn store_mut(&mut self, kind: TableKind) -> &mut MatchingTableStore {
        match kind {
            TableKind::Node => &mut self.node_store,
            TableKind::Edge => &mut self.edge_store,
            TableKind::Network => &mut self.net_store,
        }
    }

    /// Resolved matching table in the current merge order
    pub fn matching_table(&self, kind: TableKind) -> MatchingTable {
        self.store(kind).to_matching_table(&self.merge_order())
    }

    pub fn toggle_available(&mut self, network_id: &str) {
        if !self.available.iter().any(|(_, id)| id == network_id) {
            debug!("{} is not available for selection", network_id);
            return;
        }
        if !self.selected_available.shift_remove(network_id) {
            self.selected_available.insert(network_id.to_string());
        }
    }

    pub fn toggle_to_merge(&mut self, network_id: &str) {
        if !self.to_merge.iter().any(|(_, id)| id == network_id) {
            debug!("{} is not in the merge list", network_id);
            return;
        }
        if !self.selected_to_merge.shift_remove(network_id) {
            self.selected_to_merge.insert(network_id.to_string());
        }
    }

    /// Move the selected available networks to the merge list, loading the
    /// ones not cached yet one at a time. Any load failure leaves the session as it was.
    pub async fn add_selected(&mut self, loader: &dyn NetworkLoader) -> MergeResult<()> {
        let ids: Vec<NetworkId> = self
            .available
            .iter()
            .filter(|(_, id)| self.selected_available.contains(id))
            .map(|(_, id)| id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let mut fetched = IndexMap::new();
        for id in ids.iter().filter(|id| !self.records.contains_key(*id)) {
            debug!("Loading network {}", id);
            let loaded = loader
                .load_network(id)
                .await
                .map_err(|e| MergeError::LoadFailed {
                    network: id.clone(),
                    reason: format!("{:#}", e),
                })?;
            fetched.insert(id.clone(), loaded);
        }

        for (id, loaded) in fetched {
            let (record, style) = loaded.into_parts();
            self.records.insert(id.clone(), record);
            self.styles.insert(id, style);
        }
        for id in &ids {
            if let Some(record) = self.records.get(id) {
                self.matching_columns.register(id, record);
            }
        }
        for store in [&mut self.node_store, &mut self.edge_store, &mut self.net_store] {
            store.add_networks(&ids, &self.records, &self.matching_columns)?;
        }

        let (moved, kept): (Vec<_>, Vec<_>) = self
            .available
            .drain(..)
            .partition(|(_, id)| ids.contains(id));
        self.available = kept;
        self.to_merge.extend(moved);
        self.selected_available.clear();
        info!("Added {} network(s) to merge list", ids.len());
        Ok(())
    }

    /// Return the selected merge-list networks to the available list
    pub fn remove_selected(&mut self) {
        let ids: Vec<NetworkId> = self
            .to_merge
            .iter()
            .filter(|(_, id)| self.selected_to_merge.contains(id))
            .map(|(_, id)| id.clone())
            .collect();
        if ids.is_empty() {
            return;
        }

        for store in [&mut self.node_store, &mut self.edge_store, &mut self.net_store] {
            store.remove_networks(&ids);
        }
        for id in &ids {
            self.matching_columns.remove(id);
        }

        let (moved, kept): (Vec<_>, Vec<_>) = self
            .to_merge
            .drain(..)
            .partition(|(_, id)| ids.contains(id));
        self.to_merge = kept;
        self.available.extend(moved);
        let order = &self.workspace_order;
        self.available.sort_by_key(|(_, id)| {
            order.iter().position(|o| o == id).unwrap_or(usize::MAX)
        });
        self.selected_to_merge.clear();
        debug!("Removed {} network(s) from merge list", ids.len());
    }

    fn is_selected(&self, idx: usize) -> bool {
        self.selected_to_merge.contains(&self.to_merge[idx].1)
    }

    /// Move each selected entry one slot up, never past another selected entry
    pub fn move_up(&mut self) {
        for i in 1..self.to_merge.len() {
            if self.is_selected(i) && !self.is_selected(i - 1) {
                self.to_merge.swap(i - 1, i);
            }
        }
    }

    /// Move each selected entry one slot down, never past another selected entry
    pub fn move_down(&mut self) {
        for i in (0..self.to_merge.len().saturating_sub(1)).rev() {
            if self.is_selected(i) && !self.is_selected(i + 1) {
                self.to_merge.swap(i, i + 1);
            }
        }
    }

    pub fn set_merge_type(&mut self, merge_type: MergeType) {
        self.options.merge_type = merge_type;
        if merge_type == MergeType::Union {
            self.options.merge_only_nodes = false;
        }
    }

    pub fn set_merge_only_nodes(&mut self, merge_only_nodes: bool) -> MergeResult<()> {
        let options = MergeOptions {
            merge_only_nodes,
            ..self.options
        };
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn set_merge_within_network(&mut self, merge_within_network: bool) {
        self.options.merge_within_network = merge_within_network;
    }

    /// Select the identity column of a network in the merge list
    pub fn set_matching_column(&mut self, network_id: &str, column: Column) -> MergeResult<()> {
        if !self.to_merge.iter().any(|(_, id)| id == network_id) {
            return Err(MergeError::UnknownNetwork(network_id.to_string()));
        }
        let record = self
            .records
            .get(network_id)
            .ok_or_else(|| MergeError::MissingRecord(network_id.to_string()))?;
        self.node_store
            .set_matching_column(network_id, record, column.clone())?;
        self.matching_columns.set_match(network_id, column);
        Ok(())
    }

    /// Point a matching table row at another source column of a network
    pub fn set_table_entry(
        &mut self,
        kind: TableKind,
        row_id: usize,
        network_id: &str,
        column: Option<Column>,
    ) -> MergeResult<()> {
        let record = self
            .records
            .get(network_id)
            .ok_or_else(|| MergeError::UnknownNetwork(network_id.to_string()))?
            .clone();
        self.store_mut(kind).set_entry(row_id, network_id, &record, column)
    }

    pub fn rename_table_output(
        &mut self,
        kind: TableKind,
        row_id: usize,
        name: &str,
    ) -> MergeResult<()> {
        self.store_mut(kind).rename_output(row_id, name)
    }

    pub fn set_output_name(&mut self, name: &str) {
        self.output_name = name.to_string();
    }

    pub fn is_ready(&self) -> bool {
        self.matching_columns
            .is_ready(&self.merge_order(), &self.records)
    }

    /// Run the merge and commit the result to the workspace
    pub fn merge(&self, workspace: &mut Workspace) -> MergeResult<NetworkId> {
        let order = self.merge_order();
        if order.is_empty() {
            return Err(MergeError::NoNetworks);
        }
        if !self.is_ready() {
            let stale = self.matching_columns.stale_networks(&order, &self.records);
            return Err(MergeError::NotReady(format!(
                "no valid matching column for {}",
                stale
                    .iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        self.options.validate()?;

        let name = if self.output_name.trim().is_empty() {
            warn!("Empty output name, using {}", self.default_name);
            self.default_name.as_str()
        } else {
            self.output_name.as_str()
        };
        let node_table = self.matching_table(TableKind::Node);
        let edge_table = self.matching_table(TableKind::Edge);
        let net_table = self.matching_table(TableKind::Network);
        let ctx = MergeContext {
            order: &order,
            name,
            records: &self.records,
            node_table: &node_table,
            edge_table: &edge_table,
            net_table: &net_table,
            matching_columns: &self.matching_columns,
            base_style: self.styles.get(&order[0]),
            options: self.options,
        };
        let merged = create_merged_network_with_view(&ctx)?;
        Ok(workspace.add_network_with_view(merged))
    }

    /// Back to the state right after construction
    pub fn reset(&mut self) {
        let preloaded = &self.preloaded;
        self.records.retain(|id, _| preloaded.contains(id));
        self.styles.retain(|id, _| preloaded.contains(id));
        self.available.append(&mut self.to_merge);
        let order = &self.workspace_order;
        self.available.sort_by_key(|(_, id)| {
            order.iter().position(|o| o == id).unwrap_or(usize::MAX)
        });
        self.selected_available.clear();
        self.selected_to_merge.clear();
        self.matching_columns.reset();
        self.node_store.reset();
        self.edge_store.reset();
        self.net_store.reset();
        self.options = MergeOptions::default();
        self.output_name = self.default_name.clone();
    }

    pub fn close(mut self) {
        self.reset();
        debug!("Merge session closed");
    }
}
