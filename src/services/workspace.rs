use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::network::{
    LoadedNetwork, Network, NetworkId, NetworkView, NetworkWithView, PositionMap, Table,
    VisualStyle,
};

/// In-memory store of the networks open in a workspace
#[derive(Debug, Default)]
pub struct Workspace {
    networks: IndexMap<NetworkId, Network>,
    visual_styles: IndexMap<NetworkId, VisualStyle>,
    tables: IndexMap<NetworkId, (Table, Table)>,
    net_tables: IndexMap<NetworkId, Table>,
    view_models: IndexMap<NetworkId, NetworkView>,
    network_ids: Vec<NetworkId>,
    current_network_id: Option<NetworkId>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_network(&mut self, network: Network) {
        self.networks.insert(network.id.clone(), network);
    }

    pub fn set_visual_style(&mut self, network_id: &str, style: VisualStyle) {
        self.visual_styles.insert(network_id.to_string(), style);
    }

    pub fn set_tables(&mut self, network_id: &str, node_table: Table, edge_table: Table) {
        self.tables
            .insert(network_id.to_string(), (node_table, edge_table));
    }

    pub fn set_net_table(&mut self, network_id: &str, net_table: Table) {
        self.net_tables.insert(network_id.to_string(), net_table);
    }

    pub fn set_view_model(&mut self, network_id: &str, view: NetworkView) {
        self.view_models.insert(network_id.to_string(), view);
    }

    pub fn add_network_ids(&mut self, network_id: &str) {
        if !self.network_ids.iter().any(|id| id == network_id) {
            self.network_ids.push(network_id.to_string());
        }
    }

    pub fn set_current_network_id(&mut self, network_id: &str) {
        self.current_network_id = Some(network_id.to_string());
    }

    /// Push a merged network with all its parts and make it current
    pub fn add_network_with_view(&mut self, merged: NetworkWithView) -> NetworkId {
        let id = merged.network.id.clone();
        self.set_current_network_id(&id);
        self.add_network_ids(&id);
        self.add_network(merged.network);
        self.set_visual_style(&id, merged.visual_style);
        self.set_tables(&id, merged.node_table, merged.edge_table);
        self.set_net_table(&id, merged.net_table);
        if let Some(view) = merged.network_views.into_iter().next() {
            self.set_view_model(&id, view);
        }
        info!("Added network {} to workspace", id);
        id
    }

    /// Apply layout positions. Returns false when the network or its view is gone.
    pub fn update_node_positions(&mut self, network_id: &str, positions: &PositionMap) -> bool {
        let Some(view) = self.view_models.get_mut(network_id) else {
            warn!("Discarding positions for unknown network {}", network_id);
            return false;
        };
        for (node_id, position) in positions {
            match view.node_views.get_mut(node_id) {
                Some(node_view) => node_view.position = Some(*position),
                None => debug!("No view for node {} of {}", node_id, network_id),
            }
        }
        true
    }

    pub fn remove_network(&mut self, network_id: &str) -> Option<Network> {
        self.visual_styles.shift_remove(network_id);
        self.tables.shift_remove(network_id);
        self.net_tables.shift_remove(network_id);
        self.view_models.shift_remove(network_id);
        self.network_ids.retain(|id| id != network_id);
        if self.current_network_id.as_deref() == Some(network_id) {
            self.current_network_id = self.network_ids.first().cloned();
        }
        self.networks.shift_remove(network_id)
    }

    pub fn network(&self, network_id: &str) -> Option<&Network> {
        self.networks.get(network_id)
    }

    pub fn visual_style(&self, network_id: &str) -> Option<&VisualStyle> {
        self.visual_styles.get(network_id)
    }

    pub fn tables(&self, network_id: &str) -> Option<(&Table, &Table)> {
        self.tables.get(network_id).map(|(n, e)| (n, e))
    }

    pub fn net_table(&self, network_id: &str) -> Option<&Table> {
        self.net_tables.get(network_id)
    }

    pub fn view_model(&self, network_id: &str) -> Option<&NetworkView> {
        self.view_models.get(network_id)
    }

    pub fn network_ids(&self) -> &[NetworkId] {
        &self.network_ids
    }

    pub fn current_network_id(&self) -> Option<&str> {
        self.current_network_id.as_deref()
    }

    /// (name, id) pairs in workspace order
    pub fn network_names(&self) -> Vec<(String, NetworkId)> {
        self.network_ids
            .iter()
            .filter_map(|id| self.networks.get(id).map(|n| (n.name.clone(), id.clone())))
            .collect()
    }

    /// A stored network in the shape a merge session consumes
    pub fn loaded_network(&self, network_id: &str) -> Option<LoadedNetwork> {
        let network = self.networks.get(network_id)?.clone();
        let (node_table, edge_table) = self.tables.get(network_id)?.clone();
        Some(LoadedNetwork {
            network,
            node_table,
            edge_table,
            net_table: self.net_tables.get(network_id).cloned().unwrap_or_default(),
            visual_style: self.visual_styles.get(network_id).cloned().unwrap_or_default(),
        })
    }

    /// Reassemble a stored network into a bundle, e.g. for export
    pub fn network_with_view(&self, network_id: &str) -> Option<NetworkWithView> {
        let network = self.networks.get(network_id)?.clone();
        let (node_table, edge_table) = self.tables.get(network_id)?.clone();
        Some(NetworkWithView {
            network,
            node_table,
            edge_table,
            net_table: self.net_tables.get(network_id).cloned().unwrap_or_default(),
            visual_style: self.visual_styles.get(network_id).cloned().unwrap_or_default(),
            network_views: self.view_models.get(network_id).cloned().into_iter().collect(),
        })
    }
}
