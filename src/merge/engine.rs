//! Set combination of node and edge identities across networks.
//!
//! Nodes are identified by the value of their network's matching column.
//! Nodes without a value never unify with anything. Edges are identified by
//! the identities of their endpoints plus their `interaction` value.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::column_matcher::MatchingColumns;
use super::matching_table::MatchingTable;
use crate::common::key_of;
use crate::errors::{MergeError, MergeResult};
use crate::network::{ElementId, NetworkId, NetworkRecord, Row};

pub const INTERACTION_COLUMN: &str = "interaction";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeType {
    #[default]
    Union,
    Intersection,
    Difference,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    pub merge_type: MergeType,
    /// Unify nodes of the same network sharing a key
    pub merge_within_network: bool,
    /// Apply intersection/difference to nodes only and keep the edges between survivors
    pub merge_only_nodes: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            merge_type: MergeType::Union,
            merge_within_network: true,
            merge_only_nodes: false,
        }
    }
}

impl MergeOptions {
    pub fn validate(&self) -> MergeResult<()> {
        if self.merge_type == MergeType::Union && self.merge_only_nodes {
            return Err(MergeError::InvalidOptions(
                "union always merges edges; merge_only_nodes is not allowed".to_string(),
            ));
        }
        Ok(())
    }
}

/// Identity of a node across networks
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    Key(String),
    Unique(usize, ElementId),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct EdgeIdentity {
    source: Identity,
    target: Identity,
    interaction: Option<String>,
}

/// A source element contributing to a merged element
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub network: NetworkId,
    pub element: ElementId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergedNode {
    pub identity: Identity,
    /// Source nodes in merge order
    pub members: Vec<Member>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergedEdge {
    /// Index into `CombinedNetwork::nodes`
    pub source: usize,
    pub target: usize,
    pub members: Vec<Member>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CombinedNetwork {
    pub nodes: Vec<MergedNode>,
    pub edges: Vec<MergedEdge>,
}

/// Groups elements by identity. With `within_network` set a group takes any
/// number of elements of a network, as long as their origins differ; unset, a
/// group takes at most one element of each network.
struct Grouper<K, O> {
    within_network: bool,
    index: HashMap<K, Vec<usize>>,
    networks: Vec<HashSet<usize>>,
    origins: Vec<HashSet<(usize, O)>>,
}

impl<K, O> Grouper<K, O>
where
    K: Eq + std::hash::Hash,
    O: Eq + std::hash::Hash,
{
    fn new(within_network: bool) -> Self {
        Self {
            within_network,
            index: HashMap::new(),
            networks: Vec::new(),
            origins: Vec::new(),
        }
    }

    fn assign(&mut self, key: Option<K>, network_idx: usize, origin: O) -> usize {
        let Some(key) = key else {
            return self.open(network_idx, origin);
        };
        let slot = (network_idx, origin);
        let found = self.index.get(&key).and_then(|candidates| {
            candidates.iter().copied().find(|&g| {
                if self.within_network {
                    !self.origins[g].contains(&slot)
                } else {
                    !self.networks[g].contains(&network_idx)
                }
            })
        });
        match found {
            Some(group) => {
                self.networks[group].insert(network_idx);
                self.origins[group].insert(slot);
                group
            }
            None => {
                let group = self.open(network_idx, slot.1);
                self.index.entry(key).or_default().push(group);
                group
            }
        }
    }

    fn open(&mut self, network_idx: usize, origin: O) -> usize {
        self.networks.push(HashSet::from([network_idx]));
        self.origins.push(HashSet::from([(network_idx, origin)]));
        self.networks.len() - 1
    }

    /// Number of distinct networks contributing to a group
    fn coverage(&self, group: usize) -> usize {
        self.networks[group].len()
    }
}

/// Compute the merged node and edge sets of `order` under `options`
pub fn combine(
    order: &[NetworkId],
    records: &IndexMap<NetworkId, NetworkRecord>,
    matching_columns: &MatchingColumns,
    options: &MergeOptions,
) -> MergeResult<CombinedNetwork> {
    if order.is_empty() {
        return Err(MergeError::NoNetworks);
    }
    options.validate()?;

    let sources: Vec<(&NetworkId, &NetworkRecord)> = order
        .iter()
        .map(|id| {
            records
                .get(id)
                .map(|r| (id, r))
                .ok_or_else(|| MergeError::MissingRecord(id.clone()))
        })
        .collect::<MergeResult<_>>()?;

    // Node identities
    let mut node_identity: Vec<HashMap<&str, Identity>> = Vec::with_capacity(sources.len());
    let mut node_keys: Vec<HashSet<Identity>> = Vec::with_capacity(sources.len());
    for (idx, (id, record)) in sources.iter().enumerate() {
        let column = matching_columns
            .get(id)
            .filter(|c| record.node_table.has_column(c))
            .ok_or_else(|| MergeError::MissingMatchingColumn {
                network: id.to_string(),
                column: matching_columns
                    .get(id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
            })?;

        let mut identities = HashMap::new();
        let mut keys = HashSet::new();
        for node in &record.network.nodes {
            let identity = record
                .node_table
                .get_value(&node.id, &column.name)
                .and_then(key_of)
                .map(Identity::Key)
                .unwrap_or_else(|| Identity::Unique(idx, node.id.clone()));
            keys.insert(identity.clone());
            identities.insert(node.id.as_str(), identity);
        }
        node_identity.push(identities);
        node_keys.push(keys);
    }

    // Node groups
    let mut grouper = Grouper::new(options.merge_within_network);
    let mut groups: Vec<MergedNode> = Vec::new();
    let mut group_of: Vec<HashMap<&str, usize>> = Vec::with_capacity(sources.len());
    for (idx, (id, record)) in sources.iter().enumerate() {
        let mut lookup = HashMap::new();
        for node in &record.network.nodes {
            let identity = node_identity[idx][node.id.as_str()].clone();
            let key = match &identity {
                Identity::Key(_) => Some(identity.clone()),
                Identity::Unique(..) => None,
            };
            let group = grouper.assign(key, idx, node.id.as_str());
            if group == groups.len() {
                groups.push(MergedNode {
                    identity,
                    members: Vec::new(),
                });
            }
            groups[group].members.push(Member {
                network: id.to_string(),
                element: node.id.clone(),
            });
            lookup.insert(node.id.as_str(), group);
        }
        group_of.push(lookup);
    }

    let network_count = sources.len();
    let keep_node = |group: usize, node: &MergedNode| -> bool {
        match options.merge_type {
            MergeType::Union => true,
            MergeType::Intersection => grouper.coverage(group) == network_count,
            MergeType::Difference => {
                node.members.first().map(|m| &m.network) == Some(sources[0].0)
                    && node_keys[1..]
                        .iter()
                        .all(|keys| !keys.contains(&node.identity))
            }
        }
    };

    let mut survivor: HashMap<usize, usize> = HashMap::new();
    let mut nodes = Vec::new();
    for (group_idx, node) in groups.into_iter().enumerate() {
        if keep_node(group_idx, &node) {
            survivor.insert(group_idx, nodes.len());
            nodes.push(node);
        }
    }

    // Edges
    let mut edge_identities: Vec<Vec<(usize, usize, EdgeIdentity)>> = Vec::new();
    let mut edge_keys: Vec<HashSet<EdgeIdentity>> = Vec::new();
    for (idx, (id, record)) in sources.iter().enumerate() {
        let mut identities = Vec::with_capacity(record.network.edges.len());
        let mut keys = HashSet::new();
        for edge in &record.network.edges {
            let endpoint = |node_id: &str| -> MergeResult<(usize, Identity)> {
                let group = group_of[idx].get(node_id).copied().ok_or_else(|| {
                    MergeError::InvalidNetwork(format!(
                        "edge {} of network {} references missing node {}",
                        edge.id, id, node_id
                    ))
                })?;
                Ok((group, node_identity[idx][node_id].clone()))
            };
            let (source_group, source) = endpoint(&edge.source)?;
            let (target_group, target) = endpoint(&edge.target)?;
            let identity = EdgeIdentity {
                source,
                target,
                interaction: record
                    .edge_table
                    .get_value(&edge.id, INTERACTION_COLUMN)
                    .and_then(key_of),
            };
            keys.insert(identity.clone());
            identities.push((source_group, target_group, identity));
        }
        edge_identities.push(identities);
        edge_keys.push(keys);
    }

    let operator_applies_to_edges =
        options.merge_type != MergeType::Union && !options.merge_only_nodes;
    let mut edge_grouper = Grouper::new(options.merge_within_network);
    let mut edges: Vec<MergedEdge> = Vec::new();
    for (idx, (id, record)) in sources.iter().enumerate() {
        for (edge, (source_group, target_group, identity)) in
            record.network.edges.iter().zip(&edge_identities[idx])
        {
            let (Some(&source), Some(&target)) =
                (survivor.get(source_group), survivor.get(target_group))
            else {
                continue;
            };
            if operator_applies_to_edges
                && options.merge_type == MergeType::Difference
                && (idx != 0 || edge_keys[1..].iter().any(|keys| keys.contains(identity)))
            {
                continue;
            }

            let key = (source, target, identity.interaction.clone());
            // parallel edges of one network keep their own groups
            let origin = (edge.source.as_str(), edge.target.as_str());
            let group = edge_grouper.assign(Some(key), idx, origin);
            if group == edges.len() {
                edges.push(MergedEdge {
                    source,
                    target,
                    members: Vec::new(),
                });
            }
            edges[group].members.push(Member {
                network: id.to_string(),
                element: edge.id.clone(),
            });
        }
    }
    if operator_applies_to_edges && options.merge_type == MergeType::Intersection {
        edges = edges
            .into_iter()
            .enumerate()
            .filter(|(group, _)| edge_grouper.coverage(*group) == network_count)
            .map(|(_, edge)| edge)
            .collect();
    }

    info!(
        "Combined {} networks with {:?}: {} nodes, {} edges",
        order.len(),
        options.merge_type,
        nodes.len(),
        edges.len()
    );
    Ok(CombinedNetwork { nodes, edges })
}

/// Attribute row of a merged element. For every output column the first
/// member, in merge order, whose network contributes a non-null value wins.
pub fn resolve_attributes(
    members: &[Member],
    table: &MatchingTable,
    records: &IndexMap<NetworkId, NetworkRecord>,
) -> Row {
    let kind = table.kind();
    let mut row = Row::new();
    for column in table.columns() {
        let value = members
            .iter()
            .find_map(|member| {
                let source = column.sources.get(&member.network)?;
                let record = records.get(&member.network)?;
                kind.table(record).get_value(&member.element, source)
            })
            .map(|v| column.output.value_type.coerce(v))
            .unwrap_or(Value::Null);
        row.insert(column.output.name.clone(), value);
    }
    debug!("Resolved {} attributes from {} members", row.len(), members.len());
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::matching_table::{MatchingTableStore, TableKind};
    use crate::network::{Column, Edge, Network, Node, Table, ValueType};
    use serde_json::json;

    fn network(id: &str, nodes: &[(&str, Value)], edges: &[(&str, &str, &str)]) -> NetworkRecord {
        let mut node_table = Table::new("nodes", vec![Column::new("name", ValueType::String)]);
        for (node_id, name) in nodes {
            let mut row = Row::new();
            row.insert("name".to_string(), name.clone());
            node_table.insert_row(node_id, row);
        }
        NetworkRecord {
            network: Network {
                id: id.to_string(),
                name: id.to_string(),
                nodes: nodes.iter().map(|(n, _)| Node { id: n.to_string() }).collect(),
                edges: edges
                    .iter()
                    .map(|(e, s, t)| Edge {
                        id: e.to_string(),
                        source: s.to_string(),
                        target: t.to_string(),
                    })
                    .collect(),
            },
            node_table,
            edge_table: Table::new("edges", vec![]),
            net_table: Table::default(),
        }
    }

    fn session(
        nets: Vec<NetworkRecord>,
    ) -> (Vec<NetworkId>, IndexMap<NetworkId, NetworkRecord>, MatchingColumns) {
        let mut records = IndexMap::new();
        let mut cols = MatchingColumns::new();
        let mut order = Vec::new();
        for net in nets {
            let id = net.network.id.clone();
            cols.register(&id, &net);
            order.push(id.clone());
            records.insert(id, net);
        }
        (order, records, cols)
    }

    fn opts(merge_type: MergeType) -> MergeOptions {
        MergeOptions {
            merge_type,
            ..Default::default()
        }
    }

    fn keys(combined: &CombinedNetwork) -> Vec<String> {
        combined
            .nodes
            .iter()
            .map(|n| match &n.identity {
                Identity::Key(k) => k.clone(),
                Identity::Unique(_, id) => format!("#{}", id),
            })
            .collect()
    }

    #[test]
    fn test_union_unifies_shared_key() {
        let (order, records, cols) = session(vec![
            network("A", &[("a1", json!("X")), ("a2", json!("Y"))], &[("ea", "a1", "a2")]),
            network("B", &[("b1", json!("Y")), ("b2", json!("Z"))], &[("eb", "b1", "b2")]),
        ]);
        let combined = combine(&order, &records, &cols, &opts(MergeType::Union)).unwrap();
        assert_eq!(keys(&combined), vec!["X", "Y", "Z"]);
        assert_eq!(combined.nodes[1].members.len(), 2);
        assert_eq!(combined.edges.len(), 2);
        // eb re-pointed to the unified Y node
        assert_eq!(combined.edges[1].source, 1);
        assert_eq!(combined.edges[1].target, 2);
    }

    #[test]
    fn test_intersection_keeps_common_key() {
        let (order, records, cols) = session(vec![
            network("A", &[("a1", json!("X")), ("a2", json!("Y"))], &[]),
            network("B", &[("b1", json!("Y")), ("b2", json!("Z"))], &[]),
        ]);
        let combined = combine(&order, &records, &cols, &opts(MergeType::Intersection)).unwrap();
        assert_eq!(keys(&combined), vec!["Y"]);
    }

    #[test]
    fn test_difference_depends_on_base() {
        let a = network("A", &[("a1", json!("X")), ("a2", json!("Y"))], &[]);
        let b = network("B", &[("b1", json!("Y")), ("b2", json!("Z"))], &[]);
        let (order, records, cols) = session(vec![a.clone(), b.clone()]);
        let combined = combine(&order, &records, &cols, &opts(MergeType::Difference)).unwrap();
        assert_eq!(keys(&combined), vec!["X"]);

        let (order, records, cols) = session(vec![b, a]);
        let combined = combine(&order, &records, &cols, &opts(MergeType::Difference)).unwrap();
        assert_eq!(keys(&combined), vec!["Z"]);
    }

    #[test]
    fn test_null_keys_never_unify() {
        let (order, records, cols) = session(vec![
            network("A", &[("a1", Value::Null), ("a2", json!(""))], &[]),
            network("B", &[("b1", Value::Null)], &[]),
        ]);
        let union = combine(&order, &records, &cols, &opts(MergeType::Union)).unwrap();
        assert_eq!(union.nodes.len(), 3);
        let intersection =
            combine(&order, &records, &cols, &opts(MergeType::Intersection)).unwrap();
        assert!(intersection.nodes.is_empty());
        let difference = combine(&order, &records, &cols, &opts(MergeType::Difference)).unwrap();
        assert_eq!(difference.nodes.len(), 2);
    }

    #[test]
    fn test_merge_within_network_flag() {
        let (order, records, cols) = session(vec![
            network("A", &[("a1", json!("K")), ("a2", json!("K"))], &[]),
            network("B", &[("b1", json!("K"))], &[]),
        ]);
        let within = combine(&order, &records, &cols, &opts(MergeType::Union)).unwrap();
        assert_eq!(within.nodes.len(), 1);
        assert_eq!(within.nodes[0].members.len(), 3);

        let options = MergeOptions {
            merge_within_network: false,
            ..opts(MergeType::Union)
        };
        let across = combine(&order, &records, &cols, &options).unwrap();
        assert_eq!(across.nodes.len(), 2);
        assert_eq!(across.nodes[0].members.len(), 2);
        assert_eq!(across.nodes[1].members.len(), 1);
    }

    #[test]
    fn test_intersection_without_within_network_needs_every_network() {
        let (order, records, cols) = session(vec![
            network("A", &[("a1", json!("K")), ("a2", json!("K"))], &[]),
            network("B", &[("b1", json!("K"))], &[]),
        ]);
        let options = MergeOptions {
            merge_within_network: false,
            ..opts(MergeType::Intersection)
        };
        let combined = combine(&order, &records, &cols, &options).unwrap();
        assert_eq!(combined.nodes.len(), 1);
        let members: Vec<_> = combined.nodes[0]
            .members
            .iter()
            .map(|m| m.element.as_str())
            .collect();
        assert_eq!(members, vec!["a1", "b1"]);
    }

    #[test]
    fn test_parallel_edges_survive_single_network_union() {
        let (order, records, cols) = session(vec![network(
            "A",
            &[("a1", json!("X")), ("a2", json!("Y"))],
            &[("e1", "a1", "a2"), ("e2", "a1", "a2")],
        )]);
        let combined = combine(&order, &records, &cols, &opts(MergeType::Union)).unwrap();
        assert_eq!(combined.edges.len(), 2);
    }

    #[test]
    fn test_parallel_edges_pair_up_across_networks() {
        let (order, records, cols) = session(vec![
            network(
                "A",
                &[("a1", json!("X")), ("a2", json!("Y"))],
                &[("ea1", "a1", "a2"), ("ea2", "a1", "a2")],
            ),
            network(
                "B",
                &[("b1", json!("X")), ("b2", json!("Y"))],
                &[("eb1", "b1", "b2")],
            ),
        ]);
        let union = combine(&order, &records, &cols, &opts(MergeType::Union)).unwrap();
        assert_eq!(union.edges.len(), 2);
        assert_eq!(union.edges[0].members.len(), 2);

        let intersection =
            combine(&order, &records, &cols, &opts(MergeType::Intersection)).unwrap();
        assert_eq!(intersection.edges.len(), 1);
    }

    #[test]
    fn test_edges_of_unified_nodes_collapse_within_network() {
        let (order, records, cols) = session(vec![network(
            "A",
            &[("a1", json!("K")), ("a2", json!("K")), ("a3", json!("Y"))],
            &[("e1", "a1", "a3"), ("e2", "a2", "a3")],
        )]);
        let combined = combine(&order, &records, &cols, &opts(MergeType::Union)).unwrap();
        assert_eq!(combined.nodes.len(), 2);
        assert_eq!(combined.edges.len(), 1);
        assert_eq!(combined.edges[0].members.len(), 2);
    }

    #[test]
    fn test_intersection_edges() {
        let (order, records, cols) = session(vec![
            network(
                "A",
                &[("a1", json!("X")), ("a2", json!("Y")), ("a3", json!("Z"))],
                &[("ea1", "a1", "a2"), ("ea2", "a2", "a3")],
            ),
            network(
                "B",
                &[("b1", json!("X")), ("b2", json!("Y")), ("b3", json!("Z"))],
                &[("eb1", "b1", "b2"), ("eb2", "b1", "b3")],
            ),
        ]);
        let combined = combine(&order, &records, &cols, &opts(MergeType::Intersection)).unwrap();
        assert_eq!(combined.nodes.len(), 3);
        assert_eq!(combined.edges.len(), 1);
        assert_eq!(combined.edges[0].members.len(), 2);

        let only_nodes = MergeOptions {
            merge_only_nodes: true,
            ..opts(MergeType::Intersection)
        };
        let combined = combine(&order, &records, &cols, &only_nodes).unwrap();
        assert_eq!(combined.edges.len(), 3);
    }

    #[test]
    fn test_difference_drops_edges_to_removed_nodes() {
        let (order, records, cols) = session(vec![
            network(
                "A",
                &[("a1", json!("X")), ("a2", json!("Y")), ("a3", json!("W"))],
                &[("ea1", "a1", "a2"), ("ea2", "a1", "a3")],
            ),
            network("B", &[("b1", json!("Y"))], &[]),
        ]);
        let combined = combine(&order, &records, &cols, &opts(MergeType::Difference)).unwrap();
        assert_eq!(keys(&combined), vec!["X", "W"]);
        assert_eq!(combined.edges.len(), 1);
        assert_eq!(combined.edges[0].members[0].element, "ea2");
    }

    #[test]
    fn test_empty_order_rejected() {
        let err = combine(&[], &IndexMap::new(), &MatchingColumns::new(), &MergeOptions::default())
            .unwrap_err();
        assert!(matches!(err, MergeError::NoNetworks));
    }

    #[test]
    fn test_union_with_only_nodes_rejected() {
        let (order, records, cols) = session(vec![network("A", &[("a1", json!("X"))], &[])]);
        let options = MergeOptions {
            merge_only_nodes: true,
            ..opts(MergeType::Union)
        };
        let err = combine(&order, &records, &cols, &options).unwrap_err();
        assert!(matches!(err, MergeError::InvalidOptions(_)));
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let (order, records, cols) =
            session(vec![network("A", &[("a1", json!("X"))], &[("e", "a1", "nope")])]);
        let err = combine(&order, &records, &cols, &opts(MergeType::Union)).unwrap_err();
        assert!(matches!(err, MergeError::InvalidNetwork(_)));
    }

    #[test]
    fn test_resolve_attributes_base_wins() {
        let mut a = network("A", &[("a1", json!("K"))], &[]);
        let mut b = network("B", &[("b1", json!("K"))], &[]);
        for (rec, node, value) in [(&mut a, "a1", "x"), (&mut b, "b1", "y")] {
            rec.node_table.columns.push(Column::new("attr", ValueType::String));
            rec.node_table
                .rows
                .get_mut(node)
                .unwrap()
                .insert("attr".to_string(), json!(value));
        }
        let (order, records, cols) = session(vec![a, b]);
        let mut store = MatchingTableStore::new(TableKind::Node);
        store.add_networks(&order, &records, &cols).unwrap();
        let table = store.to_matching_table(&order);

        let combined = combine(&order, &records, &cols, &opts(MergeType::Union)).unwrap();
        let row = resolve_attributes(&combined.nodes[0].members, &table, &records);
        assert_eq!(row["attr"], json!("x"));
        assert_eq!(row["name"], json!("K"));
    }
}
