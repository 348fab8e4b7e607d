use indexmap::IndexMap;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::column_matcher::MatchingColumns;
use super::engine::{combine, resolve_attributes, Member, MergeOptions};
use super::matching_table::{MatchingTable, TableKind};
use crate::errors::{MergeError, MergeResult};
use crate::network::{
    Column, Edge, Network, NetworkId, NetworkRecord, NetworkView, NetworkWithView, Node, Row,
    Table, ValueType, VisualStyle,
};

pub const NAME_COLUMN: &str = "name";

/// Inputs of a merge, borrowed from the session that owns them
pub struct MergeContext<'a> {
    pub order: &'a [NetworkId],
    pub name: &'a str,
    pub records: &'a IndexMap<NetworkId, NetworkRecord>,
    pub node_table: &'a MatchingTable,
    pub edge_table: &'a MatchingTable,
    pub net_table: &'a MatchingTable,
    pub matching_columns: &'a MatchingColumns,
    pub base_style: Option<&'a VisualStyle>,
    pub options: MergeOptions,
}

impl MergeContext<'_> {
    fn validate(&self) -> MergeResult<()> {
        if self.order.is_empty() {
            return Err(MergeError::NoNetworks);
        }
        for (table, kind) in [
            (self.node_table, TableKind::Node),
            (self.edge_table, TableKind::Edge),
            (self.net_table, TableKind::Network),
        ] {
            if table.kind() != kind {
                return Err(MergeError::InconsistentMatchingTable(format!(
                    "expected a {} table, got a {} table",
                    kind.label(),
                    table.kind().label()
                )));
            }
            table.validate(self.order, self.records)?;
        }

        let matching = self.node_table.matching_column();
        for id in self.order {
            let column = self.matching_columns.get(id).ok_or_else(|| {
                MergeError::MissingMatchingColumn {
                    network: id.clone(),
                    column: String::new(),
                }
            })?;
            let source = matching.and_then(|m| m.sources.get(id));
            if source != Some(&column.name) {
                return Err(MergeError::InconsistentMatchingTable(format!(
                    "matching row of network {} does not use column {}",
                    id, column.name
                )));
            }
        }
        Ok(())
    }
}

/// Build the merged network, its tables, style and an unpositioned view
pub fn create_merged_network_with_view(ctx: &MergeContext<'_>) -> MergeResult<NetworkWithView> {
    ctx.validate()?;
    let combined = combine(ctx.order, ctx.records, ctx.matching_columns, &ctx.options)?;

    let network_id = Uuid::new_v4().to_string();

    let mut node_table = Table::new(
        &format!("{}-nodes", network_id),
        ctx.node_table.output_columns(),
    );
    let mut nodes = Vec::with_capacity(combined.nodes.len());
    for (idx, merged) in combined.nodes.iter().enumerate() {
        let id = idx.to_string();
        let row = resolve_attributes(&merged.members, ctx.node_table, ctx.records);
        node_table.insert_row(&id, row);
        nodes.push(Node { id });
    }

    let mut edge_table = Table::new(
        &format!("{}-edges", network_id),
        ctx.edge_table.output_columns(),
    );
    let mut edges = Vec::with_capacity(combined.edges.len());
    for (idx, merged) in combined.edges.iter().enumerate() {
        let id = format!("e{}", idx);
        let row = resolve_attributes(&merged.members, ctx.edge_table, ctx.records);
        edge_table.insert_row(&id, row);
        edges.push(Edge {
            id,
            source: nodes[merged.source].id.clone(),
            target: nodes[merged.target].id.clone(),
        });
    }

    let net_table = build_net_table(ctx, &network_id);

    let network = Network {
        id: network_id,
        name: ctx.name.to_string(),
        nodes,
        edges,
    };

    let visual_style = match ctx.base_style {
        Some(style) => style.clone(),
        None => {
            warn!("No visual style for base network {}, using default", ctx.order[0]);
            VisualStyle::default()
        }
    };

    let view = NetworkView::unpositioned(&network);
    info!("Created merged network {} ({})", network.name, network.stats());

    Ok(NetworkWithView {
        network,
        node_table,
        edge_table,
        net_table,
        visual_style,
        network_views: vec![view],
    })
}

/// One-row network table; the merged network's name replaces any source name
fn build_net_table(ctx: &MergeContext<'_>, network_id: &str) -> Table {
    let mut columns = ctx.net_table.output_columns();
    if !columns.iter().any(|c| c.name == NAME_COLUMN) {
        columns.insert(0, Column::new(NAME_COLUMN, ValueType::String));
    }

    let members: Vec<Member> = ctx
        .order
        .iter()
        .filter_map(|id| {
            let record = ctx.records.get(id)?;
            let element = record.net_table.rows.keys().next()?;
            Some(Member {
                network: id.clone(),
                element: element.clone(),
            })
        })
        .collect();

    let mut row = resolve_attributes(&members, ctx.net_table, ctx.records);
    let name_column = columns
        .iter()
        .find(|c| c.name == NAME_COLUMN)
        .map(|c| c.value_type)
        .unwrap_or(ValueType::String);
    row.insert(
        NAME_COLUMN.to_string(),
        name_column.coerce(&Value::String(ctx.name.to_string())),
    );
    let mut ordered = Row::new();
    for column in &columns {
        let value = row.get(&column.name).cloned().unwrap_or(Value::Null);
        ordered.insert(column.name.clone(), value);
    }

    let mut table = Table::new(&format!("{}-network", network_id), columns);
    table.insert_row(network_id, ordered);
    table
}
