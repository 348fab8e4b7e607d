use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type NetworkId = String;
pub type ElementId = String;

/// Attribute values of one table row, keyed by column name
pub type Row = IndexMap<String, Value>;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Long,
    Integer,
    Double,
    Boolean,
    ListOfString,
    ListOfLong,
    ListOfInteger,
    ListOfDouble,
    ListOfBoolean,
}

impl ValueType {
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            ValueType::ListOfString
                | ValueType::ListOfLong
                | ValueType::ListOfInteger
                | ValueType::ListOfDouble
                | ValueType::ListOfBoolean
        )
    }

    pub fn element_type(&self) -> ValueType {
        match self {
            ValueType::ListOfString => ValueType::String,
            ValueType::ListOfLong => ValueType::Long,
            ValueType::ListOfInteger => ValueType::Integer,
            ValueType::ListOfDouble => ValueType::Double,
            ValueType::ListOfBoolean => ValueType::Boolean,
            other => *other,
        }
    }

    pub fn list_of(element: ValueType) -> ValueType {
        match element {
            ValueType::String => ValueType::ListOfString,
            ValueType::Long => ValueType::ListOfLong,
            ValueType::Integer => ValueType::ListOfInteger,
            ValueType::Double => ValueType::ListOfDouble,
            ValueType::Boolean => ValueType::ListOfBoolean,
            list => list,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Long | ValueType::Integer | ValueType::Double)
    }

    /// Smallest type able to hold values of both `self` and `other`
    pub fn widen(self, other: ValueType) -> ValueType {
        if self == other {
            return self;
        }
        if self.is_list() && other.is_list() {
            return ValueType::list_of(self.element_type().widen(other.element_type()));
        }
        if self.is_list() || other.is_list() {
            return ValueType::String;
        }
        match (self, other) {
            (ValueType::Integer, ValueType::Long) | (ValueType::Long, ValueType::Integer) => {
                ValueType::Long
            }
            (a, b) if a.is_numeric() && b.is_numeric() => ValueType::Double,
            _ => ValueType::String,
        }
    }

    /// Convert a value into this type, or `Value::Null` when there is no sensible conversion
    pub fn coerce(&self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        if self.is_list() {
            let element = self.element_type();
            return match value {
                Value::Array(items) => {
                    Value::Array(items.iter().map(|v| element.coerce(v)).collect())
                }
                single => Value::Array(vec![element.coerce(single)]),
            };
        }
        match self {
            ValueType::String => match value {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            },
            ValueType::Long | ValueType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => value.clone(),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                Value::Bool(b) => Value::from(*b as i64),
                _ => Value::Null,
            },
            ValueType::Double => match value {
                Value::Number(n) => n.as_f64().map(Value::from).unwrap_or(Value::Null),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            ValueType::Boolean => match value {
                Value::Bool(_) => value.clone(),
                Value::String(s) => Value::Bool(crate::common::is_truthy(s)),
                _ => Value::Null,
            },
            _ => Value::Null,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

impl Column {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub id: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: IndexMap<ElementId, Row>,
}

impl Table {
    pub fn new(id: &str, columns: Vec<Column>) -> Self {
        Self {
            id: id.to_string(),
            columns,
            rows: IndexMap::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, column: &Column) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn get_value(&self, element_id: &str, column: &str) -> Option<&Value> {
        self.rows
            .get(element_id)
            .and_then(|row| row.get(column))
            .filter(|v| !v.is_null())
    }

    pub fn insert_row(&mut self, element_id: &str, row: Row) {
        self.rows.insert(element_id.to_string(), row);
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Node {
    pub id: ElementId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Edge {
    pub id: ElementId,
    pub source: ElementId,
    pub target: ElementId,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Network {
    pub id: NetworkId,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Network {
    pub fn stats(&self) -> String {
        format!("Nodes: {}, Edges: {}", self.nodes.len(), self.edges.len())
    }
}

/// Everything the merge needs from one source network
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NetworkRecord {
    pub network: Network,
    pub node_table: Table,
    pub edge_table: Table,
    pub net_table: Table,
}

/// Opaque visual style document; merges copy it from the base network unchanged
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct VisualStyle(pub Value);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

pub type PositionMap = IndexMap<ElementId, Position>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NodeView {
    pub id: ElementId,
    pub position: Option<Position>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EdgeView {
    pub id: ElementId,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NetworkView {
    pub network_id: NetworkId,
    pub node_views: IndexMap<ElementId, NodeView>,
    pub edge_views: IndexMap<ElementId, EdgeView>,
}

impl NetworkView {
    pub fn unpositioned(network: &Network) -> Self {
        Self {
            network_id: network.id.clone(),
            node_views: network
                .nodes
                .iter()
                .map(|n| {
                    (
                        n.id.clone(),
                        NodeView {
                            id: n.id.clone(),
                            position: None,
                        },
                    )
                })
                .collect(),
            edge_views: network
                .edges
                .iter()
                .map(|e| (e.id.clone(), EdgeView { id: e.id.clone() }))
                .collect(),
        }
    }

    /// Number of node views without a position yet
    pub fn unpositioned_count(&self) -> usize {
        self.node_views
            .values()
            .filter(|v| v.position.is_none())
            .count()
    }
}

/// Network as returned by the network data service
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LoadedNetwork {
    pub network: Network,
    pub node_table: Table,
    pub edge_table: Table,
    #[serde(default)]
    pub net_table: Table,
    #[serde(default)]
    pub visual_style: VisualStyle,
}

impl LoadedNetwork {
    pub fn into_parts(self) -> (NetworkRecord, VisualStyle) {
        (
            NetworkRecord {
                network: self.network,
                node_table: self.node_table,
                edge_table: self.edge_table,
                net_table: self.net_table,
            },
            self.visual_style,
        )
    }
}

/// Complete output of a merge, ready to be pushed into a workspace
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NetworkWithView {
    pub network: Network,
    pub node_table: Table,
    pub edge_table: Table,
    pub net_table: Table,
    pub visual_style: VisualStyle,
    pub network_views: Vec<NetworkView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_widen_numeric_types() {
        assert_eq!(ValueType::Integer.widen(ValueType::Long), ValueType::Long);
        assert_eq!(ValueType::Long.widen(ValueType::Double), ValueType::Double);
        assert_eq!(ValueType::Boolean.widen(ValueType::Double), ValueType::String);
        assert_eq!(ValueType::String.widen(ValueType::String), ValueType::String);
    }

    #[test]
    fn test_widen_lists() {
        assert_eq!(
            ValueType::ListOfInteger.widen(ValueType::ListOfDouble),
            ValueType::ListOfDouble
        );
        assert_eq!(
            ValueType::ListOfInteger.widen(ValueType::Integer),
            ValueType::String
        );
    }

    #[test]
    fn test_coerce_values() {
        assert_eq!(ValueType::String.coerce(&json!(3)), json!("3"));
        assert_eq!(ValueType::Double.coerce(&json!(3)), json!(3.0));
        assert_eq!(ValueType::Long.coerce(&json!("42")), json!(42));
        assert_eq!(ValueType::Long.coerce(&json!("x")), Value::Null);
        assert_eq!(ValueType::Boolean.coerce(&json!("yes")), json!(true));
        assert_eq!(
            ValueType::ListOfString.coerce(&json!(["a", 1])),
            json!(["a", "1"])
        );
    }

    #[test]
    fn test_column_serialization_uses_type_key() {
        let column = Column::new("name", ValueType::String);
        let value = serde_json::to_value(&column).unwrap();
        assert_eq!(value, json!({"name": "name", "type": "string"}));
    }

    #[test]
    fn test_table_get_value_skips_null() {
        let mut table = Table::new("nodes", vec![Column::new("name", ValueType::String)]);
        let mut row = Row::new();
        row.insert("name".to_string(), Value::Null);
        table.insert_row("n1", row);
        assert!(table.get_value("n1", "name").is_none());
        assert!(table.get_value("missing", "name").is_none());
    }

    #[test]
    fn test_unpositioned_view() {
        let network = Network {
            id: "net".to_string(),
            name: "Net".to_string(),
            nodes: vec![Node { id: "0".to_string() }, Node { id: "1".to_string() }],
            edges: vec![Edge {
                id: "e0".to_string(),
                source: "0".to_string(),
                target: "1".to_string(),
            }],
        };
        let view = NetworkView::unpositioned(&network);
        assert_eq!(view.node_views.len(), 2);
        assert_eq!(view.edge_views.len(), 1);
        assert_eq!(view.unpositioned_count(), 2);
    }
}
