use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::graph_io::GraphFormat;
use crate::merge::{MergeType, DEFAULT_OUTPUT_NAME};
use crate::network::Column;

/// ## Structure
/// Data structures of a merge plan file.
///
/// ```text
/// MergePlan
///   ├── meta: Option<PlanMeta>
///   ├── source: SourceConfig
///   │   ├── Directory { path }
///   │   └── Http { base_url, token }
///   ├── networks: Vec<String>           (merge order, first is the base)
///   ├── merge: MergeConfig
///   │   ├── merge_type: union | intersection | difference
///   │   ├── merge_within_network: bool
///   │   ├── merge_only_nodes: bool
///   │   ├── output_name: Option<String>
///   │   └── matching_columns: network -> Column
///   ├── layout: Option<String>          (circle | grid)
///   └── output: OutputConfig
///       ├── path: String
///       └── format: Option<GraphFormat>
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MergePlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PlanMeta>,
    pub source: SourceConfig,
    pub networks: Vec<String>,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    pub output: OutputConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PlanMeta {
    pub name: Option<String>,
}

//
// Source networks
//

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// `<id>.json` bundles or `<id>_nodes.csv`/`<id>_edges.csv` pairs, relative to the plan
    Directory { path: String },
    /// Network data service
    Http {
        base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Directory {
            path: "networks".to_string(),
        }
    }
}

//
// Merge options
//

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MergeConfig {
    #[serde(default)]
    pub merge_type: MergeType,
    #[serde(default = "default_true")]
    pub merge_within_network: bool,
    #[serde(default)]
    pub merge_only_nodes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub matching_columns: IndexMap<String, Column>,
}

fn default_true() -> bool {
    true
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            merge_type: MergeType::Union,
            merge_within_network: true,
            merge_only_nodes: false,
            output_name: Some(DEFAULT_OUTPUT_NAME.to_string()),
            matching_columns: IndexMap::new(),
        }
    }
}

//
// Output
//

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OutputConfig {
    pub path: String,
    /// Detected from the path when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<GraphFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "out/merged.json".to_string(),
            format: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ValueType;

    #[test]
    fn test_default_plan_serialization() {
        let yaml_str = serde_yaml::to_string(&MergePlan::default()).unwrap();
        assert!(yaml_str.contains("directory"));
        assert!(yaml_str.contains("merge_type: union"));
        let plan: MergePlan = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(plan.merge, MergeConfig::default());
    }

    #[test]
    fn test_planfile_deserialization() {
        let yaml_str = r#"
meta:
  name: PPI merge
source:
  http:
    base_url: https://networks.example.org/v3
networks: [ppi-a, ppi-b]
merge:
  merge_type: intersection
  merge_only_nodes: true
  matching_columns:
    ppi-b:
      name: gene
      type: string
layout: grid
output:
  path: out/merged
  format: csv
"#;

        let plan: MergePlan = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(plan.networks, vec!["ppi-a", "ppi-b"]);
        assert_eq!(
            plan.source,
            SourceConfig::Http {
                base_url: "https://networks.example.org/v3".to_string(),
                token: None
            }
        );
        assert_eq!(plan.merge.merge_type, MergeType::Intersection);
        assert!(plan.merge.merge_within_network);
        assert!(plan.merge.output_name.is_none());
        assert_eq!(
            plan.merge.matching_columns["ppi-b"],
            Column::new("gene", ValueType::String)
        );
        assert_eq!(plan.output.format, Some(GraphFormat::Csv));
    }

    #[test]
    fn test_merge_section_is_optional() {
        let yaml_str = r#"
source:
  directory:
    path: data
networks: [a]
output:
  path: merged.json
"#;
        let plan: MergePlan = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(plan.merge, MergeConfig::default());
        assert!(plan.layout.is_none());
    }
}
