use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::common::unique_name;
use crate::errors::MergeError;
use crate::graph_io::{self, GraphFormat};
use crate::merge::{MergeSession, DEFAULT_OUTPUT_NAME};
use crate::network::NetworkId;
use crate::plan::{MergePlan, SourceConfig};
use crate::services::{
    layout_by_name, spawn_layout, DirectoryNetworkLoader, HttpNetworkLoader, NetworkLoader,
    Workspace,
};

/// Reads and parses a merge plan file
pub fn load_plan(plan_file_path: &Path) -> Result<MergePlan> {
    let content = fs::read_to_string(plan_file_path)
        .with_context(|| format!("Cannot read plan {}", plan_file_path.display()))?;
    let plan: MergePlan = serde_yaml::from_str(&content)?;
    debug!("Loaded plan with {} network(s)", plan.networks.len());
    Ok(plan)
}

fn create_loader(plan: &MergePlan, plan_file_path: &Path) -> Box<dyn NetworkLoader> {
    match &plan.source {
        SourceConfig::Directory { path } => {
            let parent_dir = plan_file_path.parent().unwrap_or(Path::new("."));
            Box::new(DirectoryNetworkLoader::new(parent_dir.join(path)))
        }
        SourceConfig::Http { base_url, token } => {
            Box::new(HttpNetworkLoader::new(base_url, token.clone()))
        }
    }
}

/// Merge the plan's networks into `workspace` and lay the result out
pub async fn run_merge(
    plan: &MergePlan,
    loader: &dyn NetworkLoader,
    workspace: &mut Workspace,
) -> Result<NetworkId> {
    if plan.networks.is_empty() {
        return Err(anyhow!("Plan lists no networks to merge"));
    }

    let existing = workspace.network_names();
    let default_name = unique_name(
        DEFAULT_OUTPUT_NAME,
        existing.iter().map(|(name, _)| name.as_str()),
    );
    let entries = plan
        .networks
        .iter()
        .map(|id| (id.clone(), id.clone()))
        .collect();
    let mut session = MergeSession::new(entries, Default::default(), default_name);
    for id in &plan.networks {
        session.toggle_available(id);
    }
    session.add_selected(loader).await?;

    session.set_merge_type(plan.merge.merge_type);
    session.set_merge_within_network(plan.merge.merge_within_network);
    session.set_merge_only_nodes(plan.merge.merge_only_nodes)?;
    for (network_id, column) in &plan.merge.matching_columns {
        session.set_matching_column(network_id, column.clone())?;
    }
    if let Some(name) = &plan.merge.output_name {
        session.set_output_name(&unique_name(
            name,
            existing.iter().map(|(name, _)| name.as_str()),
        ));
    }

    let network_id = session.merge(workspace)?;
    session.close();

    if let Some(layout_name) = &plan.layout {
        match layout_by_name(layout_name) {
            Some(engine) => {
                let network = workspace
                    .network(&network_id)
                    .ok_or_else(|| anyhow!("Merged network {} missing", network_id))?;
                let handle = spawn_layout(
                    engine,
                    &network_id,
                    network.nodes.clone(),
                    network.edges.clone(),
                );
                handle
                    .finish(workspace)
                    .await
                    .map_err(|e| MergeError::LayoutFailed(format!("{:#}", e)))?;
            }
            None => warn!("Unknown layout {}, leaving nodes unpositioned", layout_name),
        }
    }
    Ok(network_id)
}

/// Run a plan file end to end: load, merge, lay out, export
pub async fn execute_plan(plan_file: &str) -> Result<()> {
    let plan_file_path = Path::new(plan_file);
    let plan = load_plan(plan_file_path)?;
    let loader = create_loader(&plan, plan_file_path);

    let mut workspace = Workspace::new();
    let network_id = run_merge(&plan, loader.as_ref(), &mut workspace).await?;

    let merged = workspace
        .network_with_view(&network_id)
        .ok_or_else(|| anyhow!("Merged network {} missing", network_id))?;
    let format = plan
        .output
        .format
        .or_else(|| GraphFormat::detect(&plan.output.path))
        .unwrap_or_default();
    let parent_dir = plan_file_path.parent().unwrap_or(Path::new("."));
    let result =
        graph_io::export_network_with_view(&merged, parent_dir.join(&plan.output.path), format)?;
    info!(
        "Merged {} into {} ({})",
        plan.networks.join(", "),
        merged.network.name,
        result.output_paths.join(", ")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{MergeConfig, OutputConfig};

    fn write_networks(dir: &Path) {
        fs::write(dir.join("a_nodes.csv"), "id,name\na0,X\na1,Y\n").unwrap();
        fs::write(dir.join("a_edges.csv"), "source,target\na0,a1\n").unwrap();
        fs::write(dir.join("b_nodes.csv"), "id,name\nb0,Y\nb1,Z\n").unwrap();
        fs::write(dir.join("b_edges.csv"), "source,target\nb0,b1\n").unwrap();
    }

    fn plan(layout: Option<&str>) -> MergePlan {
        MergePlan {
            meta: None,
            source: SourceConfig::Directory {
                path: "networks".to_string(),
            },
            networks: vec!["a".to_string(), "b".to_string()],
            merge: MergeConfig::default(),
            layout: layout.map(str::to_string),
            output: OutputConfig {
                path: "out/merged.json".to_string(),
                format: None,
            },
        }
    }

    #[tokio::test]
    async fn test_run_merge_with_layout() {
        let dir = tempfile::tempdir().unwrap();
        write_networks(dir.path());
        let loader = DirectoryNetworkLoader::new(dir.path());
        let mut workspace = Workspace::new();

        let id = run_merge(&plan(Some("grid")), &loader, &mut workspace)
            .await
            .unwrap();
        assert_eq!(workspace.network(&id).unwrap().nodes.len(), 3);
        assert_eq!(workspace.view_model(&id).unwrap().unpositioned_count(), 0);
        assert_eq!(workspace.network(&id).unwrap().name, DEFAULT_OUTPUT_NAME);

        let second = run_merge(&plan(None), &loader, &mut workspace)
            .await
            .unwrap();
        assert_eq!(
            workspace.network(&second).unwrap().name,
            "Merged Network (2)"
        );
    }

    #[tokio::test]
    async fn test_execute_plan_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let networks = dir.path().join("networks");
        fs::create_dir_all(&networks).unwrap();
        write_networks(&networks);
        let plan_path = dir.path().join("plan.yaml");
        fs::write(&plan_path, serde_yaml::to_string(&plan(Some("circle"))).unwrap()).unwrap();

        execute_plan(plan_path.to_str().unwrap()).await.unwrap();
        let merged =
            graph_io::json_io::import_bundle(&dir.path().join("out").join("merged.json")).unwrap();
        assert_eq!(merged.network.nodes.len(), 3);
        assert_eq!(merged.network.edges.len(), 2);
    }

    #[tokio::test]
    async fn test_run_merge_rejects_union_only_nodes() {
        let dir = tempfile::tempdir().unwrap();
        write_networks(dir.path());
        let loader = DirectoryNetworkLoader::new(dir.path());
        let mut bad = plan(None);
        bad.merge.merge_only_nodes = true;
        let mut workspace = Workspace::new();
        assert!(run_merge(&bad, &loader, &mut workspace).await.is_err());
        assert!(workspace.network_ids().is_empty());
    }
}
