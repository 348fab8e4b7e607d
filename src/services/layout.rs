use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::f64::consts::PI;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::workspace::Workspace;
use crate::network::{Edge, Node, Position, PositionMap};

/// Computes node positions for a network
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, nodes: &[Node], edges: &[Edge]) -> Result<PositionMap>;
}

/// Places nodes evenly on a circle
pub struct CircleLayout {
    pub radius_per_node: f64,
}

impl Default for CircleLayout {
    fn default() -> Self {
        Self {
            radius_per_node: 20.0,
        }
    }
}

#[async_trait]
impl LayoutEngine for CircleLayout {
    fn name(&self) -> &str {
        "circle"
    }

    async fn apply(&self, nodes: &[Node], _edges: &[Edge]) -> Result<PositionMap> {
        let count = nodes.len();
        let radius = self.radius_per_node * count as f64 / (2.0 * PI);
        Ok(nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let angle = 2.0 * PI * i as f64 / count.max(1) as f64;
                let position = Position {
                    x: radius * angle.cos(),
                    y: radius * angle.sin(),
                    z: None,
                };
                (node.id.clone(), position)
            })
            .collect())
    }
}

/// Places nodes row by row on a square grid
pub struct GridLayout {
    pub spacing: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self { spacing: 50.0 }
    }
}

#[async_trait]
impl LayoutEngine for GridLayout {
    fn name(&self) -> &str {
        "grid"
    }

    async fn apply(&self, nodes: &[Node], _edges: &[Edge]) -> Result<PositionMap> {
        if self.spacing <= 0.0 {
            return Err(anyhow!("grid spacing must be positive"));
        }
        let per_row = (nodes.len() as f64).sqrt().ceil().max(1.0) as usize;
        Ok(nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let position = Position {
                    x: (i % per_row) as f64 * self.spacing,
                    y: (i / per_row) as f64 * self.spacing,
                    z: None,
                };
                (node.id.clone(), position)
            })
            .collect())
    }
}

/// Layout engine by name, as used in merge plans
pub fn layout_by_name(name: &str) -> Option<Arc<dyn LayoutEngine>> {
    match name.to_lowercase().as_str() {
        "circle" => Some(Arc::new(CircleLayout::default())),
        "grid" => Some(Arc::new(GridLayout::default())),
        _ => None,
    }
}

/// Pending layout of a merged network
pub struct LayoutHandle {
    network_id: String,
    receiver: oneshot::Receiver<Result<PositionMap>>,
}

/// Run a layout in the background. The caller is not blocked.
pub fn spawn_layout(
    engine: Arc<dyn LayoutEngine>,
    network_id: &str,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
) -> LayoutHandle {
    let (sender, receiver) = oneshot::channel();
    let id = network_id.to_string();
    tokio::spawn(async move {
        debug!("Running {} layout for {}", engine.name(), id);
        let result = engine.apply(&nodes, &edges).await;
        if sender.send(result).is_err() {
            debug!("Layout result for {} discarded", id);
        }
    });
    LayoutHandle {
        network_id: network_id.to_string(),
        receiver,
    }
}

impl LayoutHandle {
    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// Wait for the layout and write the positions into the workspace.
    /// Returns false when the network was removed in the meantime.
    pub async fn finish(self, workspace: &mut Workspace) -> Result<bool> {
        let positions = self
            .receiver
            .await
            .map_err(|_| anyhow!("layout task for {} was dropped", self.network_id))??;

        if workspace.network(&self.network_id).is_none() {
            warn!(
                "Network {} is gone, discarding layout positions",
                self.network_id
            );
            return Ok(false);
        }
        let applied = workspace.update_node_positions(&self.network_id, &positions);
        if applied {
            info!(
                "Applied layout to {} ({} nodes)",
                self.network_id,
                positions.len()
            );
        }
        Ok(applied)
    }

    /// Drop the pending result without touching any workspace
    pub fn discard(self) {
        debug!("Discarding layout for {}", self.network_id);
    }
}
