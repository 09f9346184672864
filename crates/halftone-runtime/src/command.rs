use halftone_engine::GraphError;
use halftone_types::{ImageGraphId, ImageId, NodeConfig, NodeId, NodeType};
use thiserror::Error;

use crate::store::StoreError;

/// External mutation surface. One record per operation, carrying the
/// identifiers and payloads the aggregate methods need.
#[derive(Debug, Clone)]
pub enum Command {
    CreateImageGraph {
        graph_id: ImageGraphId,
        name: String,
    },
    AddImageGraphNode {
        graph_id: ImageGraphId,
        node_id: NodeId,
        node_type: NodeType,
        name: String,
        config: NodeConfig,
    },
    RemoveImageGraphNode {
        graph_id: ImageGraphId,
        node_id: NodeId,
    },
    ConnectImageGraphNodes {
        graph_id: ImageGraphId,
        from_node_id: NodeId,
        output_name: String,
        to_node_id: NodeId,
        input_name: String,
    },
    DisconnectImageGraphNodes {
        graph_id: ImageGraphId,
        from_node_id: NodeId,
        output_name: String,
        to_node_id: NodeId,
        input_name: String,
    },
    SetImageGraphNodeOutputImage {
        graph_id: ImageGraphId,
        node_id: NodeId,
        output_name: String,
        image_id: ImageId,
    },
    UnsetImageGraphNodeOutputImage {
        graph_id: ImageGraphId,
        node_id: NodeId,
        output_name: String,
    },
    SetImageGraphNodePreview {
        graph_id: ImageGraphId,
        node_id: NodeId,
        image_id: ImageId,
    },
    UnsetImageGraphNodePreview {
        graph_id: ImageGraphId,
        node_id: NodeId,
    },
    SetImageGraphNodeConfig {
        graph_id: ImageGraphId,
        node_id: NodeId,
        config: NodeConfig,
    },
    SetImageGraphNodeName {
        graph_id: ImageGraphId,
        node_id: NodeId,
        name: String,
    },
    /// Pushes a freshly set output image to every downstream input.
    /// Dispatched by the propagation handler, never by clients.
    PropagateOutputImage {
        graph_id: ImageGraphId,
        node_id: NodeId,
        output_name: String,
        image_id: ImageId,
    },
    /// The unset side of propagation: clears every downstream input fed
    /// by this output.
    PropagateOutputUnset {
        graph_id: ImageGraphId,
        node_id: NodeId,
        output_name: String,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateImageGraph { .. } => "create_image_graph",
            Command::AddImageGraphNode { .. } => "add_image_graph_node",
            Command::RemoveImageGraphNode { .. } => "remove_image_graph_node",
            Command::ConnectImageGraphNodes { .. } => "connect_image_graph_nodes",
            Command::DisconnectImageGraphNodes { .. } => "disconnect_image_graph_nodes",
            Command::SetImageGraphNodeOutputImage { .. } => "set_image_graph_node_output_image",
            Command::UnsetImageGraphNodeOutputImage { .. } => {
                "unset_image_graph_node_output_image"
            }
            Command::SetImageGraphNodePreview { .. } => "set_image_graph_node_preview",
            Command::UnsetImageGraphNodePreview { .. } => "unset_image_graph_node_preview",
            Command::SetImageGraphNodeConfig { .. } => "set_image_graph_node_config",
            Command::SetImageGraphNodeName { .. } => "set_image_graph_node_name",
            Command::PropagateOutputImage { .. } => "propagate_output_image",
            Command::PropagateOutputUnset { .. } => "propagate_output_unset",
        }
    }

    pub fn graph_id(&self) -> &ImageGraphId {
        match self {
            Command::CreateImageGraph { graph_id, .. }
            | Command::AddImageGraphNode { graph_id, .. }
            | Command::RemoveImageGraphNode { graph_id, .. }
            | Command::ConnectImageGraphNodes { graph_id, .. }
            | Command::DisconnectImageGraphNodes { graph_id, .. }
            | Command::SetImageGraphNodeOutputImage { graph_id, .. }
            | Command::UnsetImageGraphNodeOutputImage { graph_id, .. }
            | Command::SetImageGraphNodePreview { graph_id, .. }
            | Command::UnsetImageGraphNodePreview { graph_id, .. }
            | Command::SetImageGraphNodeConfig { graph_id, .. }
            | Command::SetImageGraphNodeName { graph_id, .. }
            | Command::PropagateOutputImage { graph_id, .. }
            | Command::PropagateOutputUnset { graph_id, .. } => graph_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("command {0} exceeded its deadline and was cancelled")]
    Cancelled(&'static str),
}
