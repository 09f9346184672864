use facet::Facet;

use crate::{
    ConfigSchema, EventRecord, GraphSummary, ImageGraphId, ImageId, NodeConfig, NodeId,
};

#[derive(Facet, Debug, Clone)]
pub struct ApiError {
    pub error: String,
}

#[derive(Facet, Debug, Clone)]
pub struct CreateGraphRequest {
    pub name: String,
    /// Client-supplied id; generated server-side when absent.
    #[facet(skip_unless_truthy)]
    pub graph_id: Option<ImageGraphId>,
}

#[derive(Facet, Debug, Clone)]
pub struct CreateGraphResponse {
    pub graph_id: ImageGraphId,
    pub events: Vec<EventRecord>,
}

#[derive(Facet, Debug, Clone)]
pub struct AddNodeRequest {
    #[facet(skip_unless_truthy)]
    pub node_id: Option<NodeId>,
    pub name: String,
    /// Tagged by node type; the tag selects the node's type.
    pub config: NodeConfig,
}

#[derive(Facet, Debug, Clone)]
pub struct AddNodeResponse {
    pub node_id: NodeId,
    pub events: Vec<EventRecord>,
}

#[derive(Facet, Debug, Clone)]
pub struct ConnectRequest {
    pub from_node_id: NodeId,
    pub output_name: String,
    pub to_node_id: NodeId,
    pub input_name: String,
}

#[derive(Facet, Debug, Clone)]
pub struct SetConfigRequest {
    pub config: NodeConfig,
}

#[derive(Facet, Debug, Clone)]
pub struct SetNameRequest {
    pub name: String,
}

#[derive(Facet, Debug, Clone)]
pub struct SetPreviewRequest {
    pub image_id: ImageId,
}

#[derive(Facet, Debug, Clone)]
pub struct SetOutputImageRequest {
    pub image_id: ImageId,
}

/// Committed event records of one successful mutation, in emission order.
#[derive(Facet, Debug, Clone)]
pub struct MutationResponse {
    pub events: Vec<EventRecord>,
}

#[derive(Facet, Debug, Clone)]
pub struct UploadResponse {
    pub image_id: ImageId,
    pub events: Vec<EventRecord>,
}

#[derive(Facet, Debug, Clone)]
pub struct SchemaResponse {
    pub schemas: Vec<ConfigSchema>,
}

#[derive(Facet, Debug, Clone)]
pub struct GraphListResponse {
    pub graphs: Vec<GraphSummary>,
}
