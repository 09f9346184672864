use facet::Facet;

use crate::{ImageGraphId, ImageId, NodeConfig, NodeId, NodeState, NodeType};

/// Deep-cloned serialisable form of one image graph. Doubles as the
/// persistence format (`graphs.snapshot`) and the read-model view served
/// over HTTP — neither shares any internal map with the live aggregate.
#[derive(Facet, Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub id: ImageGraphId,
    pub name: String,
    pub version: u64,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Facet, Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub node_type: NodeType,
    pub name: String,
    pub version: u64,
    pub state: NodeState,
    pub config: NodeConfig,
    #[facet(skip_unless_truthy)]
    pub preview: Option<ImageId>,
    pub inputs: Vec<InputSnapshot>,
    pub outputs: Vec<OutputSnapshot>,
}

#[derive(Facet, Debug, Clone, PartialEq)]
pub struct InputSnapshot {
    pub name: String,
    #[facet(skip_unless_truthy)]
    pub source_node_id: Option<NodeId>,
    #[facet(skip_unless_truthy)]
    pub source_output_name: Option<String>,
    #[facet(skip_unless_truthy)]
    pub image_id: Option<ImageId>,
}

#[derive(Facet, Debug, Clone, PartialEq)]
pub struct OutputSnapshot {
    pub name: String,
    #[facet(skip_unless_truthy)]
    pub image_id: Option<ImageId>,
    pub connections: Vec<ConnectionSnapshot>,
}

#[derive(Facet, Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    pub node_id: NodeId,
    pub input_name: String,
}

/// One row of the graph listing.
#[derive(Facet, Debug, Clone, PartialEq)]
pub struct GraphSummary {
    pub id: ImageGraphId,
    pub name: String,
    pub version: u64,
    pub node_count: u64,
}
