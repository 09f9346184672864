use facet::Facet;

use crate::{ImageGraphId, ImageId, NodeConfig, NodeId, NodeType};

/// Aggregate type discriminator carried on every wire event record.
pub const AGGREGATE_TYPE_IMAGE_GRAPH: &str = "image_graph";

/// Node lifecycle state.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum NodeState {
    Waiting,
    Generating,
    Generated,
}

impl NodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Waiting => "waiting",
            NodeState::Generating => "generating",
            NodeState::Generated => "generated",
        }
    }
}

/// Discriminator for every event variant emitted by the graph domain.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    NodeAdded,
    NodeRemoved,
    NodeCreated,
    NodeConfigSet,
    NodeNameSet,
    NodePreviewSet,
    NodePreviewUnset,
    NodeOutputConnected,
    NodeOutputDisconnected,
    NodeInputConnected,
    NodeInputDisconnected,
    NodeOutputImageSet,
    NodeOutputImageUnset,
    NodeInputImageSet,
    NodeInputImageUnset,
    NodeNeedsOutputs,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::NodeAdded => "node_added",
            EventKind::NodeRemoved => "node_removed",
            EventKind::NodeCreated => "node_created",
            EventKind::NodeConfigSet => "node_config_set",
            EventKind::NodeNameSet => "node_name_set",
            EventKind::NodePreviewSet => "node_preview_set",
            EventKind::NodePreviewUnset => "node_preview_unset",
            EventKind::NodeOutputConnected => "node_output_connected",
            EventKind::NodeOutputDisconnected => "node_output_disconnected",
            EventKind::NodeInputConnected => "node_input_connected",
            EventKind::NodeInputDisconnected => "node_input_disconnected",
            EventKind::NodeOutputImageSet => "node_output_image_set",
            EventKind::NodeOutputImageUnset => "node_output_image_unset",
            EventKind::NodeInputImageSet => "node_input_image_set",
            EventKind::NodeInputImageUnset => "node_input_image_unset",
            EventKind::NodeNeedsOutputs => "node_needs_outputs",
        }
    }
}

/// One input slot reference carried in a `node_needs_outputs` payload.
#[derive(Facet, Debug, Clone, PartialEq)]
pub struct InputImageRef {
    pub input_name: String,
    pub image_id: ImageId,
}

/// Flat wire form of one domain event, as persisted to the event log and
/// pushed to subscribers. Payload fields are populated per variant;
/// everything absent is omitted from the JSON.
#[derive(Facet, Debug, Clone, PartialEq)]
pub struct EventRecord {
    #[facet(rename = "type")]
    pub kind: EventKind,
    pub aggregate_id: ImageGraphId,
    pub aggregate_type: String,
    pub aggregate_version: u64,
    #[facet(skip_unless_truthy)]
    pub node_id: Option<NodeId>,
    #[facet(skip_unless_truthy)]
    pub node_version: Option<u64>,
    #[facet(skip_unless_truthy)]
    pub node_state: Option<NodeState>,
    pub timestamp_ms: i64,

    #[facet(skip_unless_truthy)]
    pub name: Option<String>,
    #[facet(skip_unless_truthy)]
    pub node_type: Option<NodeType>,
    #[facet(skip_unless_truthy)]
    pub config: Option<NodeConfig>,
    #[facet(skip_unless_truthy)]
    pub input_name: Option<String>,
    #[facet(skip_unless_truthy)]
    pub output_name: Option<String>,
    #[facet(skip_unless_truthy)]
    pub image_id: Option<ImageId>,
    #[facet(skip_unless_truthy)]
    pub from_node_id: Option<NodeId>,
    #[facet(skip_unless_truthy)]
    pub from_output_name: Option<String>,
    #[facet(skip_unless_truthy)]
    pub to_node_id: Option<NodeId>,
    #[facet(skip_unless_truthy)]
    pub to_input_name: Option<String>,
    #[facet(skip_unless_truthy)]
    pub inputs: Option<Vec<InputImageRef>>,
}

impl EventRecord {
    /// Record with only the aggregate attribution filled in; the emitter
    /// populates node attribution and payload fields.
    pub fn new(kind: EventKind, aggregate_id: ImageGraphId, aggregate_version: u64) -> Self {
        Self {
            kind,
            aggregate_id,
            aggregate_type: AGGREGATE_TYPE_IMAGE_GRAPH.to_string(),
            aggregate_version,
            node_id: None,
            node_version: None,
            node_state: None,
            timestamp_ms: 0,
            name: None,
            node_type: None,
            config: None,
            input_name: None,
            output_name: None,
            image_id: None,
            from_node_id: None,
            from_output_name: None,
            to_node_id: None,
            to_input_name: None,
            inputs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_json_omits_absent_payload_fields() {
        let mut record = EventRecord::new(EventKind::Created, ImageGraphId::generate(), 1);
        record.name = Some("demo".to_string());
        let json = facet_json::to_string(&record).expect("encode");
        assert!(json.contains("\"type\""), "missing type field: {json}");
        assert!(json.contains("created"), "missing kind tag: {json}");
        assert!(json.contains("image_graph"), "missing aggregate type: {json}");
        assert!(!json.contains("output_name"), "absent field leaked: {json}");
    }

    #[test]
    fn record_json_round_trips() {
        let mut record = EventRecord::new(
            EventKind::NodeOutputImageSet,
            ImageGraphId::generate(),
            7,
        );
        record.node_id = Some(NodeId::generate());
        record.node_version = Some(3);
        record.node_state = Some(NodeState::Generated);
        record.output_name = Some("resized".to_string());
        record.image_id = Some(ImageId::generate());
        record.timestamp_ms = 1_700_000_000_000;

        let json = facet_json::to_string(&record).expect("encode");
        let back: EventRecord = facet_json::from_str(&json).expect("decode");
        assert_eq!(back, record);
    }
}
