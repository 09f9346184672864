//! Domain events emitted by the aggregate.
//!
//! Every successful mutation appends events to the owning graph's pending
//! buffer in emission order; the aggregate version is bumped once per
//! event and node events additionally carry the node's post-event version
//! and state.

use halftone_types::{
    EventKind, EventRecord, ImageGraphId, ImageId, InputImageRef, NodeConfig, NodeId, NodeState,
    NodeType,
};

use crate::ports::PortName;

/// Node attribution stamped on node-scoped events.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStamp {
    pub id: NodeId,
    pub version: u64,
    pub state: NodeState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub graph_id: ImageGraphId,
    /// Aggregate version after applying this event.
    pub graph_version: u64,
    pub node: Option<NodeStamp>,
    pub body: EventBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    Created {
        name: String,
    },
    NodeAdded {
        node_id: NodeId,
    },
    NodeRemoved {
        node_id: NodeId,
    },
    NodeCreated {
        node_type: NodeType,
        name: String,
    },
    NodeConfigSet {
        config: NodeConfig,
    },
    NodeNameSet {
        name: String,
    },
    NodePreviewSet {
        image_id: ImageId,
    },
    NodePreviewUnset,
    NodeOutputConnected {
        output_name: PortName,
        to_node_id: NodeId,
        to_input_name: PortName,
    },
    NodeOutputDisconnected {
        output_name: PortName,
        to_node_id: NodeId,
        to_input_name: PortName,
    },
    NodeInputConnected {
        input_name: PortName,
        from_node_id: NodeId,
        from_output_name: PortName,
    },
    NodeInputDisconnected {
        input_name: PortName,
        from_node_id: NodeId,
        from_output_name: PortName,
    },
    NodeOutputImageSet {
        output_name: PortName,
        image_id: ImageId,
    },
    /// Carries the unset value so blob cleanup can act on it.
    NodeOutputImageUnset {
        output_name: PortName,
        image_id: ImageId,
    },
    NodeInputImageSet {
        input_name: PortName,
        image_id: ImageId,
    },
    /// Also carries the prior value, for the same reason as above.
    NodeInputImageUnset {
        input_name: PortName,
        image_id: ImageId,
    },
    /// Emitted exactly on Waiting → Generating: the node's inputs are all
    /// set and generation should run with this config and these images.
    NodeNeedsOutputs {
        config: NodeConfig,
        inputs: Vec<(PortName, ImageId)>,
    },
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::Created { .. } => EventKind::Created,
            EventBody::NodeAdded { .. } => EventKind::NodeAdded,
            EventBody::NodeRemoved { .. } => EventKind::NodeRemoved,
            EventBody::NodeCreated { .. } => EventKind::NodeCreated,
            EventBody::NodeConfigSet { .. } => EventKind::NodeConfigSet,
            EventBody::NodeNameSet { .. } => EventKind::NodeNameSet,
            EventBody::NodePreviewSet { .. } => EventKind::NodePreviewSet,
            EventBody::NodePreviewUnset => EventKind::NodePreviewUnset,
            EventBody::NodeOutputConnected { .. } => EventKind::NodeOutputConnected,
            EventBody::NodeOutputDisconnected { .. } => EventKind::NodeOutputDisconnected,
            EventBody::NodeInputConnected { .. } => EventKind::NodeInputConnected,
            EventBody::NodeInputDisconnected { .. } => EventKind::NodeInputDisconnected,
            EventBody::NodeOutputImageSet { .. } => EventKind::NodeOutputImageSet,
            EventBody::NodeOutputImageUnset { .. } => EventKind::NodeOutputImageUnset,
            EventBody::NodeInputImageSet { .. } => EventKind::NodeInputImageSet,
            EventBody::NodeInputImageUnset { .. } => EventKind::NodeInputImageUnset,
            EventBody::NodeNeedsOutputs { .. } => EventKind::NodeNeedsOutputs,
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }

    /// Flattens the event into its wire record.
    pub fn to_record(&self, timestamp_ms: i64) -> EventRecord {
        let mut record = EventRecord::new(self.kind(), self.graph_id.clone(), self.graph_version);
        record.timestamp_ms = timestamp_ms;
        if let Some(stamp) = &self.node {
            record.node_id = Some(stamp.id.clone());
            record.node_version = Some(stamp.version);
            record.node_state = Some(stamp.state);
        }
        match &self.body {
            EventBody::Created { name } => {
                record.name = Some(name.clone());
            }
            EventBody::NodeAdded { node_id } | EventBody::NodeRemoved { node_id } => {
                record.node_id = Some(node_id.clone());
            }
            EventBody::NodeCreated { node_type, name } => {
                record.node_type = Some(*node_type);
                record.name = Some(name.clone());
            }
            EventBody::NodeConfigSet { config } => {
                record.config = Some(config.clone());
            }
            EventBody::NodeNameSet { name } => {
                record.name = Some(name.clone());
            }
            EventBody::NodePreviewSet { image_id } => {
                record.image_id = Some(image_id.clone());
            }
            EventBody::NodePreviewUnset => {}
            EventBody::NodeOutputConnected {
                output_name,
                to_node_id,
                to_input_name,
            }
            | EventBody::NodeOutputDisconnected {
                output_name,
                to_node_id,
                to_input_name,
            } => {
                record.output_name = Some((*output_name).to_string());
                record.to_node_id = Some(to_node_id.clone());
                record.to_input_name = Some((*to_input_name).to_string());
            }
            EventBody::NodeInputConnected {
                input_name,
                from_node_id,
                from_output_name,
            }
            | EventBody::NodeInputDisconnected {
                input_name,
                from_node_id,
                from_output_name,
            } => {
                record.input_name = Some((*input_name).to_string());
                record.from_node_id = Some(from_node_id.clone());
                record.from_output_name = Some((*from_output_name).to_string());
            }
            EventBody::NodeOutputImageSet {
                output_name,
                image_id,
            }
            | EventBody::NodeOutputImageUnset {
                output_name,
                image_id,
            } => {
                record.output_name = Some((*output_name).to_string());
                record.image_id = Some(image_id.clone());
            }
            EventBody::NodeInputImageSet {
                input_name,
                image_id,
            }
            | EventBody::NodeInputImageUnset {
                input_name,
                image_id,
            } => {
                record.input_name = Some((*input_name).to_string());
                record.image_id = Some(image_id.clone());
            }
            EventBody::NodeNeedsOutputs { config, inputs } => {
                record.config = Some(config.clone());
                record.inputs = Some(
                    inputs
                        .iter()
                        .map(|(input_name, image_id)| InputImageRef {
                            input_name: (*input_name).to_string(),
                            image_id: image_id.clone(),
                        })
                        .collect(),
                );
            }
        }
        record
    }
}
