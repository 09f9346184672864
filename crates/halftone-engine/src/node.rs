//! Node entity and state machine.
//!
//! A node starts Waiting, moves to Generating once every input is
//! connected with an image, and to Generated once every output slot is
//! populated. Losing an input image or connection knocks it back to
//! Waiting and clears its outputs. Operations return their emitted
//! events in order; the owning graph stamps aggregate versions.

use std::collections::{BTreeMap, BTreeSet};

use halftone_types::{
    ImageId, InputSnapshot, NodeConfig, NodeId, NodeSnapshot, NodeState, NodeType, OutputSnapshot,
};

use crate::error::GraphError;
use crate::events::EventBody;
use crate::ports::{Input, InputSource, Output, OutputTarget, PortName};
use crate::registry;

/// Event emitted by a node operation, already stamped with the node's
/// post-event version and state.
#[derive(Debug)]
pub(crate) struct NodeEvent {
    pub node_id: NodeId,
    pub node_version: u64,
    pub state: NodeState,
    pub body: EventBody,
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    node_type: NodeType,
    name: String,
    version: u64,
    state: NodeState,
    config: NodeConfig,
    preview: Option<ImageId>,
    inputs: BTreeMap<PortName, Input>,
    outputs: BTreeMap<PortName, Output>,
}

impl Node {
    pub(crate) fn new(
        node_type: NodeType,
        id: NodeId,
        name: &str,
    ) -> Result<(Node, Vec<NodeEvent>), GraphError> {
        if id.is_nil() {
            return Err(GraphError::validation("node id must be non-nil"));
        }
        let spec = registry::spec(node_type);
        if spec.name_required && name.is_empty() {
            return Err(GraphError::validation(format!(
                "{node_type} nodes require a name"
            )));
        }
        let mut node = Node {
            id,
            node_type,
            name: name.to_string(),
            version: 0,
            state: NodeState::Waiting,
            config: node_type.default_config(),
            preview: None,
            inputs: spec
                .inputs
                .iter()
                .map(|port| (*port, Input::new(port)))
                .collect(),
            outputs: spec
                .outputs
                .iter()
                .map(|port| (*port, Output::new(port)))
                .collect(),
        };
        let mut events = Vec::new();
        node.emit(
            &mut events,
            EventBody::NodeCreated {
                node_type,
                name: name.to_string(),
            },
        );
        Ok((node, events))
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn preview(&self) -> Option<&ImageId> {
        self.preview.as_ref()
    }

    pub fn input(&self, name: &str) -> Result<&Input, GraphError> {
        self.inputs.get(name).ok_or_else(|| {
            GraphError::not_found(format!("node {} has no input {name:?}", self.id))
        })
    }

    pub fn output(&self, name: &str) -> Result<&Output, GraphError> {
        self.outputs.get(name).ok_or_else(|| {
            GraphError::not_found(format!("node {} has no output {name:?}", self.id))
        })
    }

    /// Inputs in registry order.
    pub fn inputs(&self) -> impl Iterator<Item = &Input> {
        registry::spec(self.node_type)
            .inputs
            .iter()
            .filter_map(|port| self.inputs.get(port))
    }

    /// Outputs in registry order.
    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        registry::spec(self.node_type)
            .outputs
            .iter()
            .filter_map(|port| self.outputs.get(port))
    }

    pub fn all_inputs_set(&self) -> bool {
        self.inputs.values().all(Input::is_set)
    }

    pub fn all_outputs_set(&self) -> bool {
        self.outputs.values().all(|output| output.image().is_some())
    }

    // ── Internal plumbing ───────────────────────────────────────────

    fn input_mut(&mut self, name: &str) -> Result<&mut Input, GraphError> {
        let id = self.id.clone();
        self.inputs
            .get_mut(name)
            .ok_or_else(|| GraphError::not_found(format!("node {id} has no input {name:?}")))
    }

    fn output_mut(&mut self, name: &str) -> Result<&mut Output, GraphError> {
        let id = self.id.clone();
        self.outputs
            .get_mut(name)
            .ok_or_else(|| GraphError::not_found(format!("node {id} has no output {name:?}")))
    }

    fn emit(&mut self, out: &mut Vec<NodeEvent>, body: EventBody) {
        self.version += 1;
        out.push(NodeEvent {
            node_id: self.id.clone(),
            node_version: self.version,
            state: self.state,
            body,
        });
    }

    fn transition(&mut self, to: NodeState) -> Result<(), GraphError> {
        let legal = matches!(
            (self.state, to),
            (NodeState::Waiting, NodeState::Generating)
                | (NodeState::Generating, NodeState::Generated)
                | (NodeState::Generating, NodeState::Waiting)
                | (NodeState::Generated, NodeState::Waiting)
        );
        if !legal {
            return Err(GraphError::conflict(format!(
                "node {} cannot move from {} to {}",
                self.id,
                self.state.as_str(),
                to.as_str()
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Waiting → Generating once every input is connected and populated.
    /// No-op in every other state.
    fn trigger_outputs_if_ready(&mut self, events: &mut Vec<NodeEvent>) {
        if self.state != NodeState::Waiting || !self.all_inputs_set() {
            return;
        }
        self.state = NodeState::Generating;
        let inputs: Vec<(PortName, ImageId)> = registry::spec(self.node_type)
            .inputs
            .iter()
            .filter_map(|port| {
                self.inputs
                    .get(port)
                    .and_then(|input| input.image().cloned().map(|image| (*port, image)))
            })
            .collect();
        self.emit(
            events,
            EventBody::NodeNeedsOutputs {
                config: self.config.clone(),
                inputs,
            },
        );
    }

    /// Clears every populated output slot, emitting one unset per image.
    fn reset_output_images(&mut self, events: &mut Vec<NodeEvent>) {
        let ports: Vec<PortName> = registry::spec(self.node_type).outputs.to_vec();
        for port in ports {
            let image = match self.outputs.get_mut(port) {
                Some(output) => output.unset_image(),
                None => None,
            };
            if let Some(image) = image {
                self.emit(
                    events,
                    EventBody::NodeOutputImageUnset {
                        output_name: port,
                        image_id: image,
                    },
                );
            }
        }
    }

    /// Shared tail for input loss: fully-set nodes fall back to Waiting,
    /// dropping derived outputs and the preview.
    fn reset_after_input_loss(
        &mut self,
        was_set: bool,
        clear_preview: bool,
        events: &mut Vec<NodeEvent>,
    ) -> Result<(), GraphError> {
        if !was_set {
            return Ok(());
        }
        self.transition(NodeState::Waiting)?;
        self.reset_output_images(events);
        if clear_preview && self.preview.take().is_some() {
            self.emit(events, EventBody::NodePreviewUnset);
        }
        Ok(())
    }

    // ── Operations ──────────────────────────────────────────────────

    pub(crate) fn set_config(&mut self, config: NodeConfig) -> Result<Vec<NodeEvent>, GraphError> {
        if config.node_type() != self.node_type {
            return Err(GraphError::validation(format!(
                "config is for {} but node {} is {}",
                config.node_type(),
                self.id,
                self.node_type
            )));
        }
        config.validate()?;
        self.config = config.clone();
        let mut events = Vec::new();
        self.emit(&mut events, EventBody::NodeConfigSet { config });
        self.trigger_outputs_if_ready(&mut events);
        Ok(events)
    }

    pub(crate) fn set_name(&mut self, name: &str) -> Result<Vec<NodeEvent>, GraphError> {
        if registry::spec(self.node_type).name_required && name.is_empty() {
            return Err(GraphError::validation(format!(
                "{} nodes require a name",
                self.node_type
            )));
        }
        self.name = name.to_string();
        let mut events = Vec::new();
        self.emit(
            &mut events,
            EventBody::NodeNameSet {
                name: name.to_string(),
            },
        );
        Ok(events)
    }

    pub(crate) fn set_preview(&mut self, image: ImageId) -> Result<Vec<NodeEvent>, GraphError> {
        if image.is_nil() {
            return Err(GraphError::validation("preview image must be non-nil"));
        }
        self.preview = Some(image.clone());
        let mut events = Vec::new();
        self.emit(&mut events, EventBody::NodePreviewSet { image_id: image });
        Ok(events)
    }

    pub(crate) fn unset_preview(&mut self) -> Vec<NodeEvent> {
        self.preview = None;
        let mut events = Vec::new();
        self.emit(&mut events, EventBody::NodePreviewUnset);
        events
    }

    pub(crate) fn connect_output_to(
        &mut self,
        output_name: &str,
        target: OutputTarget,
    ) -> Result<Vec<NodeEvent>, GraphError> {
        let output = self.output_mut(output_name)?;
        let port = output.name();
        output.connect(target.clone())?;
        let mut events = Vec::new();
        self.emit(
            &mut events,
            EventBody::NodeOutputConnected {
                output_name: port,
                to_node_id: target.node_id,
                to_input_name: target.input_name,
            },
        );
        Ok(events)
    }

    pub(crate) fn disconnect_output(
        &mut self,
        output_name: &str,
        target: &OutputTarget,
    ) -> Result<Vec<NodeEvent>, GraphError> {
        let output = self.output_mut(output_name)?;
        let port = output.name();
        output.disconnect(target)?;
        let mut events = Vec::new();
        self.emit(
            &mut events,
            EventBody::NodeOutputDisconnected {
                output_name: port,
                to_node_id: target.node_id.clone(),
                to_input_name: target.input_name,
            },
        );
        Ok(events)
    }

    pub(crate) fn connect_input_from(
        &mut self,
        input_name: &str,
        source: InputSource,
    ) -> Result<Vec<NodeEvent>, GraphError> {
        let input = self.input_mut(input_name)?;
        let port = input.name();
        input.connect(source.clone())?;
        let mut events = Vec::new();
        self.emit(
            &mut events,
            EventBody::NodeInputConnected {
                input_name: port,
                from_node_id: source.node_id,
                from_output_name: source.output_name,
            },
        );
        Ok(events)
    }

    /// Severs the input, dropping its image and — when the node was fully
    /// set — its derived outputs and preview. Returns the prior source so
    /// the aggregate can release the upstream endpoint.
    pub(crate) fn disconnect_input(
        &mut self,
        input_name: &str,
    ) -> Result<(InputSource, Vec<NodeEvent>), GraphError> {
        let was_set = self.all_inputs_set();
        let (port, source) = {
            let input = self.input_mut(input_name)?;
            (input.name(), input.disconnect()?)
        };
        let mut events = Vec::new();
        self.emit(
            &mut events,
            EventBody::NodeInputDisconnected {
                input_name: port,
                from_node_id: source.node_id.clone(),
                from_output_name: source.output_name,
            },
        );
        let image = match self.inputs.get_mut(port) {
            Some(input) => input.unset_image(),
            None => None,
        };
        if let Some(image) = image {
            self.emit(
                &mut events,
                EventBody::NodeInputImageUnset {
                    input_name: port,
                    image_id: image,
                },
            );
        }
        self.reset_after_input_loss(was_set, true, &mut events)?;
        Ok((source, events))
    }

    pub(crate) fn set_input_image(
        &mut self,
        input_name: &str,
        image: ImageId,
    ) -> Result<Vec<NodeEvent>, GraphError> {
        let port = {
            let input = self.input_mut(input_name)?;
            input.set_image(image.clone())?;
            input.name()
        };
        let mut events = Vec::new();
        self.emit(
            &mut events,
            EventBody::NodeInputImageSet {
                input_name: port,
                image_id: image,
            },
        );
        self.trigger_outputs_if_ready(&mut events);
        Ok(events)
    }

    pub(crate) fn unset_input_image(
        &mut self,
        input_name: &str,
    ) -> Result<Vec<NodeEvent>, GraphError> {
        let was_set = self.all_inputs_set();
        let (port, image) = {
            let input = self.input_mut(input_name)?;
            (input.name(), input.unset_image())
        };
        let mut events = Vec::new();
        if let Some(image) = image {
            self.emit(
                &mut events,
                EventBody::NodeInputImageUnset {
                    input_name: port,
                    image_id: image,
                },
            );
        }
        self.reset_after_input_loss(was_set, false, &mut events)?;
        Ok(events)
    }

    pub(crate) fn set_output_image(
        &mut self,
        output_name: &str,
        image: ImageId,
    ) -> Result<Vec<NodeEvent>, GraphError> {
        let port = self.output(output_name)?.name();
        let completes = self
            .outputs
            .iter()
            .all(|(name, output)| *name == port || output.image().is_some());
        if completes && self.state == NodeState::Waiting {
            return Err(GraphError::conflict(format!(
                "node {} cannot move from waiting to generated",
                self.id
            )));
        }
        self.output_mut(output_name)?.set_image(image.clone())?;
        if completes && self.state == NodeState::Generating {
            self.transition(NodeState::Generated)?;
        }
        let mut events = Vec::new();
        self.emit(
            &mut events,
            EventBody::NodeOutputImageSet {
                output_name: port,
                image_id: image,
            },
        );
        Ok(events)
    }

    /// Clears one output slot; emits only when an image was present.
    pub(crate) fn unset_output_image(
        &mut self,
        output_name: &str,
    ) -> Result<Vec<NodeEvent>, GraphError> {
        let (port, image) = {
            let output = self.output_mut(output_name)?;
            (output.name(), output.unset_image())
        };
        let mut events = Vec::new();
        if let Some(image) = image {
            self.emit(
                &mut events,
                EventBody::NodeOutputImageUnset {
                    output_name: port,
                    image_id: image,
                },
            );
        }
        Ok(events)
    }

    // ── Snapshots ───────────────────────────────────────────────────

    pub(crate) fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id.clone(),
            node_type: self.node_type,
            name: self.name.clone(),
            version: self.version,
            state: self.state,
            config: self.config.clone(),
            preview: self.preview.clone(),
            inputs: self
                .inputs()
                .map(|input| InputSnapshot {
                    name: input.name().to_string(),
                    source_node_id: input.source().map(|source| source.node_id.clone()),
                    source_output_name: input
                        .source()
                        .map(|source| source.output_name.to_string()),
                    image_id: input.image().cloned(),
                })
                .collect(),
            outputs: self
                .outputs()
                .map(|output| OutputSnapshot {
                    name: output.name().to_string(),
                    image_id: output.image().cloned(),
                    connections: output
                        .connections()
                        .map(|target| halftone_types::ConnectionSnapshot {
                            node_id: target.node_id.clone(),
                            input_name: target.input_name.to_string(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub(crate) fn restore(snapshot: NodeSnapshot) -> Result<Node, GraphError> {
        if snapshot.id.is_nil() {
            return Err(GraphError::validation(
                "invariant violated: stored node has a nil id",
            ));
        }
        let spec = registry::spec(snapshot.node_type);
        if snapshot.config.node_type() != snapshot.node_type {
            return Err(GraphError::validation(format!(
                "invariant violated: stored node {} is {} but carries a {} config",
                snapshot.id,
                snapshot.node_type,
                snapshot.config.node_type()
            )));
        }

        let mut inputs: BTreeMap<PortName, Input> = BTreeMap::new();
        for stored in snapshot.inputs {
            let port = spec.input_name(&stored.name).ok_or_else(|| {
                GraphError::validation(format!(
                    "invariant violated: stored node {} has unknown input {:?}",
                    snapshot.id, stored.name
                ))
            })?;
            let source = match (stored.source_node_id, stored.source_output_name) {
                (Some(node_id), Some(output_name)) => Some(InputSource {
                    node_id,
                    // upstream port names are validated when the owning
                    // graph re-checks connection pairing
                    output_name: canonical_port(&output_name)?,
                }),
                (None, None) => None,
                _ => {
                    return Err(GraphError::validation(format!(
                        "invariant violated: stored input {:?} of node {} has a partial source",
                        stored.name, snapshot.id
                    )));
                }
            };
            inputs.insert(port, Input::restore(port, source, stored.image_id));
        }
        for port in spec.inputs {
            if !inputs.contains_key(port) {
                inputs.insert(port, Input::new(port));
            }
        }

        let mut outputs: BTreeMap<PortName, Output> = BTreeMap::new();
        for stored in snapshot.outputs {
            let port = spec.output_name(&stored.name).ok_or_else(|| {
                GraphError::validation(format!(
                    "invariant violated: stored node {} has unknown output {:?}",
                    snapshot.id, stored.name
                ))
            })?;
            let mut connections = BTreeSet::new();
            for connection in stored.connections {
                connections.insert(OutputTarget {
                    node_id: connection.node_id,
                    input_name: canonical_port(&connection.input_name)?,
                });
            }
            outputs.insert(port, Output::restore(port, stored.image_id, connections));
        }
        for port in spec.outputs {
            if !outputs.contains_key(port) {
                outputs.insert(port, Output::new(port));
            }
        }

        Ok(Node {
            id: snapshot.id,
            node_type: snapshot.node_type,
            name: snapshot.name,
            version: snapshot.version,
            state: snapshot.state,
            config: snapshot.config,
            preview: snapshot.preview,
            inputs,
            outputs,
        })
    }
}

/// Maps a stored port name back onto the registry's interned string.
/// Port names referenced across nodes must belong to some defined type.
fn canonical_port(name: &str) -> Result<PortName, GraphError> {
    for node_type in halftone_types::NodeType::ALL {
        let spec = registry::spec(node_type);
        if let Some(port) = spec.input_name(name).or_else(|| spec.output_name(name)) {
            return Ok(port);
        }
    }
    Err(GraphError::validation(format!(
        "invariant violated: stored port name {name:?} is not defined by any node type"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use halftone_types::{BlurConfig, ResizeConfig, Interpolation};

    fn new_node(node_type: NodeType, name: &str) -> (Node, Vec<NodeEvent>) {
        Node::new(node_type, NodeId::generate(), name).expect("node")
    }

    fn kinds(events: &[NodeEvent]) -> Vec<halftone_types::EventKind> {
        events.iter().map(|event| event.body.kind()).collect()
    }

    #[test]
    fn construction_rejects_nil_id_and_missing_required_name() {
        let err = Node::new(NodeType::Blur, NodeId::nil(), "").expect_err("nil id");
        assert!(matches!(err, GraphError::Validation(_)));

        let err = Node::new(NodeType::Output, NodeId::generate(), "").expect_err("no name");
        assert!(matches!(err, GraphError::Validation(_)));

        let (node, events) = new_node(NodeType::Output, "final");
        assert_eq!(node.state(), NodeState::Waiting);
        assert_eq!(node.version(), 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn ports_come_from_the_registry_row() {
        let (node, _) = new_node(NodeType::ResizeMatch, "");
        let inputs: Vec<_> = node.inputs().map(Input::name).collect();
        assert_eq!(inputs, vec!["original", "size_match"]);
        let outputs: Vec<_> = node.outputs().map(Output::name).collect();
        assert_eq!(outputs, vec!["resized"]);
        assert!(node.input("nope").is_err());
        assert!(node.output("nope").is_err());
    }

    #[test]
    fn set_config_validates_type_and_content() {
        let (mut node, _) = new_node(NodeType::Blur, "");
        let err = node
            .set_config(NodeConfig::Resize(ResizeConfig::default()))
            .expect_err("wrong type");
        assert!(matches!(err, GraphError::Validation(_)));

        let err = node
            .set_config(NodeConfig::Blur(BlurConfig { radius: 0 }))
            .expect_err("invalid radius");
        assert!(matches!(err, GraphError::Validation(_)));
        assert_eq!(node.version(), 1, "failed ops must not bump the version");

        let events = node
            .set_config(NodeConfig::Blur(BlurConfig { radius: 5 }))
            .expect("valid");
        assert_eq!(events.len(), 1);
        assert_eq!(node.version(), 2);
    }

    #[test]
    fn config_on_zero_input_node_triggers_generation() {
        let (mut node, _) = new_node(NodeType::Input, "");
        let events = node
            .set_config(NodeConfig::Input(halftone_types::InputConfig {}))
            .expect("config");
        assert_eq!(
            kinds(&events),
            vec![
                halftone_types::EventKind::NodeConfigSet,
                halftone_types::EventKind::NodeNeedsOutputs,
            ]
        );
        assert_eq!(node.state(), NodeState::Generating);
    }

    #[test]
    fn input_image_flow_reaches_generated() {
        let (mut node, _) = new_node(NodeType::Resize, "");
        let upstream = NodeId::generate();
        node.connect_input_from(
            "original",
            InputSource {
                node_id: upstream,
                output_name: "original",
            },
        )
        .expect("connect");
        assert_eq!(node.state(), NodeState::Waiting);

        let events = node
            .set_input_image("original", ImageId::generate())
            .expect("image");
        assert_eq!(
            kinds(&events),
            vec![
                halftone_types::EventKind::NodeInputImageSet,
                halftone_types::EventKind::NodeNeedsOutputs,
            ]
        );
        assert_eq!(node.state(), NodeState::Generating);

        let events = node
            .set_output_image("resized", ImageId::generate())
            .expect("output");
        assert_eq!(events.len(), 1);
        assert_eq!(node.state(), NodeState::Generated);
        assert!(node.all_outputs_set());
    }

    #[test]
    fn needs_outputs_carries_config_and_input_images() {
        let (mut node, _) = new_node(NodeType::Resize, "");
        node.set_config(NodeConfig::Resize(ResizeConfig {
            width: Some(800),
            height: None,
            interpolation: Interpolation::Bilinear,
        }))
        .expect("config");
        node.connect_input_from(
            "original",
            InputSource {
                node_id: NodeId::generate(),
                output_name: "original",
            },
        )
        .expect("connect");
        let image = ImageId::generate();
        let events = node
            .set_input_image("original", image.clone())
            .expect("image");
        match &events[1].body {
            EventBody::NodeNeedsOutputs { config, inputs } => {
                assert_eq!(config.node_type(), NodeType::Resize);
                assert_eq!(inputs, &vec![("original", image)]);
            }
            other => panic!("expected needs-outputs, got {other:?}"),
        }
    }

    #[test]
    fn output_image_without_generating_state_is_rejected() {
        let (mut node, _) = new_node(NodeType::Resize, "");
        let err = node
            .set_output_image("resized", ImageId::generate())
            .expect_err("waiting node cannot complete outputs");
        assert!(matches!(err, GraphError::Conflict(_)));
        assert!(node.output("resized").expect("port").image().is_none());
    }

    #[test]
    fn unset_input_resets_a_generated_node() {
        let (mut node, _) = new_node(NodeType::Resize, "");
        node.connect_input_from(
            "original",
            InputSource {
                node_id: NodeId::generate(),
                output_name: "original",
            },
        )
        .expect("connect");
        node.set_input_image("original", ImageId::generate())
            .expect("image");
        let produced = ImageId::generate();
        node.set_output_image("resized", produced.clone())
            .expect("output");
        assert_eq!(node.state(), NodeState::Generated);

        let events = node.unset_input_image("original").expect("unset");
        assert_eq!(
            kinds(&events),
            vec![
                halftone_types::EventKind::NodeInputImageUnset,
                halftone_types::EventKind::NodeOutputImageUnset,
            ]
        );
        assert_eq!(node.state(), NodeState::Waiting);
        // output unset events observe the post-reset state
        assert_eq!(events[1].state, NodeState::Waiting);
        match &events[1].body {
            EventBody::NodeOutputImageUnset { image_id, .. } => assert_eq!(image_id, &produced),
            other => panic!("expected output unset, got {other:?}"),
        }
    }

    #[test]
    fn disconnect_input_clears_preview_of_fully_set_node() {
        let (mut node, _) = new_node(NodeType::Resize, "");
        node.connect_input_from(
            "original",
            InputSource {
                node_id: NodeId::generate(),
                output_name: "original",
            },
        )
        .expect("connect");
        node.set_input_image("original", ImageId::generate())
            .expect("image");
        node.set_preview(ImageId::generate()).expect("preview");

        let (_, events) = node.disconnect_input("original").expect("disconnect");
        assert_eq!(
            kinds(&events),
            vec![
                halftone_types::EventKind::NodeInputDisconnected,
                halftone_types::EventKind::NodeInputImageUnset,
                halftone_types::EventKind::NodePreviewUnset,
            ]
        );
        assert_eq!(node.state(), NodeState::Waiting);
        assert!(node.preview().is_none());
    }

    #[test]
    fn disconnect_unconnected_input_fails_cleanly() {
        let (mut node, _) = new_node(NodeType::Resize, "");
        let err = node.disconnect_input("original").expect_err("unconnected");
        assert!(matches!(err, GraphError::NotFound(_)));
        assert_eq!(node.version(), 1);
    }

    #[test]
    fn unset_output_image_is_silent_when_empty() {
        let (mut node, _) = new_node(NodeType::Resize, "");
        let events = node.unset_output_image("resized").expect("noop");
        assert!(events.is_empty());
        assert_eq!(node.version(), 1);
    }

    #[test]
    fn version_counts_node_events() {
        let (mut node, _) = new_node(NodeType::Blur, "");
        assert_eq!(node.version(), 1);
        node.set_name("soften").expect("name");
        assert_eq!(node.version(), 2);
        node.set_preview(ImageId::generate()).expect("preview");
        assert_eq!(node.version(), 3);
        node.unset_preview();
        assert_eq!(node.version(), 4);
    }

    #[test]
    fn snapshot_round_trips() {
        let (mut node, _) = new_node(NodeType::ResizeMatch, "fit");
        node.connect_input_from(
            "original",
            InputSource {
                node_id: NodeId::generate(),
                output_name: "original",
            },
        )
        .expect("connect");
        node.set_input_image("original", ImageId::generate())
            .expect("image");

        let snapshot = node.snapshot();
        let restored = Node::restore(snapshot.clone()).expect("restore");
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.state(), node.state());
        assert_eq!(restored.version(), node.version());
    }

    #[test]
    fn restore_rejects_unknown_ports() {
        let (node, _) = new_node(NodeType::Blur, "");
        let mut snapshot = node.snapshot();
        snapshot.inputs[0].name = "sideways".to_string();
        let err = Node::restore(snapshot).expect_err("unknown port");
        assert!(matches!(err, GraphError::Validation(_)));
    }
}
