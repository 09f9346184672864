//! The ImageGraph aggregate.
//!
//! Coordinates cross-node invariants: connection pairing, acyclicity,
//! and image propagation. Every mutating method either fails with no
//! trace or appends its events — aggregate version stamped per event —
//! to the pending buffer drained by the unit of work.

use std::collections::{BTreeMap, BTreeSet};

use halftone_types::{
    GraphSnapshot, ImageGraphId, ImageId, NodeConfig, NodeId, NodeType,
};

use crate::error::GraphError;
use crate::events::{Event, EventBody, NodeStamp};
use crate::node::{Node, NodeEvent};
use crate::ports::{InputSource, OutputTarget};

#[derive(Debug, Clone)]
pub struct ImageGraph {
    id: ImageGraphId,
    name: String,
    version: u64,
    nodes: BTreeMap<NodeId, Node>,
    pending: Vec<Event>,
}

impl ImageGraph {
    pub fn new(id: ImageGraphId, name: &str) -> Result<Self, GraphError> {
        if id.is_nil() {
            return Err(GraphError::validation("image graph id must be non-nil"));
        }
        if name.is_empty() {
            return Err(GraphError::validation("image graph name must be non-empty"));
        }
        let mut graph = Self {
            id,
            name: name.to_string(),
            version: 0,
            nodes: BTreeMap::new(),
            pending: Vec::new(),
        };
        graph.record(
            EventBody::Created {
                name: name.to_string(),
            },
            None,
        );
        Ok(graph)
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn id(&self) -> &ImageGraphId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node(&self, id: &NodeId) -> Result<&Node, GraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::not_found(format!("node {id} not found")))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when any input, output, or preview slot references the image.
    pub fn references_image(&self, image: &ImageId) -> bool {
        self.nodes.values().any(|node| {
            node.preview() == Some(image)
                || node.inputs().any(|input| input.image() == Some(image))
                || node.outputs().any(|output| output.image() == Some(image))
        })
    }

    /// Drains the pending events in emission order. Called exactly once
    /// per transaction by the unit of work.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_events(&self) -> &[Event] {
        &self.pending
    }

    // ── Event plumbing ──────────────────────────────────────────────

    fn record(&mut self, body: EventBody, node: Option<NodeStamp>) {
        self.version += 1;
        self.pending.push(Event {
            graph_id: self.id.clone(),
            graph_version: self.version,
            node,
            body,
        });
    }

    fn record_node_events(&mut self, events: Vec<NodeEvent>) {
        for event in events {
            self.version += 1;
            self.pending.push(Event {
                graph_id: self.id.clone(),
                graph_version: self.version,
                node: Some(NodeStamp {
                    id: event.node_id,
                    version: event.node_version,
                    state: event.state,
                }),
                body: event.body,
            });
        }
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node, GraphError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::not_found(format!("node {id} not found")))
    }

    // ── Node lifecycle ──────────────────────────────────────────────

    pub fn add_node(
        &mut self,
        id: NodeId,
        node_type: NodeType,
        name: &str,
        config: NodeConfig,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::conflict(format!(
                "node {id} already exists in graph {}",
                self.id
            )));
        }
        let (mut node, mut events) = Node::new(node_type, id.clone(), name)?;
        events.extend(node.set_config(config)?);
        self.nodes.insert(id.clone(), node);
        self.record_node_events(events);
        self.record(EventBody::NodeAdded { node_id: id }, None);
        Ok(())
    }

    /// Removes the node and tears down every connection touching it.
    /// Downstream nodes cascade through their input-disconnect path.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<(), GraphError> {
        if id.is_nil() {
            return Err(GraphError::validation("node id must be non-nil"));
        }
        if !self.nodes.contains_key(id) {
            return Err(GraphError::not_found(format!("node {id} not found")));
        }
        self.check_endpoints(id)?;

        let node = match self.nodes.remove(id) {
            Some(node) => node,
            None => return Err(GraphError::not_found(format!("node {id} not found"))),
        };
        self.record(
            EventBody::NodeRemoved {
                node_id: id.clone(),
            },
            None,
        );

        for input in node.inputs() {
            if let Some(source) = input.source() {
                let target = OutputTarget {
                    node_id: id.clone(),
                    input_name: input.name(),
                };
                let upstream = self.node_mut(&source.node_id)?;
                let events = upstream.disconnect_output(source.output_name, &target)?;
                self.record_node_events(events);
            }
        }
        for output in node.outputs() {
            for target in output.connections() {
                let downstream = self.node_mut(&target.node_id)?;
                let (_, events) = downstream.disconnect_input(target.input_name)?;
                self.record_node_events(events);
            }
        }
        Ok(())
    }

    /// Verifies that every connection endpoint of `id` still pairs up,
    /// so the removal cascade below cannot fail half-way.
    fn check_endpoints(&self, id: &NodeId) -> Result<(), GraphError> {
        let node = self.node(id)?;
        for input in node.inputs() {
            if let Some(source) = input.source() {
                let upstream = self.node(&source.node_id).map_err(|_| {
                    GraphError::not_found(format!(
                        "invariant violated: input {:?} of node {id} references missing node {}",
                        input.name(),
                        source.node_id
                    ))
                })?;
                let target = OutputTarget {
                    node_id: id.clone(),
                    input_name: input.name(),
                };
                if !upstream.output(source.output_name)?.is_connected_to(&target) {
                    return Err(GraphError::not_found(format!(
                        "invariant violated: output {:?} of node {} lost its link to node {id}",
                        source.output_name, source.node_id
                    )));
                }
            }
        }
        for output in node.outputs() {
            for target in output.connections() {
                let downstream = self.node(&target.node_id).map_err(|_| {
                    GraphError::not_found(format!(
                        "invariant violated: output {:?} of node {id} references missing node {}",
                        output.name(),
                        target.node_id
                    ))
                })?;
                if !downstream.input(target.input_name)?.connected() {
                    return Err(GraphError::not_found(format!(
                        "invariant violated: input {:?} of node {} lost its link to node {id}",
                        target.input_name, target.node_id
                    )));
                }
            }
        }
        Ok(())
    }

    // ── Topology ────────────────────────────────────────────────────

    pub fn connect_nodes(
        &mut self,
        from_node: &NodeId,
        output_name: &str,
        to_node: &NodeId,
        input_name: &str,
    ) -> Result<(), GraphError> {
        if from_node.is_nil() || to_node.is_nil() {
            return Err(GraphError::validation("node ids must be non-nil"));
        }
        if from_node == to_node {
            return Err(GraphError::conflict(format!(
                "connecting node {from_node} to itself would create a cycle"
            )));
        }

        let resolved_output = self.node(from_node)?.output(output_name)?.name();
        let to = self.node(to_node)?;
        let resolved_input = to.input(input_name)?.name();
        let existing = to.input(input_name)?.source().cloned();

        if self.path_exists(to_node, from_node) {
            return Err(GraphError::conflict(format!(
                "connecting output {resolved_output:?} of node {from_node} to input \
                 {resolved_input:?} of node {to_node} would create a cycle"
            )));
        }

        if let Some(source) = &existing {
            if source.node_id == *from_node && source.output_name == resolved_output {
                // exact edge already present: success, no events
                return Ok(());
            }
            // the old endpoint must still pair up before we start tearing
            // it down, or the steal below could fail half-way
            let old_target = OutputTarget {
                node_id: to_node.clone(),
                input_name: resolved_input,
            };
            let old_node = self.node(&source.node_id).map_err(|_| {
                GraphError::not_found(format!(
                    "invariant violated: input {resolved_input:?} of node {to_node} references missing node {}",
                    source.node_id
                ))
            })?;
            if !old_node
                .output(source.output_name)?
                .is_connected_to(&old_target)
            {
                return Err(GraphError::not_found(format!(
                    "invariant violated: output {:?} of node {} lost its link to node {to_node}",
                    source.output_name, source.node_id
                )));
            }
        }

        if let Some(old_source) = existing {
            let (_, events) = self.node_mut(to_node)?.disconnect_input(input_name)?;
            self.record_node_events(events);
            let old_target = OutputTarget {
                node_id: to_node.clone(),
                input_name: resolved_input,
            };
            let events = self
                .node_mut(&old_source.node_id)?
                .disconnect_output(old_source.output_name, &old_target)?;
            self.record_node_events(events);
        }

        let from_mut = self.node_mut(from_node)?;
        let events = from_mut.connect_output_to(
            output_name,
            OutputTarget {
                node_id: to_node.clone(),
                input_name: resolved_input,
            },
        )?;
        let source_image = from_mut.output(output_name)?.image().cloned();
        self.record_node_events(events);

        let events = self.node_mut(to_node)?.connect_input_from(
            input_name,
            InputSource {
                node_id: from_node.clone(),
                output_name: resolved_output,
            },
        )?;
        self.record_node_events(events);

        if let Some(image) = source_image {
            let events = self.node_mut(to_node)?.set_input_image(input_name, image)?;
            self.record_node_events(events);
        }
        Ok(())
    }

    pub fn disconnect_nodes(
        &mut self,
        from_node: &NodeId,
        output_name: &str,
        to_node: &NodeId,
        input_name: &str,
    ) -> Result<(), GraphError> {
        if from_node.is_nil() || to_node.is_nil() {
            return Err(GraphError::validation("node ids must be non-nil"));
        }
        let resolved_output = self.node(from_node)?.output(output_name)?.name();
        let to = self.node(to_node)?;
        let resolved_input = to.input(input_name)?.name();

        let edge_present = to.input(input_name)?.source().is_some_and(|source| {
            source.node_id == *from_node && source.output_name == resolved_output
        });
        if !edge_present {
            // absent edge: success, no events
            return Ok(());
        }

        let target = OutputTarget {
            node_id: to_node.clone(),
            input_name: resolved_input,
        };
        let events = self
            .node_mut(from_node)?
            .disconnect_output(output_name, &target)?;
        self.record_node_events(events);
        let (_, events) = self.node_mut(to_node)?.disconnect_input(input_name)?;
        self.record_node_events(events);
        Ok(())
    }

    /// Depth-first reachability over output connections. The visited set
    /// is local to one call; every node is expanded at most once, so the
    /// search is O(V+E) and survives degenerate topologies.
    fn path_exists(&self, start: &NodeId, goal: &NodeId) -> bool {
        let mut visited: BTreeSet<NodeId> = BTreeSet::new();
        let mut stack = vec![start.clone()];
        while let Some(current) = stack.pop() {
            if current == *goal {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for output in node.outputs() {
                for target in output.connections() {
                    if !visited.contains(&target.node_id) {
                        stack.push(target.node_id.clone());
                    }
                }
            }
        }
        false
    }

    // ── Image slots ─────────────────────────────────────────────────

    pub fn set_node_output_image(
        &mut self,
        node_id: &NodeId,
        output_name: &str,
        image: ImageId,
    ) -> Result<(), GraphError> {
        let events = self.node_mut(node_id)?.set_output_image(output_name, image)?;
        self.record_node_events(events);
        Ok(())
    }

    pub fn unset_node_output_image(
        &mut self,
        node_id: &NodeId,
        output_name: &str,
    ) -> Result<(), GraphError> {
        let events = self.node_mut(node_id)?.unset_output_image(output_name)?;
        self.record_node_events(events);
        Ok(())
    }

    /// Pushes an output's image to every connected downstream input.
    /// Deliberately not inlined into `set_node_output_image`: the
    /// propagation handler drives this through its own command, keeping
    /// within-node and cross-node events in deterministic order.
    pub fn propagate_output_image_to_connections(
        &mut self,
        node_id: &NodeId,
        output_name: &str,
        image: ImageId,
    ) -> Result<(), GraphError> {
        let targets: Vec<OutputTarget> = self
            .node(node_id)?
            .output(output_name)?
            .connections()
            .cloned()
            .collect();
        for target in targets {
            let events = self
                .node_mut(&target.node_id)?
                .set_input_image(target.input_name, image.clone())?;
            self.record_node_events(events);
        }
        Ok(())
    }

    /// Clears every downstream input fed by this output.
    pub fn unset_node_output_connections(
        &mut self,
        node_id: &NodeId,
        output_name: &str,
    ) -> Result<(), GraphError> {
        let targets: Vec<OutputTarget> = self
            .node(node_id)?
            .output(output_name)?
            .connections()
            .cloned()
            .collect();
        for target in targets {
            let events = self
                .node_mut(&target.node_id)?
                .unset_input_image(target.input_name)?;
            self.record_node_events(events);
        }
        Ok(())
    }

    // ── Thin delegations ────────────────────────────────────────────

    pub fn set_node_preview(
        &mut self,
        node_id: &NodeId,
        image: ImageId,
    ) -> Result<(), GraphError> {
        let events = self.node_mut(node_id)?.set_preview(image)?;
        self.record_node_events(events);
        Ok(())
    }

    pub fn unset_node_preview(&mut self, node_id: &NodeId) -> Result<(), GraphError> {
        let events = self.node_mut(node_id)?.unset_preview();
        self.record_node_events(events);
        Ok(())
    }

    pub fn set_node_config(
        &mut self,
        node_id: &NodeId,
        config: NodeConfig,
    ) -> Result<(), GraphError> {
        let events = self.node_mut(node_id)?.set_config(config)?;
        self.record_node_events(events);
        Ok(())
    }

    pub fn set_node_name(&mut self, node_id: &NodeId, name: &str) -> Result<(), GraphError> {
        let events = self.node_mut(node_id)?.set_name(name)?;
        self.record_node_events(events);
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), GraphError> {
        if name.is_empty() {
            return Err(GraphError::validation("image graph name must be non-empty"));
        }
        self.name = name.to_string();
        Ok(())
    }

    // ── Snapshots ───────────────────────────────────────────────────

    /// Deep-cloned serialisable form; shares nothing with the aggregate.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version,
            nodes: self.nodes.values().map(Node::snapshot).collect(),
        }
    }

    /// Rebuilds an aggregate from storage, re-checking the structural
    /// invariants the snapshot cannot express.
    pub fn restore(snapshot: GraphSnapshot) -> Result<Self, GraphError> {
        if snapshot.id.is_nil() {
            return Err(GraphError::validation(
                "invariant violated: stored graph has a nil id",
            ));
        }
        if snapshot.name.is_empty() {
            return Err(GraphError::validation(
                "invariant violated: stored graph has an empty name",
            ));
        }
        let mut nodes = BTreeMap::new();
        for stored in snapshot.nodes {
            let node = Node::restore(stored)?;
            let id = node.id().clone();
            if nodes.insert(id.clone(), node).is_some() {
                return Err(GraphError::validation(format!(
                    "invariant violated: stored graph {} contains node {id} twice",
                    snapshot.id
                )));
            }
        }
        let graph = Self {
            id: snapshot.id,
            name: snapshot.name,
            version: snapshot.version,
            nodes,
            pending: Vec::new(),
        };
        for node in graph.nodes.values() {
            for input in node.inputs() {
                if let Some(source) = input.source() {
                    if !graph.nodes.contains_key(&source.node_id) {
                        return Err(GraphError::validation(format!(
                            "invariant violated: input {:?} of node {} references missing node {}",
                            input.name(),
                            node.id(),
                            source.node_id
                        )));
                    }
                }
            }
            if graph.path_exists_from_successors(node.id()) {
                return Err(GraphError::validation(format!(
                    "invariant violated: stored graph {} contains a cycle through node {}",
                    graph.id,
                    node.id()
                )));
            }
        }
        Ok(graph)
    }

    fn path_exists_from_successors(&self, id: &NodeId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        for output in node.outputs() {
            for target in output.connections() {
                if target.node_id == *id || self.path_exists(&target.node_id, id) {
                    return true;
                }
            }
        }
        false
    }
}
