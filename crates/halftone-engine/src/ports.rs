//! Input/output port model.
//!
//! Ports are created from the node type's registry row at construction
//! and never added or removed afterwards. Image slots are independent of
//! connection state.

use std::collections::BTreeSet;

use halftone_types::{ImageId, NodeId};

use crate::error::GraphError;

/// Canonical port name, interned in the registry.
pub type PortName = &'static str;

/// Upstream endpoint recorded on a connected input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSource {
    pub node_id: NodeId,
    pub output_name: PortName,
}

/// Downstream endpoint of one output connection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutputTarget {
    pub node_id: NodeId,
    pub input_name: PortName,
}

#[derive(Debug, Clone)]
pub struct Input {
    name: PortName,
    source: Option<InputSource>,
    image: Option<ImageId>,
}

impl Input {
    pub(crate) fn new(name: PortName) -> Self {
        Self {
            name,
            source: None,
            image: None,
        }
    }

    pub fn name(&self) -> PortName {
        self.name
    }

    pub fn connected(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<&InputSource> {
        self.source.as_ref()
    }

    pub fn image(&self) -> Option<&ImageId> {
        self.image.as_ref()
    }

    /// Connected with an image present — the per-input half of the
    /// node's readiness predicate.
    pub fn is_set(&self) -> bool {
        self.source.is_some() && self.image.is_some()
    }

    pub(crate) fn connect(&mut self, source: InputSource) -> Result<(), GraphError> {
        if self.source.is_some() {
            return Err(GraphError::conflict(format!(
                "input {:?} is already connected",
                self.name
            )));
        }
        self.source = Some(source);
        Ok(())
    }

    pub(crate) fn disconnect(&mut self) -> Result<InputSource, GraphError> {
        self.source.take().ok_or_else(|| {
            GraphError::not_found(format!("input {:?} is not connected", self.name))
        })
    }

    pub(crate) fn set_image(&mut self, image: ImageId) -> Result<(), GraphError> {
        if image.is_nil() {
            return Err(GraphError::validation(format!(
                "image for input {:?} must be non-nil",
                self.name
            )));
        }
        self.image = Some(image);
        Ok(())
    }

    pub(crate) fn unset_image(&mut self) -> Option<ImageId> {
        self.image.take()
    }

    pub(crate) fn restore(
        name: PortName,
        source: Option<InputSource>,
        image: Option<ImageId>,
    ) -> Self {
        Self {
            name,
            source,
            image,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Output {
    name: PortName,
    image: Option<ImageId>,
    connections: BTreeSet<OutputTarget>,
}

impl Output {
    pub(crate) fn new(name: PortName) -> Self {
        Self {
            name,
            image: None,
            connections: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> PortName {
        self.name
    }

    pub fn image(&self) -> Option<&ImageId> {
        self.image.as_ref()
    }

    /// Downstream endpoints in deterministic order.
    pub fn connections(&self) -> impl Iterator<Item = &OutputTarget> {
        self.connections.iter()
    }

    pub fn is_connected_to(&self, target: &OutputTarget) -> bool {
        self.connections.contains(target)
    }

    pub(crate) fn connect(&mut self, target: OutputTarget) -> Result<(), GraphError> {
        if !self.connections.insert(target.clone()) {
            return Err(GraphError::conflict(format!(
                "output {:?} is already connected to input {:?} of node {}",
                self.name, target.input_name, target.node_id
            )));
        }
        Ok(())
    }

    pub(crate) fn disconnect(&mut self, target: &OutputTarget) -> Result<(), GraphError> {
        if !self.connections.remove(target) {
            return Err(GraphError::not_found(format!(
                "output {:?} has no connection to input {:?} of node {}",
                self.name, target.input_name, target.node_id
            )));
        }
        Ok(())
    }

    pub(crate) fn set_image(&mut self, image: ImageId) -> Result<(), GraphError> {
        if image.is_nil() {
            return Err(GraphError::validation(format!(
                "image for output {:?} must be non-nil",
                self.name
            )));
        }
        self.image = Some(image);
        Ok(())
    }

    pub(crate) fn unset_image(&mut self) -> Option<ImageId> {
        self.image.take()
    }

    pub(crate) fn restore(
        name: PortName,
        image: Option<ImageId>,
        connections: BTreeSet<OutputTarget>,
    ) -> Self {
        Self {
            name,
            image,
            connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(node_id: &NodeId) -> OutputTarget {
        OutputTarget {
            node_id: node_id.clone(),
            input_name: "original",
        }
    }

    #[test]
    fn input_single_source() {
        let mut input = Input::new("original");
        assert!(!input.connected());

        let upstream = NodeId::generate();
        input
            .connect(InputSource {
                node_id: upstream.clone(),
                output_name: "original",
            })
            .expect("first connect");
        assert!(input.connected());

        let err = input
            .connect(InputSource {
                node_id: NodeId::generate(),
                output_name: "original",
            })
            .expect_err("second connect must fail");
        assert!(matches!(err, GraphError::Conflict(_)));

        let source = input.disconnect().expect("disconnect");
        assert_eq!(source.node_id, upstream);
        assert!(matches!(
            input.disconnect().expect_err("already disconnected"),
            GraphError::NotFound(_)
        ));
    }

    #[test]
    fn input_slot_is_independent_of_connection() {
        let mut input = Input::new("original");
        let image = ImageId::generate();
        input.set_image(image.clone()).expect("set");
        assert_eq!(input.image(), Some(&image));
        assert!(!input.is_set(), "image without connection is not set");
        assert_eq!(input.unset_image(), Some(image));
        assert_eq!(input.unset_image(), None);
    }

    #[test]
    fn nil_image_rejected() {
        let mut input = Input::new("original");
        assert!(matches!(
            input.set_image(ImageId::nil()).expect_err("nil"),
            GraphError::Validation(_)
        ));
        let mut output = Output::new("resized");
        assert!(matches!(
            output.set_image(ImageId::nil()).expect_err("nil"),
            GraphError::Validation(_)
        ));
    }

    #[test]
    fn output_fan_out_rejects_duplicates() {
        let mut output = Output::new("original");
        let a = NodeId::generate();
        let b = NodeId::generate();

        output.connect(target(&a)).expect("first");
        output.connect(target(&b)).expect("second distinct");
        assert!(matches!(
            output.connect(target(&a)).expect_err("duplicate"),
            GraphError::Conflict(_)
        ));
        assert_eq!(output.connections().count(), 2);

        output.disconnect(&target(&a)).expect("remove");
        assert!(matches!(
            output.disconnect(&target(&a)).expect_err("missing"),
            GraphError::NotFound(_)
        ));
    }
}
