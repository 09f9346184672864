//! Static node-type registry.
//!
//! One row per node type: ordered port lists, whether a human-facing name
//! is mandatory, and (via [`NodeType::default_config`]) the fresh-config
//! factory. Port membership is data here, not code — adding a type is one
//! row plus one config variant in `halftone-types`.

use halftone_types::NodeType;

use crate::ports::PortName;

pub struct NodeTypeSpec {
    pub node_type: NodeType,
    pub inputs: &'static [PortName],
    pub outputs: &'static [PortName],
    pub name_required: bool,
}

const INPUT: NodeTypeSpec = NodeTypeSpec {
    node_type: NodeType::Input,
    inputs: &[],
    outputs: &["original"],
    name_required: false,
};

const OUTPUT: NodeTypeSpec = NodeTypeSpec {
    node_type: NodeType::Output,
    inputs: &["input"],
    outputs: &["final"],
    name_required: true,
};

const CROP: NodeTypeSpec = NodeTypeSpec {
    node_type: NodeType::Crop,
    inputs: &["original"],
    outputs: &["cropped"],
    name_required: false,
};

const BLUR: NodeTypeSpec = NodeTypeSpec {
    node_type: NodeType::Blur,
    inputs: &["original"],
    outputs: &["blurred"],
    name_required: false,
};

const RESIZE: NodeTypeSpec = NodeTypeSpec {
    node_type: NodeType::Resize,
    inputs: &["original"],
    outputs: &["resized"],
    name_required: false,
};

const RESIZE_MATCH: NodeTypeSpec = NodeTypeSpec {
    node_type: NodeType::ResizeMatch,
    inputs: &["original", "size_match"],
    outputs: &["resized"],
    name_required: false,
};

const PIXEL_INFLATE: NodeTypeSpec = NodeTypeSpec {
    node_type: NodeType::PixelInflate,
    inputs: &["original"],
    outputs: &["inflated"],
    name_required: false,
};

const PALETTE_EXTRACT: NodeTypeSpec = NodeTypeSpec {
    node_type: NodeType::PaletteExtract,
    inputs: &["source"],
    outputs: &["palette"],
    name_required: false,
};

const PALETTE_APPLY: NodeTypeSpec = NodeTypeSpec {
    node_type: NodeType::PaletteApply,
    inputs: &["source", "palette"],
    outputs: &["mapped"],
    name_required: false,
};

/// Registry row for a node type. Exhaustive by construction: the match
/// has one arm per `NodeType` variant.
pub fn spec(node_type: NodeType) -> &'static NodeTypeSpec {
    match node_type {
        NodeType::Input => &INPUT,
        NodeType::Output => &OUTPUT,
        NodeType::Crop => &CROP,
        NodeType::Blur => &BLUR,
        NodeType::Resize => &RESIZE,
        NodeType::ResizeMatch => &RESIZE_MATCH,
        NodeType::PixelInflate => &PIXEL_INFLATE,
        NodeType::PaletteExtract => &PALETTE_EXTRACT,
        NodeType::PaletteApply => &PALETTE_APPLY,
    }
}

impl NodeTypeSpec {
    /// Resolves a caller-supplied input name to its canonical static
    /// form, or None for unknown ports.
    pub fn input_name(&self, name: &str) -> Option<PortName> {
        self.inputs.iter().find(|port| **port == name).copied()
    }

    pub fn output_name(&self, name: &str) -> Option<PortName> {
        self.outputs.iter().find(|port| **port == name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_maps_to_a_row_keyed_by_itself() {
        for node_type in NodeType::ALL {
            let row = spec(node_type);
            assert_eq!(row.node_type, node_type);
            assert_eq!(node_type.default_config().node_type(), node_type);
        }
    }

    #[test]
    fn port_lists_match_the_type_table() {
        assert_eq!(spec(NodeType::Input).inputs, &[] as &[&str]);
        assert_eq!(spec(NodeType::Input).outputs, &["original"]);
        assert_eq!(spec(NodeType::Output).inputs, &["input"]);
        assert_eq!(spec(NodeType::Output).outputs, &["final"]);
        assert_eq!(spec(NodeType::Crop).outputs, &["cropped"]);
        assert_eq!(spec(NodeType::Blur).outputs, &["blurred"]);
        assert_eq!(spec(NodeType::Resize).outputs, &["resized"]);
        assert_eq!(spec(NodeType::ResizeMatch).inputs, &["original", "size_match"]);
        assert_eq!(spec(NodeType::PixelInflate).outputs, &["inflated"]);
        assert_eq!(spec(NodeType::PaletteExtract).inputs, &["source"]);
        assert_eq!(spec(NodeType::PaletteApply).inputs, &["source", "palette"]);
        assert_eq!(spec(NodeType::PaletteApply).outputs, &["mapped"]);
    }

    #[test]
    fn only_output_nodes_require_a_name() {
        for node_type in NodeType::ALL {
            let required = spec(node_type).name_required;
            assert_eq!(required, node_type == NodeType::Output, "{node_type}");
        }
    }

    #[test]
    fn port_name_resolution_is_exact() {
        let row = spec(NodeType::ResizeMatch);
        assert_eq!(row.input_name("size_match"), Some("size_match"));
        assert_eq!(row.input_name("SIZE_MATCH"), None);
        assert_eq!(row.output_name("resized"), Some("resized"));
        assert_eq!(row.output_name("original"), None);
    }
}
