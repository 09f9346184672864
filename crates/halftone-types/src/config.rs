use std::fmt;

use facet::Facet;
use thiserror::Error;

/// Static tag identifying a node's transformation type.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum NodeType {
    Input,
    Output,
    Crop,
    Blur,
    Resize,
    ResizeMatch,
    PixelInflate,
    PaletteExtract,
    PaletteApply,
}

impl NodeType {
    /// Every defined node type, in registry order.
    pub const ALL: [NodeType; 9] = [
        NodeType::Input,
        NodeType::Output,
        NodeType::Crop,
        NodeType::Blur,
        NodeType::Resize,
        NodeType::ResizeMatch,
        NodeType::PixelInflate,
        NodeType::PaletteExtract,
        NodeType::PaletteApply,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Input => "input",
            NodeType::Output => "output",
            NodeType::Crop => "crop",
            NodeType::Blur => "blur",
            NodeType::Resize => "resize",
            NodeType::ResizeMatch => "resize_match",
            NodeType::PixelInflate => "pixel_inflate",
            NodeType::PaletteExtract => "palette_extract",
            NodeType::PaletteApply => "palette_apply",
        }
    }

    /// Fresh default configuration for this type.
    pub fn default_config(self) -> NodeConfig {
        match self {
            NodeType::Input => NodeConfig::Input(InputConfig {}),
            NodeType::Output => NodeConfig::Output(OutputConfig {}),
            NodeType::Crop => NodeConfig::Crop(CropConfig::default()),
            NodeType::Blur => NodeConfig::Blur(BlurConfig::default()),
            NodeType::Resize => NodeConfig::Resize(ResizeConfig::default()),
            NodeType::ResizeMatch => NodeConfig::ResizeMatch(ResizeMatchConfig::default()),
            NodeType::PixelInflate => NodeConfig::PixelInflate(PixelInflateConfig::default()),
            NodeType::PaletteExtract => {
                NodeConfig::PaletteExtract(PaletteExtractConfig::default())
            }
            NodeType::PaletteApply => NodeConfig::PaletteApply(PaletteApplyConfig::default()),
        }
    }

    /// Ordered field descriptors for this type's configuration, consumed
    /// by the schema endpoint.
    pub fn schema(self) -> ConfigSchema {
        let fields = match self {
            NodeType::Input | NodeType::Output => Vec::new(),
            NodeType::Crop => vec![
                ConfigField::new("bounds", FieldKind::Bounds, false),
                ConfigField::new("aspect_ratio", FieldKind::Ratio, false),
            ],
            NodeType::Blur => vec![ConfigField::new("radius", FieldKind::Integer, true)
                .with_range(1, 100)],
            NodeType::Resize => vec![
                ConfigField::new("width", FieldKind::Integer, false).with_range(1, 10_000),
                ConfigField::new("height", FieldKind::Integer, false).with_range(1, 10_000),
                ConfigField::new("interpolation", FieldKind::Choice, true)
                    .with_options(Interpolation::ALL.iter().map(|i| i.as_str())),
            ],
            NodeType::ResizeMatch => vec![
                ConfigField::new("interpolation", FieldKind::Choice, true)
                    .with_options(Interpolation::ALL.iter().map(|i| i.as_str())),
            ],
            NodeType::PixelInflate => vec![
                ConfigField::new("width", FieldKind::Integer, true).with_range(1, 10_000),
                ConfigField::new("line_width", FieldKind::Integer, true).with_range(1, 100),
                ConfigField::new("line_color", FieldKind::Color, true),
            ],
            NodeType::PaletteExtract => vec![
                ConfigField::new("num_colors", FieldKind::Integer, true).with_range(1, 1_000),
                ConfigField::new("cluster_by", FieldKind::Choice, true)
                    .with_options(ClusterBy::ALL.iter().map(|c| c.as_str())),
            ],
            NodeType::PaletteApply => vec![
                ConfigField::new("normalize", FieldKind::Choice, true)
                    .with_options(NormalizeMode::ALL.iter().map(|n| n.as_str())),
            ],
        };
        ConfigSchema {
            node_type: self,
            fields,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resampling filter used by the resize family.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum Interpolation {
    NearestNeighbor,
    Bilinear,
    Bicubic,
    MitchellNetravali,
    Lanczos2,
    Lanczos3,
}

impl Interpolation {
    pub const ALL: [Interpolation; 6] = [
        Interpolation::NearestNeighbor,
        Interpolation::Bilinear,
        Interpolation::Bicubic,
        Interpolation::MitchellNetravali,
        Interpolation::Lanczos2,
        Interpolation::Lanczos3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Interpolation::NearestNeighbor => "nearest_neighbor",
            Interpolation::Bilinear => "bilinear",
            Interpolation::Bicubic => "bicubic",
            Interpolation::MitchellNetravali => "mitchell_netravali",
            Interpolation::Lanczos2 => "lanczos2",
            Interpolation::Lanczos3 => "lanczos3",
        }
    }
}

/// Color space used when clustering palette colors.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum ClusterBy {
    Rgb,
    Perceptual,
}

impl ClusterBy {
    pub const ALL: [ClusterBy; 2] = [ClusterBy::Rgb, ClusterBy::Perceptual];

    pub fn as_str(self) -> &'static str {
        match self {
            ClusterBy::Rgb => "rgb",
            ClusterBy::Perceptual => "perceptual",
        }
    }
}

/// Pre-mapping normalisation applied by palette application.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum NormalizeMode {
    None,
    Lightness,
}

impl NormalizeMode {
    pub const ALL: [NormalizeMode; 2] = [NormalizeMode::None, NormalizeMode::Lightness];

    pub fn as_str(self) -> &'static str {
        match self {
            NormalizeMode::None => "none",
            NormalizeMode::Lightness => "lightness",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Facet, Debug, Clone, Default, PartialEq, Eq)]
pub struct InputConfig {}

#[derive(Facet, Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputConfig {}

/// Pixel rectangle selected by a crop node.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBounds {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Width:height ratio constraint.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

#[derive(Facet, Debug, Clone, Default, PartialEq, Eq)]
pub struct CropConfig {
    pub bounds: Option<CropBounds>,
    pub aspect_ratio: Option<AspectRatio>,
}

impl CropConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bounds) = &self.bounds {
            if bounds.width == 0 || bounds.height == 0 {
                return Err(ConfigError::new("bounds", "width and height must be >= 1"));
            }
        }
        if let Some(ratio) = &self.aspect_ratio {
            if ratio.width == 0 || ratio.height == 0 {
                return Err(ConfigError::new(
                    "aspect_ratio",
                    "both components must be >= 1",
                ));
            }
            if let Some(bounds) = &self.bounds {
                // cross-multiplied to avoid rounding
                if u64::from(bounds.width) * u64::from(ratio.height)
                    != u64::from(bounds.height) * u64::from(ratio.width)
                {
                    return Err(ConfigError::new(
                        "bounds",
                        format!(
                            "{}x{} does not match aspect ratio {}:{}",
                            bounds.width, bounds.height, ratio.width, ratio.height
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct BlurConfig {
    pub radius: u32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

impl BlurConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.radius) {
            return Err(ConfigError::new(
                "radius",
                format!("must be within 1..=100, got {}", self.radius),
            ));
        }
        Ok(())
    }
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct ResizeConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub interpolation: Interpolation,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            interpolation: Interpolation::Bilinear,
        }
    }
}

impl ResizeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width.is_none() && self.height.is_none() {
            return Err(ConfigError::new(
                "width",
                "at least one of width and height must be set",
            ));
        }
        check_dimension("width", self.width)?;
        check_dimension("height", self.height)?;
        Ok(())
    }
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct ResizeMatchConfig {
    pub interpolation: Interpolation,
}

impl Default for ResizeMatchConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Bilinear,
        }
    }
}

impl ResizeMatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct PixelInflateConfig {
    pub width: u32,
    pub line_width: u32,
    /// Grid line color as `#RRGGBB`.
    pub line_color: String,
}

impl Default for PixelInflateConfig {
    fn default() -> Self {
        Self {
            width: 1_024,
            line_width: 1,
            line_color: "#000000".to_string(),
        }
    }
}

impl PixelInflateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10_000).contains(&self.width) {
            return Err(ConfigError::new(
                "width",
                format!("must be within 1..=10000, got {}", self.width),
            ));
        }
        if !(1..=100).contains(&self.line_width) {
            return Err(ConfigError::new(
                "line_width",
                format!("must be within 1..=100, got {}", self.line_width),
            ));
        }
        let bytes = self.line_color.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[0] == b'#'
            && bytes[1..].iter().all(|b| b.is_ascii_hexdigit());
        if !well_formed {
            return Err(ConfigError::new(
                "line_color",
                format!("must be #RRGGBB, got {:?}", self.line_color),
            ));
        }
        Ok(())
    }
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct PaletteExtractConfig {
    pub num_colors: u32,
    pub cluster_by: ClusterBy,
}

impl Default for PaletteExtractConfig {
    fn default() -> Self {
        Self {
            num_colors: 8,
            cluster_by: ClusterBy::Rgb,
        }
    }
}

impl PaletteExtractConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1_000).contains(&self.num_colors) {
            return Err(ConfigError::new(
                "num_colors",
                format!("must be within 1..=1000, got {}", self.num_colors),
            ));
        }
        Ok(())
    }
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct PaletteApplyConfig {
    pub normalize: NormalizeMode,
}

impl Default for PaletteApplyConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeMode::None,
        }
    }
}

impl PaletteApplyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

fn check_dimension(field: &'static str, value: Option<u32>) -> Result<(), ConfigError> {
    if let Some(value) = value {
        if !(1..=10_000).contains(&value) {
            return Err(ConfigError::new(
                field,
                format!("must be within 1..=10000, got {value}"),
            ));
        }
    }
    Ok(())
}

/// Type-specific node configuration, tagged by node type. Incoming JSON
/// payloads decode directly into this enum; the tag doubles as the
/// per-type deserialisation factory.
#[derive(Facet, Debug, Clone, PartialEq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum NodeConfig {
    Input(InputConfig),
    Output(OutputConfig),
    Crop(CropConfig),
    Blur(BlurConfig),
    Resize(ResizeConfig),
    ResizeMatch(ResizeMatchConfig),
    PixelInflate(PixelInflateConfig),
    PaletteExtract(PaletteExtractConfig),
    PaletteApply(PaletteApplyConfig),
}

impl NodeConfig {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeConfig::Input(_) => NodeType::Input,
            NodeConfig::Output(_) => NodeType::Output,
            NodeConfig::Crop(_) => NodeType::Crop,
            NodeConfig::Blur(_) => NodeType::Blur,
            NodeConfig::Resize(_) => NodeType::Resize,
            NodeConfig::ResizeMatch(_) => NodeType::ResizeMatch,
            NodeConfig::PixelInflate(_) => NodeType::PixelInflate,
            NodeConfig::PaletteExtract(_) => NodeType::PaletteExtract,
            NodeConfig::PaletteApply(_) => NodeType::PaletteApply,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            NodeConfig::Input(_) | NodeConfig::Output(_) => Ok(()),
            NodeConfig::Crop(config) => config.validate(),
            NodeConfig::Blur(config) => config.validate(),
            NodeConfig::Resize(config) => config.validate(),
            NodeConfig::ResizeMatch(config) => config.validate(),
            NodeConfig::PixelInflate(config) => config.validate(),
            NodeConfig::PaletteExtract(config) => config.validate(),
            NodeConfig::PaletteApply(config) => config.validate(),
        }
    }

    pub fn schema(&self) -> ConfigSchema {
        self.node_type().schema()
    }
}

/// Ordered description of one node type's configuration fields.
#[derive(Facet, Debug, Clone, PartialEq)]
pub struct ConfigSchema {
    pub node_type: NodeType,
    pub fields: Vec<ConfigField>,
}

#[derive(Facet, Debug, Clone, PartialEq)]
pub struct ConfigField {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    #[facet(skip_unless_truthy)]
    pub min: Option<u32>,
    #[facet(skip_unless_truthy)]
    pub max: Option<u32>,
    #[facet(skip_unless_truthy)]
    pub options: Option<Vec<String>>,
}

impl ConfigField {
    fn new(name: &str, kind: FieldKind, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required,
            min: None,
            max: None,
            options: None,
        }
    }

    fn with_range(mut self, min: u32, max: u32) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    fn with_options<'a>(mut self, options: impl Iterator<Item = &'a str>) -> Self {
        self.options = Some(options.map(|option| option.to_string()).collect());
        self
    }
}

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Text,
    Color,
    Choice,
    Bounds,
    Ratio,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_matching_default_config() {
        for node_type in NodeType::ALL {
            assert_eq!(node_type.default_config().node_type(), node_type);
        }
    }

    #[test]
    fn every_type_has_a_schema_keyed_to_itself() {
        for node_type in NodeType::ALL {
            assert_eq!(node_type.schema().node_type, node_type);
        }
    }

    #[test]
    fn blur_radius_bounds() {
        assert!(BlurConfig { radius: 1 }.validate().is_ok());
        assert!(BlurConfig { radius: 100 }.validate().is_ok());
        assert!(BlurConfig { radius: 0 }.validate().is_err());
        assert!(BlurConfig { radius: 101 }.validate().is_err());
    }

    #[test]
    fn resize_requires_a_dimension() {
        let config = ResizeConfig {
            width: None,
            height: None,
            interpolation: Interpolation::Bilinear,
        };
        let err = config.validate().expect_err("dimensionless resize");
        assert_eq!(err.field, "width");

        let config = ResizeConfig {
            width: Some(800),
            height: None,
            interpolation: Interpolation::Lanczos3,
        };
        assert!(config.validate().is_ok());

        let config = ResizeConfig {
            width: Some(10_001),
            height: None,
            interpolation: Interpolation::Bilinear,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn pixel_inflate_color_must_be_hex() {
        let mut config = PixelInflateConfig::default();
        assert!(config.validate().is_ok());
        config.line_color = "#12abEF".to_string();
        assert!(config.validate().is_ok());
        config.line_color = "12abEF".to_string();
        assert!(config.validate().is_err());
        config.line_color = "#12abg0".to_string();
        assert!(config.validate().is_err());
        config.line_color = "#12ab".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn crop_bounds_must_match_declared_ratio() {
        let config = CropConfig {
            bounds: Some(CropBounds {
                left: 0,
                top: 0,
                width: 1_600,
                height: 900,
            }),
            aspect_ratio: Some(AspectRatio {
                width: 16,
                height: 9,
            }),
        };
        assert!(config.validate().is_ok());

        let config = CropConfig {
            bounds: Some(CropBounds {
                left: 0,
                top: 0,
                width: 1_600,
                height: 901,
            }),
            aspect_ratio: Some(AspectRatio {
                width: 16,
                height: 9,
            }),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn palette_extract_color_count_bounds() {
        let mut config = PaletteExtractConfig::default();
        assert!(config.validate().is_ok());
        config.num_colors = 0;
        assert!(config.validate().is_err());
        config.num_colors = 1_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_json_is_tagged_by_type() {
        let config = NodeConfig::Blur(BlurConfig { radius: 4 });
        let json = facet_json::to_string(&config).expect("encode");
        assert!(json.contains("blur"), "unexpected json: {json}");
        let back: NodeConfig = facet_json::from_str(&json).expect("decode");
        assert_eq!(back, config);
    }
}
