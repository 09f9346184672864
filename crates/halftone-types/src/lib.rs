//! Core model types for the halftone image-processing graph.
//!
//! Everything here is wire-facing: typed ids, node configurations with
//! their validation rules and schema descriptors, the flat event record
//! pushed to subscribers and the event log, and the snapshot/view DTOs
//! exchanged between the engine, the stores, and the HTTP layer. The
//! domain behaviour itself lives in `halftone-engine`.

mod config;
mod events;
mod ids;
mod requests;
mod snapshot;

pub use config::{
    AspectRatio, BlurConfig, ClusterBy, ConfigError, ConfigField, ConfigSchema, CropBounds,
    CropConfig, FieldKind, InputConfig, Interpolation, NodeConfig, NodeType, NormalizeMode,
    OutputConfig, PaletteApplyConfig, PaletteExtractConfig, PixelInflateConfig, ResizeConfig,
    ResizeMatchConfig,
};
pub use events::{
    AGGREGATE_TYPE_IMAGE_GRAPH, EventKind, EventRecord, InputImageRef, NodeState,
};
pub use ids::{IdError, ImageGraphId, ImageId, NodeId};
pub use requests::{
    AddNodeRequest, AddNodeResponse, ApiError, ConnectRequest, CreateGraphRequest,
    CreateGraphResponse, GraphListResponse, MutationResponse, SchemaResponse, SetConfigRequest,
    SetNameRequest, SetPreviewRequest, SetOutputImageRequest, UploadResponse,
};
pub use snapshot::{
    ConnectionSnapshot, GraphSnapshot, GraphSummary, InputSnapshot, NodeSnapshot, OutputSnapshot,
};
