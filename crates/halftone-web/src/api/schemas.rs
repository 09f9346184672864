use axum::response::Response;
use halftone_types::{NodeType, SchemaResponse};

use crate::util::http::json_ok;

/// Configuration schemas for every defined node type, in registry order.
pub async fn api_node_types() -> Response {
    json_ok(&SchemaResponse {
        schemas: NodeType::ALL.iter().map(|node_type| node_type.schema()).collect(),
    })
}
