pub mod graphs;
pub mod images;
pub mod schemas;
pub mod ws;

use axum::http::StatusCode;
use axum::response::Response;
use halftone_engine::GraphError;
use halftone_runtime::{CommandError, StoreError};
use halftone_types::{IdError, ImageGraphId, NodeId};

use crate::util::http::json_error;

/// Maps the command error taxonomy onto HTTP statuses: validation 400,
/// missing 404, conflicts 409, storage 500, deadline 504.
pub(crate) fn command_error_response(error: CommandError) -> Response {
    let status = match &error {
        CommandError::Graph(GraphError::Validation(_)) => StatusCode::BAD_REQUEST,
        CommandError::Graph(GraphError::NotFound(_)) => StatusCode::NOT_FOUND,
        CommandError::Graph(GraphError::Conflict(_)) => StatusCode::CONFLICT,
        CommandError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        CommandError::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
        CommandError::Store(StoreError::Stale { .. }) => StatusCode::CONFLICT,
        CommandError::Store(StoreError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        CommandError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
    };
    json_error(status, error.to_string())
}

pub(crate) fn store_error_response(error: StoreError) -> Response {
    let status = match &error {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Duplicate(_) | StoreError::Stale { .. } => StatusCode::CONFLICT,
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, error.to_string())
}

pub(crate) fn parse_graph_id(raw: &str) -> Result<ImageGraphId, Response> {
    ImageGraphId::parse(raw).map_err(|error: IdError| {
        json_error(StatusCode::BAD_REQUEST, error.to_string())
    })
}

pub(crate) fn parse_node_id(raw: &str) -> Result<NodeId, Response> {
    NodeId::parse(raw)
        .map_err(|error: IdError| json_error(StatusCode::BAD_REQUEST, error.to_string()))
}
