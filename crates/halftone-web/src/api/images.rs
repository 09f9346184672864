use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use halftone_runtime::{BlobError, Command};
use halftone_types::{ImageId, UploadResponse};

use crate::api::{command_error_response, parse_graph_id, parse_node_id};
use crate::app::AppState;
use crate::util::http::{json_error, json_ok};

/// Stores raw image bytes and returns the fresh id. The image is not
/// attached to any node yet.
pub async fn api_upload_image(State(state): State<AppState>, body: Bytes) -> Response {
    if body.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "image body must be non-empty");
    }
    let image_id = ImageId::generate();
    if let Err(error) = state.blobs.save(&image_id, body.to_vec()).await {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string());
    }
    json_ok(&UploadResponse {
        image_id,
        events: Vec::new(),
    })
}

pub async fn api_get_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Response {
    let image_id = match ImageId::parse(&image_id) {
        Ok(image_id) => image_id,
        Err(error) => return json_error(StatusCode::BAD_REQUEST, error.to_string()),
    };
    match state.blobs.get(&image_id).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(BlobError::NotFound(_)) => {
            json_error(StatusCode::NOT_FOUND, format!("image {image_id} not found"))
        }
        Err(error) => json_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}

/// Upload path for Input nodes: stores the bytes, then sets the node's
/// output slot so propagation and generation take over downstream.
pub async fn api_upload_to_output(
    State(state): State<AppState>,
    Path((graph_id, node_id, output_name)): Path<(String, String, String)>,
    body: Bytes,
) -> Response {
    let graph_id = match parse_graph_id(&graph_id) {
        Ok(graph_id) => graph_id,
        Err(response) => return response,
    };
    let node_id = match parse_node_id(&node_id) {
        Ok(node_id) => node_id,
        Err(response) => return response,
    };
    if body.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "image body must be non-empty");
    }

    let image_id = ImageId::generate();
    if let Err(error) = state.blobs.save(&image_id, body.to_vec()).await {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string());
    }
    match state
        .dispatcher
        .handle_command(Command::SetImageGraphNodeOutputImage {
            graph_id,
            node_id,
            output_name,
            image_id: image_id.clone(),
        })
        .await
    {
        Ok(events) => json_ok(&UploadResponse { image_id, events }),
        Err(error) => command_error_response(error),
    }
}
