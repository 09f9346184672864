use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use halftone_runtime::Command;
use halftone_types::{
    AddNodeRequest, AddNodeResponse, ConnectRequest, CreateGraphRequest, CreateGraphResponse,
    GraphListResponse, ImageGraphId, MutationResponse, NodeId, SetConfigRequest, SetNameRequest,
    SetOutputImageRequest, SetPreviewRequest,
};

use crate::api::{command_error_response, parse_graph_id, parse_node_id, store_error_response};
use crate::app::AppState;
use crate::util::http::{json_error, json_ok};

fn decode<T>(body: &Bytes) -> Result<T, Response>
where
    T: for<'facet> facet::Facet<'facet>,
{
    facet_json::from_slice(body).map_err(|error| {
        json_error(
            StatusCode::BAD_REQUEST,
            format!("invalid request json: {error}"),
        )
    })
}

pub async fn api_create_graph(State(state): State<AppState>, body: Bytes) -> Response {
    let request: CreateGraphRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let graph_id = request
        .graph_id
        .unwrap_or_else(ImageGraphId::generate);
    match state
        .dispatcher
        .handle_command(Command::CreateImageGraph {
            graph_id: graph_id.clone(),
            name: request.name,
        })
        .await
    {
        Ok(events) => json_ok(&CreateGraphResponse { graph_id, events }),
        Err(error) => command_error_response(error),
    }
}

pub async fn api_list_graphs(State(state): State<AppState>) -> Response {
    match state.store.list().await {
        Ok(graphs) => json_ok(&GraphListResponse { graphs }),
        Err(error) => store_error_response(error),
    }
}

pub async fn api_get_graph(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
) -> Response {
    let graph_id = match parse_graph_id(&graph_id) {
        Ok(graph_id) => graph_id,
        Err(response) => return response,
    };
    match state.store.view(&graph_id).await {
        Ok(snapshot) => json_ok(&snapshot),
        Err(error) => store_error_response(error),
    }
}

pub async fn api_add_node(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
    body: Bytes,
) -> Response {
    let graph_id = match parse_graph_id(&graph_id) {
        Ok(graph_id) => graph_id,
        Err(response) => return response,
    };
    let request: AddNodeRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let node_id = request.node_id.unwrap_or_else(NodeId::generate);
    // the config's tag selects the node type
    let node_type = request.config.node_type();
    match state
        .dispatcher
        .handle_command(Command::AddImageGraphNode {
            graph_id,
            node_id: node_id.clone(),
            node_type,
            name: request.name,
            config: request.config,
        })
        .await
    {
        Ok(events) => json_ok(&AddNodeResponse { node_id, events }),
        Err(error) => command_error_response(error),
    }
}

pub async fn api_remove_node(
    State(state): State<AppState>,
    Path((graph_id, node_id)): Path<(String, String)>,
) -> Response {
    let (graph_id, node_id) = match parse_ids(&graph_id, &node_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    run_command(
        &state,
        Command::RemoveImageGraphNode { graph_id, node_id },
    )
    .await
}

pub async fn api_connect(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
    body: Bytes,
) -> Response {
    connect_or_disconnect(state, graph_id, body, true).await
}

pub async fn api_disconnect(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
    body: Bytes,
) -> Response {
    connect_or_disconnect(state, graph_id, body, false).await
}

async fn connect_or_disconnect(
    state: AppState,
    graph_id: String,
    body: Bytes,
    connect: bool,
) -> Response {
    let graph_id = match parse_graph_id(&graph_id) {
        Ok(graph_id) => graph_id,
        Err(response) => return response,
    };
    let request: ConnectRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let command = if connect {
        Command::ConnectImageGraphNodes {
            graph_id,
            from_node_id: request.from_node_id,
            output_name: request.output_name,
            to_node_id: request.to_node_id,
            input_name: request.input_name,
        }
    } else {
        Command::DisconnectImageGraphNodes {
            graph_id,
            from_node_id: request.from_node_id,
            output_name: request.output_name,
            to_node_id: request.to_node_id,
            input_name: request.input_name,
        }
    };
    run_command(&state, command).await
}

pub async fn api_set_config(
    State(state): State<AppState>,
    Path((graph_id, node_id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let (graph_id, node_id) = match parse_ids(&graph_id, &node_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    let request: SetConfigRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    run_command(
        &state,
        Command::SetImageGraphNodeConfig {
            graph_id,
            node_id,
            config: request.config,
        },
    )
    .await
}

pub async fn api_set_name(
    State(state): State<AppState>,
    Path((graph_id, node_id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let (graph_id, node_id) = match parse_ids(&graph_id, &node_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    let request: SetNameRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    run_command(
        &state,
        Command::SetImageGraphNodeName {
            graph_id,
            node_id,
            name: request.name,
        },
    )
    .await
}

pub async fn api_set_preview(
    State(state): State<AppState>,
    Path((graph_id, node_id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let (graph_id, node_id) = match parse_ids(&graph_id, &node_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    let request: SetPreviewRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    run_command(
        &state,
        Command::SetImageGraphNodePreview {
            graph_id,
            node_id,
            image_id: request.image_id,
        },
    )
    .await
}

pub async fn api_unset_preview(
    State(state): State<AppState>,
    Path((graph_id, node_id)): Path<(String, String)>,
) -> Response {
    let (graph_id, node_id) = match parse_ids(&graph_id, &node_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    run_command(
        &state,
        Command::UnsetImageGraphNodePreview { graph_id, node_id },
    )
    .await
}

pub async fn api_set_output_image(
    State(state): State<AppState>,
    Path((graph_id, node_id, output_name)): Path<(String, String, String)>,
    body: Bytes,
) -> Response {
    let (graph_id, node_id) = match parse_ids(&graph_id, &node_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    let request: SetOutputImageRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.blobs.exists(&request.image_id).await {
        Ok(true) => {}
        Ok(false) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                format!("image {} is not stored", request.image_id),
            );
        }
        Err(error) => {
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string());
        }
    }
    run_command(
        &state,
        Command::SetImageGraphNodeOutputImage {
            graph_id,
            node_id,
            output_name,
            image_id: request.image_id,
        },
    )
    .await
}

pub async fn api_unset_output_image(
    State(state): State<AppState>,
    Path((graph_id, node_id, output_name)): Path<(String, String, String)>,
) -> Response {
    let (graph_id, node_id) = match parse_ids(&graph_id, &node_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    run_command(
        &state,
        Command::UnsetImageGraphNodeOutputImage {
            graph_id,
            node_id,
            output_name,
        },
    )
    .await
}

fn parse_ids(graph_id: &str, node_id: &str) -> Result<(ImageGraphId, NodeId), Response> {
    Ok((parse_graph_id(graph_id)?, parse_node_id(node_id)?))
}

async fn run_command(state: &AppState, command: Command) -> Response {
    match state.dispatcher.handle_command(command).await {
        Ok(events) => json_ok(&MutationResponse { events }),
        Err(error) => command_error_response(error),
    }
}
