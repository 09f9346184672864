use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use halftone_runtime::{BlobStore, Dispatcher, GraphStore, Notifier};

use crate::api;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub store: Arc<dyn GraphStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub notifier: Arc<Notifier>,
}

impl AppState {
    pub fn new(
        dispatcher: Dispatcher,
        store: Arc<dyn GraphStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            dispatcher,
            store,
            blobs,
            notifier,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/node-types", get(api::schemas::api_node_types))
        .route(
            "/api/graphs",
            post(api::graphs::api_create_graph).get(api::graphs::api_list_graphs),
        )
        .route("/api/graphs/{graph_id}", get(api::graphs::api_get_graph))
        .route("/api/graphs/{graph_id}/events", get(api::ws::api_graph_events))
        .route("/api/graphs/{graph_id}/nodes", post(api::graphs::api_add_node))
        .route(
            "/api/graphs/{graph_id}/nodes/{node_id}",
            delete(api::graphs::api_remove_node),
        )
        .route(
            "/api/graphs/{graph_id}/nodes/{node_id}/config",
            put(api::graphs::api_set_config),
        )
        .route(
            "/api/graphs/{graph_id}/nodes/{node_id}/name",
            put(api::graphs::api_set_name),
        )
        .route(
            "/api/graphs/{graph_id}/nodes/{node_id}/preview",
            put(api::graphs::api_set_preview).delete(api::graphs::api_unset_preview),
        )
        .route(
            "/api/graphs/{graph_id}/nodes/{node_id}/outputs/{output_name}/image",
            put(api::graphs::api_set_output_image)
                .delete(api::graphs::api_unset_output_image),
        )
        .route(
            "/api/graphs/{graph_id}/nodes/{node_id}/outputs/{output_name}/upload",
            post(api::images::api_upload_to_output),
        )
        .route(
            "/api/graphs/{graph_id}/connections",
            post(api::graphs::api_connect).delete(api::graphs::api_disconnect),
        )
        .route("/api/images", post(api::images::api_upload_image))
        .route("/api/images/{image_id}", get(api::images::api_get_image))
        .with_state(state)
}
