use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use halftone_types::ImageGraphId;
use tracing::{debug, warn};

use crate::api::parse_graph_id;
use crate::app::AppState;

/// Live event stream for one graph. Registers with the notifier and
/// forwards records in emission order until either side goes away.
pub async fn api_graph_events(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let graph_id = match parse_graph_id(&graph_id) {
        Ok(graph_id) => graph_id,
        Err(response) => return response,
    };
    ws.on_upgrade(move |socket| run_event_stream(socket, state, graph_id))
}

async fn run_event_stream(mut socket: WebSocket, state: AppState, graph_id: ImageGraphId) {
    let mut subscription = state.notifier.register(&graph_id);
    debug!(%graph_id, subscriber = subscription.id, "event stream subscribed");

    loop {
        tokio::select! {
            record = subscription.rx.recv() => {
                let Some(record) = record else { break };
                let text = match facet_json::to_string(&record) {
                    Ok(text) => text,
                    Err(error) => {
                        warn!(%graph_id, %error, "failed to encode event record");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    // clients only ever send pings/closes; drop anything else
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
        }
    }

    state.notifier.unregister(&graph_id, subscription.id);
    debug!(%graph_id, subscriber = subscription.id, "event stream closed");
}
