//! WebSocket clients receiving pushed lifecycle events

use super::router::AppState;
use crate::lifecycle::Subscription;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Only forward events for this connection
    pub connection_id: Option<String>,
}

/// GET /events - upgrade and stream lifecycle events as JSON text frames
pub async fn events_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    // Subscribe before the upgrade so nothing emitted in between is lost
    let subscription = state.controller.subscribe(&[]);
    ws.on_upgrade(move |socket| handle_socket(socket, subscription, query.connection_id))
}

async fn handle_socket(
    mut socket: WebSocket,
    mut subscription: Subscription,
    filter: Option<String>,
) {
    let client_id = Uuid::new_v4();
    tracing::info!("Event client connected: {}", client_id);

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },

            event = subscription.recv() => {
                let Some(event) = event else {
                    tracing::debug!("Event bus closed, dropping client {}", client_id);
                    break;
                };

                if filter
                    .as_deref()
                    .is_some_and(|id| event.connection_id().as_str() != id)
                {
                    continue;
                }

                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!("Failed to serialize event: {}", e),
                }
            }
        }
    }

    tracing::info!("Event client disconnected: {}", client_id);
}
