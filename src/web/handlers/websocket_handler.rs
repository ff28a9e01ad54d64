use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, Utf8Bytes, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::db::services::InfluenceurService;
use crate::web::AppState;
use crate::web::models::websocket_models::LiveEvent;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn send_event(socket: &mut WebSocket, event: &LiveEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json_data) => socket.send(Message::Text(Utf8Bytes::from(json_data))).await.is_ok(),
        Err(e) => {
            warn!(event = event.name(), error = %e, "Failed to serialize live event.");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, app_state: Arc<AppState>) {
    // Subscribe before the snapshot so nothing published in between is lost.
    let mut rx = app_state.live_updates.subscribe();
    info!(clients = app_state.live_updates.receiver_count(), "WebSocket client connected.");

    // 1. Initial snapshot
    match InfluenceurService::list_with_counts(
        &app_state.db_pool,
        None,
        app_state.config.require_validation,
    )
    .await
    {
        Ok(list) => {
            if !send_event(&mut socket, &LiveEvent::InfluenceursUpdate(list)).await {
                debug!("Client went away before the snapshot was sent.");
                return;
            }
        }
        Err(e) => warn!(error = %e, "Failed to load the initial snapshot."),
    }

    // 2. Relay broadcasts and answer client messages
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if !send_event(&mut socket, &event).await {
                        debug!("Error sending live event. Closing connection.");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagged behind, events were dropped.");
                }
                Err(RecvError::Closed) => break,
            },
            msg = socket.next() => match msg {
                Some(Ok(Message::Text(t))) => {
                    if t.as_str() == "ping"
                        && socket.send(Message::Text(Utf8Bytes::from("pong"))).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Ping(p))) => {
                    if socket.send(Message::Pong(p)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            },
        }
    }
    info!("WebSocket client disconnected.");
}
