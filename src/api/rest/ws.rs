use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::models::driver::Driver;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.driver_events_tx.subscribe();

    info!("websocket client connected");

    let initial = state.index.get_available(&state.store, &state.metrics);
    if send_drivers(&mut sender, "driver_list", &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(drivers) => {
                    if send_drivers(&mut sender, "driver_update", &drivers).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagged behind driver events");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if wants_driver_list(&text) {
                        let drivers = state.index.get_available(&state.store, &state.metrics);
                        if send_drivers(&mut sender, "driver_list", &drivers).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }

    info!("websocket client disconnected");
}

fn wants_driver_list(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|value| value["type"] == "get_drivers")
        .unwrap_or(false)
}

async fn send_drivers(
    sender: &mut SplitSink<WebSocket, Message>,
    kind: &str,
    drivers: &[Driver],
) -> Result<(), axum::Error> {
    let payload = json!({ "type": kind, "drivers": drivers });
    let text = match serde_json::to_string(&payload) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "failed to serialize driver list for ws");
            return Ok(());
        }
    };

    sender.send(Message::Text(text)).await
}
