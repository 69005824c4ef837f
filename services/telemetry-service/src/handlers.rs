use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::models::{ErrorResponse, IngestResponse, TelemetryInput};
use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

pub async fn ingest_telemetry(
    State(state): State<AppState>,
    Json(payload): Json<TelemetryInput>,
) -> impl IntoResponse {
    let device_id = payload.device_id.clone();
    match state.publish(payload).await {
        Ok(subscribers) => {
            tracing::debug!(%device_id, subscribers, "telemetry published");
            (
                StatusCode::OK,
                Json(IngestResponse {
                    status: "ok",
                    subscribers,
                }),
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!(%device_id, error = %err, "telemetry encode failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    code: "encode_failed",
                    message: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

pub async fn latest_telemetry(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.latest_snapshot().await)
}

pub async fn andon_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before the upgrade so nothing published during the handshake is lost.
    let updates = state.updates.subscribe();
    ws.on_upgrade(move |socket| stream_updates(socket, updates))
}

/// Next broadcast frame for one subscriber. A lagging subscriber skips the
/// frames it missed and resumes with the oldest one still buffered; `None`
/// once the relay is shutting down.
async fn next_frame(updates: &mut broadcast::Receiver<String>) -> Option<String> {
    loop {
        match updates.recv().await {
            Ok(frame) => return Some(frame),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "subscriber lagging; dropped telemetry frames");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn stream_updates(socket: WebSocket, mut updates: broadcast::Receiver<String>) {
    let (mut outbound, mut inbound) = socket.split();
    tracing::info!("andon subscriber connected");

    loop {
        tokio::select! {
            update = next_frame(&mut updates) => match update {
                Some(frame) => {
                    if let Err(err) = outbound.send(Message::Text(frame)).await {
                        tracing::debug!(error = %err, "subscriber send failed");
                        break;
                    }
                }
                None => break,
            },
            message = inbound.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Subscribers are receive-only; anything they send is ignored.
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = outbound.close().await;
    tracing::info!("andon subscriber disconnected");
}
