use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{andon_socket, healthz, ingest_telemetry, latest_telemetry, readyz};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/v1/telemetry", post(ingest_telemetry))
        .route("/api/v1/telemetry/latest", get(latest_telemetry))
        .route("/ws/andons", get(andon_socket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use futures_util::{SinkExt, StreamExt};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::{net::SocketAddr, time::Duration};
    use tokio::{net::TcpListener, time::timeout};
    use tokio_tungstenite::{connect_async, tungstenite::Message};
    use tower::ServiceExt;

    async fn serve(state: AppState) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        addr
    }

    fn post_telemetry(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/telemetry")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let app = build_router(AppState::new(4));
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn posted_telemetry_shows_up_in_latest() {
        let state = AppState::new(4);
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(post_telemetry(json!({
                "device_id": "IMM-02",
                "ts": "2026-10-19T08:00:05",
                "metrics": { "cycle_time": 30.25, "mold_model": "AB-X200" },
                "meta": { "type": "IMM" }
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/api/v1/telemetry/latest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let latest: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(latest["IMM-02"]["metrics"]["cycle_time"], 30.25);
        assert_eq!(latest["IMM-02"]["meta"]["type"], "IMM");
    }

    #[tokio::test]
    async fn rejects_telemetry_without_device_id() {
        let app = build_router(AppState::new(4));
        let response = app
            .oneshot(post_telemetry(json!({ "ts": "now", "metrics": {} })))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn websocket_subscriber_receives_posted_telemetry() {
        let state = AppState::new(8);
        let addr = serve(state.clone()).await;
        let (mut socket, _) = connect_async(format!("ws://{addr}/ws/andons")).await.unwrap();
        // The relay subscribes before answering the upgrade.
        assert_eq!(state.updates.receiver_count(), 1);

        // Client chatter is ignored and does not end the subscription.
        socket.send(Message::Text("hello".to_string())).await.unwrap();

        let response = build_router(state.clone())
            .oneshot(post_telemetry(json!({
                "device_id": "IMM-05",
                "ts": "2026-10-19T08:00:10",
                "metrics": { "cycle_time": 36.5, "zone_temps": [201.0, 199.5] }
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("expected a text frame, got {frame:?}");
        };
        let envelope: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(envelope["type"], "telemetry");
        assert_eq!(envelope["data"]["device_id"], "IMM-05");
        assert_eq!(envelope["data"]["metrics"]["cycle_time"], 36.5);

        socket.close(None).await.unwrap();
        timeout(Duration::from_secs(5), async {
            while state.updates.receiver_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
