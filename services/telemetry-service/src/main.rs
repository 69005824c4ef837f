mod app;
mod handlers;
mod models;
mod state;

use andon_common::{bind_listener, env_or, init_tracing, shutdown_signal};

use crate::state::AppState;

#[tokio::main]
async fn main() {
    let _guards = init_tracing("telemetry-service");

    let port = env_or("PORT", 8000u16);
    let broadcast_capacity = env_or("BROADCAST_CAPACITY", 256usize);

    let state = AppState::new(broadcast_capacity);
    let app = app::build_router(state);
    let listener = match bind_listener(port).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(port, error = %err, "bind failed");
            return;
        }
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server exited");
    }
}
