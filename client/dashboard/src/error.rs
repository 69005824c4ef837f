use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("config: {0}")]
    Config(String),
    #[error("connect {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("websocket transport: {0}")]
    Transport(#[from] tungstenite::Error),
}
