use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, Mutex};

use crate::models::{TelemetryEnvelope, TelemetryInput};

#[derive(Clone)]
pub struct AppState {
    pub latest: Arc<Mutex<HashMap<String, TelemetryInput>>>,
    pub updates: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(broadcast_capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            latest: Arc::new(Mutex::new(HashMap::new())),
            updates,
        }
    }

    /// Records the input as the device's latest reading and fans the envelope
    /// out to every live subscriber. Returns how many subscribers got it.
    ///
    /// The latest map stays locked until the frame is sent, so concurrent
    /// posts for one device broadcast in the same order they are stored.
    pub async fn publish(&self, input: TelemetryInput) -> Result<usize, serde_json::Error> {
        let frame = serde_json::to_string(&TelemetryEnvelope::telemetry(&input))?;
        let mut latest = self.latest.lock().await;
        latest.insert(input.device_id.clone(), input);
        // A send error only means nobody is listening right now.
        let delivered = self.updates.send(frame).unwrap_or(0);
        drop(latest);
        Ok(delivered)
    }

    pub async fn latest_snapshot(&self) -> HashMap<String, TelemetryInput> {
        self.latest.lock().await.clone()
    }
}
