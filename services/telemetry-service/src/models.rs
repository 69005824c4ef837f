use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Telemetry posted by an edge gateway or simulator.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TelemetryInput {
    pub device_id: String,
    pub ts: String,
    pub metrics: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

/// Frame pushed to `/ws/andons` subscribers.
#[derive(Serialize)]
pub struct TelemetryEnvelope<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: &'a TelemetryInput,
}

impl<'a> TelemetryEnvelope<'a> {
    pub fn telemetry(data: &'a TelemetryInput) -> Self {
        Self {
            kind: "telemetry",
            data,
        }
    }
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub subscribers: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
