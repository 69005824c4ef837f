//! Decoding of inbound feed frames.
//!
//! Frames are JSON envelopes `{"type": ..., "data": ...}`. Only `telemetry`
//! envelopes carry anything the dashboard keeps; their `data` holds a
//! `device_id` and a `metrics` object. Numbers set a metric, arrays of
//! numbers (zone temperatures) set a series, and anything else (`null`,
//! model names) clears whatever the key held before.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub const TELEMETRY_TYPE: &str = "telemetry";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a feed envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("malformed telemetry payload: {0}")]
    Telemetry(#[source] serde_json::Error),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct RawTelemetry {
    device_id: String,
    metrics: Map<String, Value>,
}

/// New value for one metric key.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    Number(f64),
    Series(Vec<f64>),
    Clear,
}

impl From<Value> for MetricValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(number) => number.as_f64().map_or(MetricValue::Clear, MetricValue::Number),
            Value::Array(items) => items
                .iter()
                .map(Value::as_f64)
                .collect::<Option<Vec<f64>>>()
                .map_or(MetricValue::Clear, MetricValue::Series),
            _ => MetricValue::Clear,
        }
    }
}

/// A partial metric update for one device.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryUpdate {
    pub device_id: String,
    pub metrics: BTreeMap<String, MetricValue>,
}

impl TelemetryUpdate {
    #[cfg(test)]
    pub fn numbers(device_id: &str, metrics: &[(&str, f64)]) -> Self {
        Self {
            device_id: device_id.to_string(),
            metrics: metrics
                .iter()
                .map(|(name, value)| (name.to_string(), MetricValue::Number(*value)))
                .collect(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Frame {
    Telemetry(TelemetryUpdate),
    /// Any envelope whose type the dashboard does not consume.
    Other(String),
}

pub fn decode_frame(text: &str) -> Result<Frame, DecodeError> {
    let envelope: RawEnvelope = serde_json::from_str(text).map_err(DecodeError::Envelope)?;
    if envelope.kind != TELEMETRY_TYPE {
        return Ok(Frame::Other(envelope.kind));
    }

    let raw: RawTelemetry =
        serde_json::from_value(envelope.data).map_err(DecodeError::Telemetry)?;
    let metrics = raw
        .metrics
        .into_iter()
        .map(|(name, value)| (name, MetricValue::from(value)))
        .collect();

    Ok(Frame::Telemetry(TelemetryUpdate {
        device_id: raw.device_id,
        metrics,
    }))
}
