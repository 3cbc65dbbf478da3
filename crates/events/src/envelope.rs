use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Envelope shared by every stream the pricing service touches.
///
/// Wire shape: `{ "type": string, "ts": RFC3339, "payload": <object> }`.
///
/// Consumers first decode the envelope with an opaque JSON payload, look at
/// `event_type`, then decode the payload into the type they care about. This
/// keeps "unknown event type" (ignored) separate from "bad payload" (error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    #[serde(rename = "type")]
    event_type: String,
    ts: DateTime<Utc>,
    payload: E,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid envelope: {0}")]
    Envelope(String),

    #[error("invalid {event_type} payload: {reason}")]
    Payload { event_type: String, reason: String },

    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

impl<E> EventEnvelope<E> {
    pub fn new(event_type: impl Into<String>, ts: DateTime<Utc>, payload: E) -> Self {
        Self {
            event_type: event_type.into(),
            ts,
            payload,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn ts(&self) -> DateTime<Utc> {
        self.ts
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}

impl<E: Serialize> EventEnvelope<E> {
    pub fn to_vec(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }
}

impl EventEnvelope<JsonValue> {
    /// Decode raw bytes into an envelope with an undecoded payload.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Envelope(e.to_string()))
    }

    /// Decode the payload into `T`, leaving the envelope untouched.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        T::deserialize(&self.payload).map_err(|e| EnvelopeError::Payload {
            event_type: self.event_type.clone(),
            reason: e.to_string(),
        })
    }
}
