//! Control Channel Codec (C1): frames/unframes the `{event, data}` JSON
//! envelope on the WebSocket text-message transport. Outbound serialization
//! is cheap and stateless here — the single-writer-at-a-time guarantee
//! (§4.1, §5) is enforced by routing every write through one mpsc channel
//! drained by the writer task in [`crate::websocket`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound `{event, data}` message. `data` defaults to `null` so a
/// bare `{"event":"rtc.start"}` still parses.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope {
    pub event: String,
    pub data: Value,
}

impl OutboundEnvelope {
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Self {
        Self { event: event.into(), data: serde_json::to_value(data).unwrap_or(Value::Null) }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new("stt.error", serde_json::json!({ "code": code, "message": message.into() }))
    }
}

/// Parses one inbound text message. Callers translate a parse failure into
/// `stt.error{code:"INVALID_PAYLOAD"}` and keep the connection open (§4.1).
pub fn decode(text: &str) -> Result<InboundEnvelope, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode(envelope: &OutboundEnvelope) -> String {
    serde_json::to_string(envelope).unwrap_or_else(|_| {
        r#"{"event":"stt.error","data":{"code":"INVALID_PAYLOAD","message":"failed to encode outbound event"}}"#
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_envelope_with_data() {
        let env = decode(r#"{"event":"rtc.offer","data":{"sdp":"v=0","type":"offer"}}"#).unwrap();
        assert_eq!(env.event, "rtc.offer");
        assert_eq!(env.data["type"], "offer");
    }

    #[test]
    fn decodes_envelope_without_data() {
        let env = decode(r#"{"event":"rtc.start"}"#).unwrap();
        assert_eq!(env.event, "rtc.start");
        assert!(env.data.is_null());
    }

    #[test]
    fn rejects_non_json() {
        assert!(decode("not-json").is_err());
    }

    #[test]
    fn encodes_error_envelope() {
        let env = OutboundEnvelope::error("INVALID_PAYLOAD", "bad json");
        let text = encode(&env);
        assert!(text.contains(r#""event":"stt.error""#));
        assert!(text.contains("INVALID_PAYLOAD"));
    }
}
