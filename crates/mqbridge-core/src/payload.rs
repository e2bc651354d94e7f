//! JSON payloads carried on the request and reply topics.
//!
//! Requests are opaque: whatever the caller sends is forwarded as-is. The
//! only structure mqbridge imposes is on the reply, which always pairs the
//! downstream result with the request it answers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const REQUEST_TOPIC: &str = "api/ping/request";
pub const RESPONSE_TOPIC: &str = "api/ping/response";

/// Key under which undecodable payload bytes are preserved.
pub const RAW_KEY: &str = "raw";
/// Field of the downstream response that becomes the reply's content.
pub const MESSAGE_KEY: &str = "message";
/// Reply content when the downstream response has no [`MESSAGE_KEY`].
pub const NO_MESSAGE: &str = "No message in response";

/// A payload was not valid UTF-8 JSON.
#[derive(Debug, thiserror::Error)]
#[error("payload is not valid JSON: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Reply published by the agent for every request it receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyPayload {
    /// Downstream result, or a description of why there is none.
    pub message: Value,
    /// The decoded request this reply answers.
    pub received: Value,
}

impl ReplyPayload {
    pub fn new(message: Value, received: Value) -> Self {
        Self { message, received }
    }

    pub fn to_value(&self) -> Value {
        json!({ "message": self.message, "received": self.received })
    }
}

/// The fixed request issued by `GET /ping`.
pub fn ping_request() -> Value {
    json!({ "ask": "ping" })
}

pub fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decode a payload, substituting `{"raw": <text>}` when it is not JSON.
pub fn decode_or_raw(bytes: &[u8]) -> Value {
    decode(bytes).unwrap_or_else(|_| raw_payload(bytes))
}

pub fn raw_payload(bytes: &[u8]) -> Value {
    json!({ RAW_KEY: String::from_utf8_lossy(bytes) })
}

pub fn encode(value: &Value) -> Vec<u8> {
    // Serializing a `Value` only fails for non-string map keys, which
    // `Value` cannot represent.
    serde_json::to_vec(value).unwrap_or_default()
}

/// Pull the reply content out of a downstream JSON body.
pub fn extract_message(body: &Value) -> Value {
    body.get(MESSAGE_KEY)
        .cloned()
        .unwrap_or_else(|| Value::String(NO_MESSAGE.to_string()))
}

/// Reply content for a downstream body that was not JSON.
pub fn undecodable_response(status_code: u16, text: &str) -> Value {
    json!({ "status_code": status_code, "text": text })
}

/// Reply content for a downstream call that never produced a response.
pub fn downstream_error(description: &str) -> Value {
    json!({ "error": description })
}

/// Whether a request asks for `ping`.
pub fn asks_for_ping(request: Option<&Value>) -> bool {
    request
        .and_then(|r| r.get("ask"))
        .and_then(Value::as_str)
        .is_some_and(|ask| ask == "ping")
}

/// The echo service's answer to a request.
pub fn pong_for(request: Option<&Value>) -> &'static str {
    if asks_for_ping(request) {
        "pong"
    } else {
        "pong without ask ping"
    }
}
