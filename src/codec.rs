// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! JSON text framing: the boundary between bytes and decoded [`Message`]s.
//!
//! This is a convenience wrapper, not a requirement of the engine — callers
//! may hand decoded values to the endpoints directly over their own
//! [`crate::channel::DuplexChannel`]. `decode` is the "format-exception
//! transform" from the design notes: malformed JSON text becomes a
//! `PARSE_ERROR` value rather than a stream error.

use serde_json::Value;

use crate::error::RpcException;
use crate::message::Message;

/// Parses JSON text into a raw [`Value`], converting a parse failure into a
/// `PARSE_ERROR` [`RpcException`] carrying the original text in `data`.
pub fn decode(text: &str) -> Result<Value, RpcException> {
    serde_json::from_str(text).map_err(|e| RpcException::parse_error(text.to_string(), e))
}

/// Parses JSON text directly into a [`Message`], combining [`decode`] and
/// [`Message::decode_value`].
pub fn decode_message(text: &str, strict_protocol_checks: bool) -> Result<Message, RpcException> {
    let value = decode(text)?;
    Message::decode_value(value, strict_protocol_checks)
}

/// Serializes a [`Message`] to its canonical JSON text form.
pub fn encode(message: &Message) -> String {
    serde_json::to_string(message).expect("Message serialization is infallible")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Id;
    use serde_json::json;

    #[test]
    fn malformed_json_becomes_parse_error() {
        let err = decode("{invalid").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ParseError as i32);
        assert!(err.message.starts_with("Invalid JSON"));
        assert_eq!(err.data, Some(json!({"request": "{invalid"})));
    }

    #[test]
    fn encode_decode_round_trips_a_request() {
        let message = Message::request("count", None, Id::Number(0));
        let text = encode(&message);
        let decoded = decode_message(&text, true).unwrap();
        assert_eq!(message, decoded);
    }
}
