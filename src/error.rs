// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Error taxonomy for the engine.
//!
//! Two families, kept deliberately distinct: [`RpcException`] is a wire value
//! that crosses the channel to the remote peer, and [`EndpointError`] is a
//! local `thiserror` enum for programmer misuse (double `listen()`,
//! use-after-close) that never gets serialized.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Canonical JSON-RPC 2.0 error codes this engine produces.
///
/// The codes from -32768 to -32000 are reserved by the specification. Unlike
/// a handler-facing error taxonomy that piles on application-specific codes,
/// this one carries exactly the six the wire protocol defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON text was received (emitted by the framing transform).
    ParseError = -32700,
    /// The message is not a well-formed request.
    InvalidRequest = -32600,
    /// Unknown method and no fallback accepted it.
    MethodNotFound = -32601,
    /// Parameters failed handler or type validation.
    InvalidParams = -32602,
    /// Reserved for internal engine faults.
    InternalError = -32603,
    /// An uncaught handler exception.
    ServerError = -32000,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> i32 {
        code as i32
    }
}

/// A JSON-RPC 2.0 error value: `code`, `message`, and optional `data`.
///
/// This is the wire-facing error type — handlers return it in an
/// `Err(RpcException)` to shape the response the remote peer receives, and
/// malformed inbound traffic is translated into one before it ever reaches
/// application code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcException {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: None,
        }
    }

    /// Constructs an error with an arbitrary application-defined code, the
    /// shape a handler uses to signal a domain error such as "divide by
    /// zero" with a code outside the reserved range.
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: impl AsRef<str>) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("Method not found: \"{}\"", method.as_ref()),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn missing_param(name: &str) -> Self {
        Self::invalid_params(format!("Required parameter \"{name}\" not provided."))
    }

    pub fn parse_error(original_text: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::ParseError, format!("Invalid JSON: {cause}"))
            .with_data(serde_json::json!({ "request": original_text.into() }))
    }

    pub fn invalid_request_with(message: impl Into<String>, request: Value) -> Self {
        Self::new(ErrorCode::InvalidRequest, message).with_data(serde_json::json!({ "request": request }))
    }

    pub fn server_error(message: impl Into<String>, full: String, stack: String) -> Self {
        Self::new(ErrorCode::ServerError, message)
            .with_data(serde_json::json!({ "full": full, "stack": stack }))
    }

    pub fn from_value(value: Value) -> Option<RpcException> {
        let map = value.as_object()?;
        let code = map.get("code")?.as_i64()? as i32;
        let message = map.get("message")?.as_str()?.to_string();
        let data = map.get("data").cloned();
        Some(RpcException { code, message, data })
    }
}

impl std::fmt::Display for RpcException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RpcException({}): {}", self.code, self.message)
    }
}

impl std::error::Error for RpcException {}

/// Local misuse errors: programmer errors that never cross the wire.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// `listen()` was called a second time on the same endpoint.
    #[error("listen() may only be called once per endpoint")]
    AlreadyListening,
    /// `send_request`/`send_notification` was called after `close()`.
    #[error("endpoint is closed")]
    Closed,
    /// The channel closed while a request was still pending.
    #[error("channel closed with request still pending")]
    ChannelClosed,
    /// `register_method`/`register_method0` was called twice for the same name.
    #[error("method \"{0}\" is already registered")]
    DuplicateMethod(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_found_names_the_method() {
        let err = RpcException::method_not_found("foo");
        assert_eq!(err.code, ErrorCode::MethodNotFound as i32);
        assert!(err.message.contains("foo"));
    }

    #[test]
    fn missing_param_names_the_parameter() {
        let err = RpcException::missing_param("message");
        assert_eq!(err.code, ErrorCode::InvalidParams as i32);
        assert_eq!(err.message, "Required parameter \"message\" not provided.");
    }

    #[test]
    fn round_trips_through_json() {
        let err = RpcException::with_code(1, "Cannot divide by zero.");
        let value = serde_json::to_value(&err).unwrap();
        let back = RpcException::from_value(value).unwrap();
        assert_eq!(err, back);
    }
}
