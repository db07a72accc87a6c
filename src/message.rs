// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Wire types for the JSON-RPC 2.0 message model.
//!
//! This module defines the decoded representations of requests, notifications,
//! responses, and batches according to the
//! [specification](https://www.jsonrpc.org/specification). Unlike a derived
//! `Deserialize` over a single tagged enum, inbound decoding goes through
//! [`Message::decode`], which inspects the raw [`serde_json::Value`] shape by
//! hand so that validation failures can carry the exact wire-format error
//! strings the protocol mandates.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::{ErrorCode, RpcException};

/// JSON-RPC request identifier.
///
/// Can be a string, number, or null per the specification. Notifications omit
/// the `id` field entirely rather than carrying a null one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier.
    String(String),
    /// Numeric identifier.
    Number(i64),
    /// Null identifier (valid, though discouraged, by the spec).
    Null,
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "{s}"),
            Id::Number(n) => write!(f, "{n}"),
            Id::Null => write!(f, "null"),
        }
    }
}

impl Id {
    fn from_value(value: &Value) -> Option<Id> {
        match value {
            Value::String(s) => Some(Id::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Id::Number),
            Value::Null => Some(Id::Null),
            _ => None,
        }
    }
}

/// A JSON-RPC 2.0 request object, always carrying a non-null `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: Id,
}

/// A JSON-RPC 2.0 notification: a request with no `id` field at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessResponse {
    pub jsonrpc: &'static str,
    pub result: Value,
    pub id: Id,
}

/// An error JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub jsonrpc: &'static str,
    pub error: RpcException,
    pub id: Id,
}

/// A decoded JSON-RPC 2.0 message: one of the four wire shapes, or a batch of
/// them. A `Batch` never nests another `Batch`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Success(SuccessResponse),
    Error(ErrorResponse),
    Batch(Vec<Message>),
}

impl Message {
    pub fn request(method: impl Into<String>, params: Option<Value>, id: Id) -> Self {
        Message::Request(Request {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        })
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Message::Notification(Notification {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        })
    }

    pub fn success(id: Id, result: Value) -> Self {
        Message::Success(SuccessResponse {
            jsonrpc: "2.0",
            result,
            id,
        })
    }

    pub fn error(id: Id, error: RpcException) -> Self {
        Message::Error(ErrorResponse {
            jsonrpc: "2.0",
            error,
            id,
        })
    }

    /// The `id` this message carries, if any. Notifications and batches have
    /// none.
    pub fn id(&self) -> Option<&Id> {
        match self {
            Message::Request(r) => Some(&r.id),
            Message::Notification(_) => None,
            Message::Success(s) => Some(&s.id),
            Message::Error(e) => Some(&e.id),
            Message::Batch(_) => None,
        }
    }

    /// Decodes one already-parsed JSON value into a [`Message`], honoring
    /// `strict_protocol_checks` for the `jsonrpc` key per step 2 of request
    /// validation. Works a level lower than validating a whole request
    /// string at once: on a single already-parsed `Value`, so callers can
    /// decode batch elements individually.
    pub fn decode_value(value: Value, strict_protocol_checks: bool) -> Result<Message, RpcException> {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(RpcException::invalid_request_with(
                        "A batch must contain at least one request.",
                        Value::Array(Vec::new()),
                    ));
                }
                let mut batch = Vec::with_capacity(items.len());
                for item in items {
                    batch.push(Self::decode_value(item, strict_protocol_checks)?);
                }
                Ok(Message::Batch(batch))
            }
            Value::Object(ref map) => {
                let original = value.clone();

                if map.contains_key("result") || map.contains_key("error") {
                    return Self::decode_response(value, original);
                }

                match map.get("jsonrpc") {
                    Some(Value::String(v)) if v == "2.0" => {}
                    Some(_) => {
                        return Err(Self::invalid_request_for(
                            &original,
                            "Request must contain a \"jsonrpc\" key with value \"2.0\".",
                        ))
                    }
                    None if !strict_protocol_checks => {}
                    None => {
                        return Err(Self::invalid_request_for(
                            &original,
                            "Request must contain a \"jsonrpc\" key.",
                        ))
                    }
                }

                let method = match map.get("method") {
                    Some(Value::String(m)) => m.clone(),
                    _ => {
                        return Err(Self::invalid_request_for(
                            &original,
                            "Request must contain a \"method\" key whose value is a string.",
                        ))
                    }
                };

                let params = match map.get("params") {
                    None => None,
                    Some(Value::Array(_)) | Some(Value::Object(_)) => map.get("params").cloned(),
                    Some(_) => {
                        return Err(Self::invalid_request_for(
                            &original,
                            "Request params must be an Array or an Object.",
                        ))
                    }
                };

                match map.get("id") {
                    None => Ok(Message::Notification(Notification {
                        jsonrpc: "2.0",
                        method,
                        params,
                    })),
                    Some(id_value) => match Id::from_value(id_value) {
                        Some(id) => Ok(Message::Request(Request {
                            jsonrpc: "2.0",
                            method,
                            params,
                            id,
                        })),
                        None => Err(Self::invalid_request_for(
                            &original,
                            "Request id must be a string, number, or null.",
                        )),
                    },
                }
            }
            other => Err(RpcException::invalid_request_with(
                "Request must be an Array or an Object.",
                other,
            )),
        }
    }

    fn invalid_request_for(original: &Value, message: &str) -> RpcException {
        RpcException::invalid_request_with(message, original.clone())
    }

    fn decode_response(value: Value, original: Value) -> Result<Message, RpcException> {
        let map = value.as_object().expect("checked by caller");
        let id = match map.get("id") {
            Some(id_value) => Id::from_value(id_value).unwrap_or(Id::Null),
            None => Id::Null,
        };

        if let Some(error_value) = map.get("error") {
            let exception = RpcException::from_value(error_value.clone()).ok_or_else(|| {
                Self::invalid_request_for(&original, "Response \"error\" must be an Object.")
            })?;
            return Ok(Message::Error(ErrorResponse {
                jsonrpc: "2.0",
                error: exception,
                id,
            }));
        }

        let result = map.get("result").cloned().unwrap_or(Value::Null);
        Ok(Message::Success(SuccessResponse {
            jsonrpc: "2.0",
            result,
            id,
        }))
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Message::Request(r) => r.serialize(serializer),
            Message::Notification(n) => n.serialize(serializer),
            Message::Success(s) => s.serialize(serializer),
            Message::Error(e) => e.serialize(serializer),
            Message::Batch(items) => items.serialize(serializer),
        }
    }
}

/// Returns `true` if the decoded object shape looks like a response
/// (carries `result` or `error`), used by the Peer demultiplexer.
pub fn looks_like_response(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.contains_key("result") || map.contains_key("error"))
}

/// Best-effort extraction of the `id` a malformed request carried, for
/// addressing the error response: "any validation failure on a message that
/// did carry an id produces an error response with that id; otherwise the
/// error response uses id=null."
pub fn extract_id_for_error(value: &Value) -> Id {
    match value.as_object().and_then(|map| map.get("id")) {
        Some(id_value) => Id::from_value(id_value).unwrap_or(Id::Null),
        None => Id::Null,
    }
}
