// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Property-based tests for message decoding, covering randomly generated
//! valid and invalid wire shapes rather than a fixed example grid.

use jrpc2::{decode_message, Id, Message};
use proptest::prelude::*;
use serde_json::{json, Value};

fn method_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{1,20}".prop_map(String::from)
}

fn id_strategy() -> impl Strategy<Value = Option<Id>> {
    prop_oneof![
        Just(None),
        any::<i32>().prop_map(|n| Some(Id::Number(n as i64))),
        "[a-zA-Z0-9_-]{1,10}".prop_map(|s| Some(Id::String(s))),
    ]
}

fn params_strategy() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        prop::collection::vec("[a-z]{1,5}", 0..4).prop_map(|keys| {
            let map: serde_json::Map<String, Value> =
                keys.into_iter().map(|k| (k, json!(1))).collect();
            Some(Value::Object(map))
        }),
        prop::collection::vec(any::<i32>(), 0..5).prop_map(|items| Some(json!(items))),
    ]
}

fn request_value_strategy() -> impl Strategy<Value = Value> {
    (method_name_strategy(), params_strategy(), id_strategy()).prop_map(|(method, params, id)| {
        let mut object = serde_json::Map::new();
        object.insert("jsonrpc".to_string(), json!("2.0"));
        object.insert("method".to_string(), json!(method));
        if let Some(params) = params {
            object.insert("params".to_string(), params);
        }
        match id {
            Some(Id::Number(n)) => {
                object.insert("id".to_string(), json!(n));
            }
            Some(Id::String(s)) => {
                object.insert("id".to_string(), json!(s));
            }
            Some(Id::Null) => {
                object.insert("id".to_string(), Value::Null);
            }
            None => {}
        }
        Value::Object(object)
    })
}

proptest! {
    /// Every request the strategy generates round-trips through decode: the
    /// method name and id shape survive unchanged.
    #[test]
    fn valid_request_decodes_with_matching_method_and_id(value in request_value_strategy()) {
        let method = value["method"].as_str().unwrap().to_string();
        let had_id = value.as_object().unwrap().contains_key("id");

        let message = Message::decode_value(value, true).unwrap();
        match message {
            Message::Request(r) => {
                prop_assert!(had_id);
                prop_assert_eq!(r.method, method);
            }
            Message::Notification(n) => {
                prop_assert!(!had_id);
                prop_assert_eq!(n.method, method);
            }
            other => prop_assert!(false, "expected Request or Notification, got {other:?}"),
        }
    }

    /// A batch of N generated requests decodes to exactly N messages, in
    /// order.
    #[test]
    fn batch_preserves_order_and_count(items in prop::collection::vec(request_value_strategy(), 1..6)) {
        let methods: Vec<String> = items
            .iter()
            .map(|v| v["method"].as_str().unwrap().to_string())
            .collect();
        let batch = Message::decode_value(Value::Array(items), true).unwrap();
        match batch {
            Message::Batch(decoded) => {
                prop_assert_eq!(decoded.len(), methods.len());
                for (message, method) in decoded.iter().zip(methods.iter()) {
                    let decoded_method = match message {
                        Message::Request(r) => &r.method,
                        Message::Notification(n) => &n.method,
                        other => panic!("expected Request or Notification, got {other:?}"),
                    };
                    prop_assert_eq!(decoded_method, method);
                }
            }
            other => prop_assert!(false, "expected Batch, got {other:?}"),
        }
    }

    /// Any `jsonrpc` value other than the literal string `"2.0"` is rejected
    /// as `InvalidRequest`, never silently coerced or accepted.
    #[test]
    fn wrong_jsonrpc_version_is_always_invalid_request(version in "[0-9]\\.[0-9]") {
        prop_assume!(version != "2.0");
        let value = json!({"jsonrpc": version, "method": "ping", "id": 1});
        let err = Message::decode_value(value, true).unwrap_err();
        prop_assert_eq!(err.code, jrpc2::ErrorCode::InvalidRequest as i32);
    }

    /// Arbitrary non-JSON text never panics the decoder; it always comes back
    /// as a `ParseError` or `InvalidRequest` exception.
    #[test]
    fn arbitrary_text_never_panics_the_decoder(text in ".*") {
        match decode_message(&text, true) {
            Ok(_) => {}
            Err(exception) => {
                prop_assert!(
                    exception.code == jrpc2::ErrorCode::ParseError as i32
                        || exception.code == jrpc2::ErrorCode::InvalidRequest as i32
                );
            }
        }
    }
}
