// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! The Parameters view: a validated accessor over a handler's raw `params`.

use serde_json::Value;

use crate::error::RpcException;

/// A read-only view over a method's `params`, keyed either positionally (an
/// array) or by name (an object). Typed accessors return the value or an
/// `RpcException::invalid_params` naming the offending parameter. Owns its
/// data (rather than borrowing) so it can be handed to a `'static` async
/// method handler without threading a lifetime through the registry.
#[derive(Debug, Clone)]
pub struct Params {
    method: String,
    value: Option<Value>,
}

impl Params {
    pub fn new(method: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            method: method.into(),
            value,
        }
    }

    /// The enclosing method name, used to phrase error messages.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// `true` if params were supplied as a positional array.
    pub fn positional(&self) -> bool {
        matches!(self.value, Some(Value::Array(_)))
    }

    /// The raw JSON value, if any params were supplied at all.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    fn field(&self, key: &str) -> Result<Value, RpcException> {
        match &self.value {
            Some(Value::Object(map)) => map
                .get(key)
                .cloned()
                .ok_or_else(|| RpcException::missing_param(key)),
            _ => Err(RpcException::invalid_params(format!(
                "Method \"{}\" expects named parameters.",
                self.method
            ))),
        }
    }

    fn index(&self, i: usize) -> Result<Value, RpcException> {
        match &self.value {
            Some(Value::Array(items)) => items
                .get(i)
                .cloned()
                .ok_or_else(|| RpcException::missing_param(&i.to_string())),
            _ => Err(RpcException::invalid_params(format!(
                "Method \"{}\" expects positional parameters.",
                self.method
            ))),
        }
    }

    /// Indexes into named params by key, yielding a sub-view.
    pub fn by_key(&self, key: &str) -> Result<Params, RpcException> {
        Ok(Params::new(self.method.clone(), Some(self.field(key)?)))
    }

    /// Indexes into positional params by index, yielding a sub-view.
    pub fn by_index(&self, i: usize) -> Result<Params, RpcException> {
        Ok(Params::new(self.method.clone(), Some(self.index(i)?)))
    }

    fn require(&self) -> Result<&Value, RpcException> {
        self.value.as_ref().ok_or_else(|| {
            RpcException::invalid_params(format!("Method \"{}\" requires parameters.", self.method))
        })
    }

    pub fn as_num(&self) -> Result<f64, RpcException> {
        self.require()?
            .as_f64()
            .ok_or_else(|| RpcException::invalid_params(format!("{} must be a number.", self.method)))
    }

    pub fn as_int(&self) -> Result<i64, RpcException> {
        self.require()?
            .as_i64()
            .ok_or_else(|| RpcException::invalid_params(format!("{} must be an integer.", self.method)))
    }

    pub fn as_string(&self) -> Result<String, RpcException> {
        self.require()?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcException::invalid_params(format!("{} must be a string.", self.method)))
    }

    pub fn as_bool(&self) -> Result<bool, RpcException> {
        self.require()?
            .as_bool()
            .ok_or_else(|| RpcException::invalid_params(format!("{} must be a boolean.", self.method)))
    }

    pub fn as_list(&self) -> Result<Vec<Value>, RpcException> {
        self.require()?
            .as_array()
            .cloned()
            .ok_or_else(|| RpcException::invalid_params(format!("{} must be a list.", self.method)))
    }

    pub fn as_map(&self) -> Result<serde_json::Map<String, Value>, RpcException> {
        self.require()?
            .as_object()
            .cloned()
            .ok_or_else(|| RpcException::invalid_params(format!("{} must be a map.", self.method)))
    }

    pub fn as_num_or(&self, default: f64) -> Result<f64, RpcException> {
        if self.value.is_none() {
            return Ok(default);
        }
        self.as_num()
    }

    pub fn as_int_or(&self, default: i64) -> Result<i64, RpcException> {
        if self.value.is_none() {
            return Ok(default);
        }
        self.as_int()
    }

    pub fn as_string_or(&self, default: impl Into<String>) -> Result<String, RpcException> {
        if self.value.is_none() {
            return Ok(default.into());
        }
        self.as_string()
    }

    pub fn as_bool_or(&self, default: bool) -> Result<bool, RpcException> {
        if self.value.is_none() {
            return Ok(default);
        }
        self.as_bool()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn named_access_reports_missing_parameter_by_name() {
        let params = Params::new("add", Some(json!({"a": 1})));
        let err = params.by_key("b").unwrap_err();
        assert!(err.message.contains("\"b\""));
    }

    #[test]
    fn typed_accessors_round_trip() {
        let params = Params::new("echo", Some(json!({"message": "hello"})));
        let message = params.by_key("message").unwrap().as_string().unwrap();
        assert_eq!(message, "hello");
    }

    #[test]
    fn optional_accessor_falls_back_to_default_when_absent() {
        let params = Params::new("ping", None);
        assert!(params.as_bool_or(true).unwrap());
    }

    #[test]
    fn positional_index_out_of_range_is_invalid_params() {
        let params = Params::new("add", Some(json!([1, 2])));
        assert!(params.by_index(5).is_err());
        assert_eq!(params.by_index(0).unwrap().as_int().unwrap(), 1);
    }
}
