// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! The Server engine: method registry, fallback chain, validator, dispatcher,
//! batch handler, and exception-to-response translator.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::channel::{ChannelManager, DuplexChannel};
use crate::error::{EndpointError, ErrorCode, RpcException};
use crate::message::{extract_id_for_error, Message, Notification, Request};
use crate::params::Params;

/// Result type every method handler returns.
pub type HandlerResult = Result<Value, RpcException>;
type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// A registered method's implementation. Implemented automatically for any
/// `Fn(Params) -> Future<Output = HandlerResult>` closure.
pub trait MethodHandler: Send + Sync {
    fn call(&self, params: Params) -> HandlerFuture;
}

impl<F, Fut> MethodHandler for F
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, params: Params) -> HandlerFuture {
        Box::pin((self)(params))
    }
}

#[derive(Clone)]
struct RegisteredMethod {
    handler: Arc<dyn MethodHandler>,
    /// `true` for handlers registered through `register_method0`: no
    /// parameters are accepted, even an empty list or object.
    zero_arg: bool,
}

/// An optional sink for exceptions that are routed to the caller rather than
/// the remote peer: panics inside a handler, forwarded as `(message, method)`.
pub type UnhandledErrorSink = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Method registry, fallback chain, and dispatcher bound to one
/// [`DuplexChannel`].
pub struct Server {
    channel: Arc<ChannelManager>,
    methods: RwLock<HashMap<String, RegisteredMethod>>,
    fallbacks: RwLock<Vec<Arc<dyn MethodHandler>>>,
    strict_protocol_checks: bool,
    on_unhandled_error: RwLock<Option<UnhandledErrorSink>>,
}

impl Server {
    pub fn new(channel: Arc<dyn DuplexChannel>) -> Self {
        Self {
            channel: ChannelManager::new(channel),
            methods: RwLock::new(HashMap::new()),
            fallbacks: RwLock::new(Vec::new()),
            strict_protocol_checks: true,
            on_unhandled_error: RwLock::new(None),
        }
    }

    pub(crate) fn from_manager(channel: Arc<ChannelManager>) -> Self {
        Self {
            channel,
            methods: RwLock::new(HashMap::new()),
            fallbacks: RwLock::new(Vec::new()),
            strict_protocol_checks: true,
            on_unhandled_error: RwLock::new(None),
        }
    }

    /// Overrides whether the `jsonrpc` key is mandatory on inbound requests.
    /// Default `true`.
    pub fn with_strict_protocol_checks(mut self, strict: bool) -> Self {
        self.strict_protocol_checks = strict;
        self
    }

    pub fn strict_protocol_checks(&self) -> bool {
        self.strict_protocol_checks
    }

    /// Registers a sink invoked with `(message, method)` for handler panics
    /// that are not `RpcException`-shaped domain errors.
    pub fn on_unhandled_error<F>(&self, sink: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        *self.on_unhandled_error.write().unwrap() = Some(Arc::new(sink));
    }

    /// Registers a one-argument method handler. Fails if `name` is already
    /// registered.
    pub fn register_method<F, Fut>(&self, name: impl Into<String>, handler: F) -> Result<(), EndpointError>
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert_method(name.into(), Arc::new(handler), false)
    }

    /// Registers a zero-argument method handler: dispatch rejects any
    /// request that carries `params` for this method with `INVALID_PARAMS`.
    pub fn register_method0<F, Fut>(&self, name: impl Into<String>, handler: F) -> Result<(), EndpointError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let wrapped = move |_: Params| handler();
        self.insert_method(name.into(), Arc::new(wrapped), true)
    }

    fn insert_method(
        &self,
        name: String,
        handler: Arc<dyn MethodHandler>,
        zero_arg: bool,
    ) -> Result<(), EndpointError> {
        let mut methods = self.methods.write().unwrap();
        if methods.contains_key(&name) {
            return Err(EndpointError::DuplicateMethod(name));
        }
        methods.insert(name, RegisteredMethod { handler, zero_arg });
        Ok(())
    }

    /// Appends a fallback handler, tried in registration order on unknown
    /// method names.
    pub fn register_fallback<F, Fut>(&self, handler: F)
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.fallbacks.write().unwrap().push(Arc::new(handler));
    }

    /// Subscribes to the channel and begins dispatching inbound requests.
    /// May be called at most once.
    pub fn listen(self: &Arc<Self>) -> Result<(), EndpointError> {
        let this = Arc::clone(self);
        self.channel.listen(move |value| {
            let this = Arc::clone(&this);
            async move { this.handle_inbound(value).await }
        })
    }

    pub fn close(&self) {
        self.channel.close();
    }

    pub async fn done(&self) {
        self.channel.done().await;
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    pub(crate) async fn handle_inbound(self: Arc<Self>, value: Value) {
        let response = match Message::decode_value(value.clone(), self.strict_protocol_checks) {
            Ok(message) => self.clone().handle_message(message).await,
            Err(exception) => {
                let id = extract_id_for_error(&value);
                tracing::debug!(code = exception.code, message = %exception.message, "rejected malformed inbound message");
                Some(encode(&Message::error(id, exception)))
            }
        };

        if let Some(response) = response {
            if !self.channel.is_closed() {
                self.channel.add(response);
            }
        }
    }

    fn handle_message(self: Arc<Self>, message: Message) -> BoxFuture<'static, Option<Value>> {
        Box::pin(async move {
            match message {
                Message::Request(request) => Some(self.dispatch_request(request).await),
                Message::Notification(notification) => {
                    self.dispatch_notification(notification).await;
                    None
                }
                Message::Batch(items) => self.dispatch_batch(items).await,
                // Response-shaped traffic has no meaning to a bare Server;
                // a Peer demultiplexes these away before they reach here.
                Message::Success(_) | Message::Error(_) => None,
            }
        })
    }

    async fn dispatch_request(self: Arc<Self>, request: Request) -> Value {
        let id = request.id.clone();
        let params = Params::new(request.method.clone(), request.params.clone());
        let response = match self.invoke(&request.method, params).await {
            Ok(result) => Message::success(id, result),
            Err(exception) => Message::error(id, exception),
        };
        encode(&response)
    }

    async fn dispatch_notification(self: Arc<Self>, notification: Notification) {
        let params = Params::new(notification.method.clone(), notification.params.clone());
        let _ = self.invoke(&notification.method, params).await;
    }

    async fn dispatch_batch(self: Arc<Self>, items: Vec<Message>) -> Option<Value> {
        let futures = items.into_iter().map(|item| self.clone().handle_message(item));
        let responses: Vec<Value> = join_all(futures).await.into_iter().flatten().collect();
        if responses.is_empty() {
            None
        } else {
            Some(Value::Array(responses))
        }
    }

    async fn invoke(self: &Arc<Self>, method: &str, params: Params) -> HandlerResult {
        let registered = self.methods.read().unwrap().get(method).cloned();
        if let Some(entry) = registered {
            if entry.zero_arg && params.value().is_some() {
                return Err(RpcException::invalid_params(format!(
                    "No parameters are allowed for method {method}."
                )));
            }
            return self.call_handler(entry.handler, params).await;
        }

        let fallbacks = self.fallbacks.read().unwrap().clone();
        for fallback in fallbacks {
            match self.call_handler(fallback, params.clone()).await {
                Err(exception) if exception.code == ErrorCode::MethodNotFound as i32 => continue,
                other => return other,
            }
        }

        Err(RpcException::method_not_found(method))
    }

    async fn call_handler(self: &Arc<Self>, handler: Arc<dyn MethodHandler>, params: Params) -> HandlerResult {
        let method = params.method().to_string();
        match AssertUnwindSafe(handler.call(params)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic);
                tracing::error!(method = %method, message = %message, "method handler panicked");
                if let Some(sink) = self.on_unhandled_error.read().unwrap().clone() {
                    sink(&message, &method);
                }
                Err(RpcException::server_error(message.clone(), message, String::new()))
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn encode(message: &Message) -> Value {
    serde_json::to_value(message).expect("Message serialization is infallible")
}
