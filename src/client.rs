// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! The Client engine: outbound request/notification sending, response
//! correlation, and batch scoping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::channel::{ChannelManager, DuplexChannel};
use crate::error::{EndpointError, RpcException};
use crate::message::{looks_like_response, Id, Message};

type Pending = HashMap<Id, oneshot::Sender<Result<Value, RpcException>>>;

/// This table carries no timeout or sweep machinery: a pending request
/// resolves when a response arrives, or errors with an `InternalError`
/// exception if the channel closes first. Callers that need a deadline wrap
/// `send_request` in their own `tokio::time::timeout`.
pub struct Client {
    channel: Arc<ChannelManager>,
    next_id: AtomicI64,
    pending: Mutex<Pending>,
    batch_scope: Mutex<Option<Vec<Message>>>,
    batch_depth: AtomicI64,
}

impl Client {
    pub fn new(channel: Arc<dyn DuplexChannel>) -> Arc<Self> {
        let manager = ChannelManager::new(channel);
        Self::from_manager(manager)
    }

    pub(crate) fn from_manager(channel: Arc<ChannelManager>) -> Arc<Self> {
        Arc::new(Self {
            channel,
            next_id: AtomicI64::new(0),
            pending: Mutex::new(HashMap::new()),
            batch_scope: Mutex::new(None),
            batch_depth: AtomicI64::new(0),
        })
    }

    /// Subscribes to the channel and begins routing inbound responses to
    /// their pending requests. May be called at most once. Also spawns a
    /// reaper that fails every still-pending request once the channel
    /// closes, whether by local `close()` or the remote dropping the
    /// connection, so a `send_request` future never hangs on a caller who
    /// isn't separately polling `done()`.
    pub fn listen(self: &Arc<Self>) -> Result<(), EndpointError> {
        let this = Arc::clone(self);
        self.channel.listen(move |value| {
            let this = Arc::clone(&this);
            async move { this.handle_inbound(value).await }
        })?;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.channel.done().await;
            this.fail_all_pending();
        });

        Ok(())
    }

    pub fn close(&self) {
        self.fail_all_pending();
        self.channel.close();
    }

    pub async fn done(&self) {
        self.channel.done().await;
        self.fail_all_pending();
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    fn next_id(&self) -> Id {
        Id::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().unwrap();
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(RpcException::new(
                crate::error::ErrorCode::InternalError,
                "channel closed with request still pending",
            )));
        }
    }

    /// Sends a request, returning a future that resolves to its matched
    /// response. Registration and enqueueing happen synchronously, before
    /// this method returns — not when the returned future is polled — so
    /// that calling this several times inside [`Client::with_batch`] queues
    /// all of them before the batch is flushed, even though none of the
    /// returned futures has been awaited yet.
    pub fn send_request(
        self: &Arc<Self>,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> BoxFuture<'static, Result<Value, RpcException>> {
        if self.channel.is_closed() {
            return Box::pin(async {
                Err(RpcException::new(
                    crate::error::ErrorCode::InternalError,
                    "endpoint is closed",
                ))
            });
        }

        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id.clone(), tx);

        let message = Message::request(method, params, id.clone());
        self.enqueue(message);

        let this = Arc::clone(self);
        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => {
                    this.pending.lock().unwrap().remove(&id);
                    Err(RpcException::new(
                        crate::error::ErrorCode::InternalError,
                        "channel closed with request still pending",
                    ))
                }
            }
        })
    }

    /// Sends a notification: fire-and-forget, no response is ever awaited.
    pub fn send_notification(&self, method: impl Into<String>, params: Option<Value>) {
        if self.channel.is_closed() {
            return;
        }
        self.enqueue(Message::notification(method, params));
    }

    /// Runs `body` synchronously, collecting every request and notification
    /// sent inside it into a single batch flushed as one outbound array as
    /// soon as `body` returns. `body` must not await the futures
    /// `send_request` returns — doing so would block on a response to a
    /// request that has not been flushed yet — it should instead return them
    /// for the caller to await afterward. Nested calls accumulate into the
    /// same outer batch rather than sending nested arrays.
    pub fn with_batch<F, T>(self: &Arc<Self>, body: F) -> T
    where
        F: FnOnce(&Arc<Self>) -> T,
    {
        let entering = self.batch_depth.fetch_add(1, Ordering::SeqCst) == 0;
        if entering {
            *self.batch_scope.lock().unwrap() = Some(Vec::new());
        }

        let result = body(self);

        if self.batch_depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            let batch = self.batch_scope.lock().unwrap().take();
            if let Some(items) = batch {
                if !items.is_empty() {
                    self.channel.add(serde_json::to_value(&Message::Batch(items)).unwrap());
                }
            }
        }

        result
    }

    fn enqueue(&self, message: Message) {
        let mut scope = self.batch_scope.lock().unwrap();
        if let Some(items) = scope.as_mut() {
            items.push(message);
        } else {
            drop(scope);
            self.channel.add(serde_json::to_value(&message).unwrap());
        }
    }

    pub(crate) async fn handle_inbound(self: Arc<Self>, value: Value) {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.route_one(item);
                }
            }
            other => self.route_one(other),
        }
    }

    fn route_one(&self, value: Value) {
        if !looks_like_response(&value) {
            return;
        }

        let id = match value.as_object().and_then(|map| map.get("id")) {
            Some(Value::String(s)) => Id::String(s.clone()),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(n) => Id::Number(n),
                None => return,
            },
            _ => return,
        };

        let sender = self.pending.lock().unwrap().remove(&id);
        let Some(sender) = sender else { return };

        let map = match value.as_object() {
            Some(map) => map,
            None => return,
        };
        let result = if let Some(error_value) = map.get("error") {
            match RpcException::from_value(error_value.clone()) {
                Some(exception) => Err(exception),
                None => Err(RpcException::new(
                    crate::error::ErrorCode::InternalError,
                    "malformed error response",
                )),
            }
        } else {
            Ok(map.get("result").cloned().unwrap_or(Value::Null))
        };

        let _ = sender.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use serde_json::json;

    #[tokio::test]
    async fn send_request_resolves_on_matching_response() {
        let (client_side, server_side) = MemoryChannel::pair();
        let client = Client::new(client_side);
        client.listen().unwrap();

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.send_request("count", None).await })
        };

        let mut stream = {
            use futures::StreamExt;
            server_side.take_input()
        };
        let request = {
            use futures::StreamExt;
            stream.next().await.unwrap()
        };
        let id = request["id"].clone();
        server_side.send(json!({"jsonrpc": "2.0", "result": 1, "id": id}));

        let result = pending.await.unwrap().unwrap();
        assert_eq!(result, json!(1));
    }

    #[tokio::test]
    async fn send_request_surfaces_error_response() {
        let (client_side, server_side) = MemoryChannel::pair();
        let client = Client::new(client_side);
        client.listen().unwrap();

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.send_request("divide", None).await })
        };

        let mut stream = {
            use futures::StreamExt;
            server_side.take_input()
        };
        let request = {
            use futures::StreamExt;
            stream.next().await.unwrap()
        };
        let id = request["id"].clone();
        server_side.send(json!({"jsonrpc": "2.0", "error": {"code": 1, "message": "Cannot divide by zero."}, "id": id}));

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.code, 1);
    }

    #[tokio::test]
    async fn with_batch_sends_one_array_for_everything_inside() {
        let (client_side, server_side) = MemoryChannel::pair();
        let client = Client::new(client_side);
        client.listen().unwrap();

        client.with_batch(|client| {
            client.send_notification("log", Some(json!("a")));
            client.send_notification("log", Some(json!("b")));
        });

        let mut stream = {
            use futures::StreamExt;
            server_side.take_input()
        };
        let batch = {
            use futures::StreamExt;
            tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
                .await
                .unwrap()
                .unwrap()
        };
        assert!(batch.is_array());
        assert_eq!(batch.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn closing_fails_pending_requests() {
        let (client_side, _server_side) = MemoryChannel::pair();
        let client = Client::new(client_side);
        client.listen().unwrap();

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.send_request("count", None).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.close();

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InternalError as i32);
    }
}
