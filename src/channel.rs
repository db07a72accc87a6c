// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! The duplex channel abstraction and the manager built on top of it.
//!
//! A [`DuplexChannel`] is the one thing this engine asks of a transport: a
//! source of decoded [`Message`]s and a sink for them. [`ChannelManager`]
//! wraps one channel, owns the single input subscription, and guarantees no
//! message is emitted after shutdown starts.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

use crate::error::EndpointError;

/// A duplex message channel: a source of decoded inbound messages and a sink
/// for outbound ones. Carries the framing-transform's *decoded* form
/// (`serde_json::Value`), one level below the engine's validated [`Message`]
/// enum — request validation is the Server/Client engines' job, not the
/// channel's. Object-safe so endpoints can be built generically over
/// `Arc<dyn DuplexChannel>` without a type parameter leaking into their
/// public API, the same way `Arc<dyn MethodHandler>` does for method
/// handlers.
pub trait DuplexChannel: Send + Sync {
    /// Consumes the inbound side, returning a stream of decoded values.
    /// Intended to be called exactly once; a second call returns an empty
    /// stream. Enforcing "exactly once" as a programmer error is
    /// [`ChannelManager::listen`]'s job, not this trait's.
    fn take_input(&self) -> BoxStream<'static, Value>;

    /// Enqueues an outbound value. Synchronous and non-blocking so that a
    /// silent no-op after `close()` is possible without the caller awaiting
    /// anything.
    fn send(&self, value: Value);

    /// Closes the output sink. Idempotent.
    fn close(&self);

    /// Whether `close()` has been called.
    fn is_closed(&self) -> bool;
}

/// Thin coordinator around one [`DuplexChannel`]: owns the input
/// subscription, forwards decoded messages to a consumer, exposes a `done`
/// future, and guarantees `add` after close is a silent no-op.
pub struct ChannelManager {
    channel: Arc<dyn DuplexChannel>,
    listened: AtomicBool,
    closed: AtomicBool,
    done_fired: AtomicBool,
    done_notify: Notify,
}

impl ChannelManager {
    pub fn new(channel: Arc<dyn DuplexChannel>) -> Arc<Self> {
        Arc::new(Self {
            channel,
            listened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            done_fired: AtomicBool::new(false),
            done_notify: Notify::new(),
        })
    }

    /// Subscribes to the channel's input, forwarding each decoded message to
    /// `consumer`. May be called at most once.
    pub fn listen<F, Fut>(self: &Arc<Self>, consumer: F) -> Result<(), EndpointError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.listened.swap(true, Ordering::SeqCst) {
            return Err(EndpointError::AlreadyListening);
        }

        if self.channel.is_closed() || self.closed.load(Ordering::SeqCst) {
            self.mark_done();
            return Ok(());
        }

        let mut stream = self.channel.take_input();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                if this.closed.load(Ordering::SeqCst) {
                    break;
                }
                consumer(message).await;
            }
            tracing::debug!("channel input exhausted, marking manager done");
            this.mark_done();
        });

        Ok(())
    }

    /// Enqueues `value`. A silent no-op if the channel is already closed.
    pub fn add(&self, value: Value) {
        if self.is_closed() {
            return;
        }
        self.channel.send(value);
    }

    /// Closes the manager. Idempotent; safe to call before `listen`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.channel.close();
        self.mark_done();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.channel.is_closed()
    }

    /// Resolves once the channel has closed, whether by local `close()`,
    /// remote input exhaustion, or the underlying channel reporting closed
    /// before `listen` was ever called.
    pub async fn done(&self) {
        loop {
            if self.done_fired.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.done_notify.notified();
            if self.done_fired.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    fn mark_done(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if !self.done_fired.swap(true, Ordering::SeqCst) {
            self.done_notify.notify_waiters();
        }
    }
}

/// An in-memory [`DuplexChannel`] backed by a pair of unbounded `mpsc`
/// queues. Ships for tests and for library consumers who want to run two
/// endpoints in-process without a real transport.
pub struct MemoryChannel {
    outbound: mpsc::UnboundedSender<Value>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
    closed: AtomicBool,
}

impl MemoryChannel {
    /// Builds a connected pair: messages sent on one side arrive as input on
    /// the other.
    pub fn pair() -> (Arc<MemoryChannel>, Arc<MemoryChannel>) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = Arc::new(MemoryChannel {
            outbound: tx_b,
            inbound: Mutex::new(Some(rx_a)),
            closed: AtomicBool::new(false),
        });
        let b = Arc::new(MemoryChannel {
            outbound: tx_a,
            inbound: Mutex::new(Some(rx_b)),
            closed: AtomicBool::new(false),
        });
        (a, b)
    }
}

impl DuplexChannel for MemoryChannel {
    fn take_input(&self) -> BoxStream<'static, Value> {
        match self.inbound.lock().expect("inbound mutex poisoned").take() {
            Some(mut rx) => futures::stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed(),
            None => futures::stream::empty().boxed(),
        }
    }

    fn send(&self, value: Value) {
        // An error here means the peer dropped its receiver; nothing to do
        // but let the message vanish, matching `add` after close semantics.
        let _ = self.outbound.send(value);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn listen_forwards_messages_and_completes_on_close() {
        let (a, b) = MemoryChannel::pair();
        let manager = ChannelManager::new(a);

        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = Arc::clone(&received);
        manager
            .listen(move |_msg| {
                received_clone.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .unwrap();

        b.send(json!({"jsonrpc": "2.0", "method": "ping", "id": 1}));
        b.close();

        tokio::time::timeout(std::time::Duration::from_secs(1), manager.done())
            .await
            .unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_listen_call_is_a_programmer_error() {
        let (a, _b) = MemoryChannel::pair();
        let manager = ChannelManager::new(a);
        manager.listen(|_| async {}).unwrap();
        let err = manager.listen(|_| async {}).unwrap_err();
        assert!(matches!(err, EndpointError::AlreadyListening));
    }

    #[tokio::test]
    async fn add_after_close_is_silent_no_op() {
        let (a, b) = MemoryChannel::pair();
        let manager = ChannelManager::new(a);
        manager.close();
        manager.add(json!({"jsonrpc": "2.0", "method": "ping", "id": 1}));
        // No panic, and the peer never receives anything because `send`
        // happened before `close` marked the manager closed server-side.
        drop(b);
    }

    #[tokio::test]
    async fn close_before_listen_leaves_manager_permanently_inert() {
        let (a, _b) = MemoryChannel::pair();
        let manager = ChannelManager::new(a);
        manager.close();
        manager.listen(|_| async {}).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), manager.done())
            .await
            .unwrap();
    }
}
