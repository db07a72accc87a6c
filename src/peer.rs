// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! The Peer role: a [`Client`] and a [`Server`] co-hosted over one channel,
//! demultiplexing inbound traffic by shape.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;

use crate::channel::{ChannelManager, DuplexChannel};
use crate::client::Client;
use crate::error::EndpointError;
use crate::message::looks_like_response;
use crate::server::Server;

/// A [`DuplexChannel`] wrapper that forwards outbound traffic to the real
/// channel but never yields input of its own: [`Peer`] owns the one real
/// input subscription and demultiplexes it by hand, so the `Client` and
/// `Server` it composes must never see the real stream themselves.
struct RoutedChannel {
    inner: Arc<dyn DuplexChannel>,
}

impl DuplexChannel for RoutedChannel {
    fn take_input(&self) -> BoxStream<'static, Value> {
        futures::stream::empty().boxed()
    }

    fn send(&self, value: Value) {
        self.inner.send(value);
    }

    fn close(&self) {
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Hosts a [`Client`] and a [`Server`] over a single channel. Inbound traffic
/// shaped like a response (carrying `result` or `error`) is routed to the
/// client's pending-request table; everything else is routed to the server's
/// dispatcher. A batch array is routed as a whole by inspecting its first
/// element, so a batch never splits across both conduits.
pub struct Peer {
    channel: Arc<ChannelManager>,
    client: Arc<Client>,
    server: Arc<Server>,
}

impl Peer {
    pub fn new(channel: Arc<dyn DuplexChannel>) -> Arc<Self> {
        let client_channel: Arc<dyn DuplexChannel> = Arc::new(RoutedChannel {
            inner: Arc::clone(&channel),
        });
        let server_channel: Arc<dyn DuplexChannel> = Arc::new(RoutedChannel {
            inner: Arc::clone(&channel),
        });

        Arc::new(Self {
            channel: ChannelManager::new(channel),
            client: Client::from_manager(ChannelManager::new(client_channel)),
            server: Server::from_manager(ChannelManager::new(server_channel)).into(),
        })
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Subscribes to the channel and begins demultiplexing. May be called at
    /// most once.
    pub fn listen(self: &Arc<Self>) -> Result<(), EndpointError> {
        let this = Arc::clone(self);
        self.channel.listen(move |value| {
            let this = Arc::clone(&this);
            async move { this.route(value).await }
        })?;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.channel.done().await;
            this.client.close();
            this.server.close();
        });

        Ok(())
    }

    async fn route(&self, value: Value) {
        match &value {
            Value::Array(items) => match items.first() {
                Some(first) if looks_like_response(first) => {
                    Arc::clone(&self.client).handle_inbound(value).await;
                }
                _ => {
                    Arc::clone(&self.server).handle_inbound(value).await;
                }
            },
            Value::Object(_) if looks_like_response(&value) => {
                Arc::clone(&self.client).handle_inbound(value).await;
            }
            _ => {
                Arc::clone(&self.server).handle_inbound(value).await;
            }
        }
    }

    pub fn close(&self) {
        self.client.close();
        self.server.close();
        self.channel.close();
    }

    pub async fn done(&self) {
        self.client.done().await;
        self.server.done().await;
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}
