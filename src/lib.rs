// Copyright (c) 2025 Mauka MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! A transport-agnostic JSON-RPC 2.0 protocol engine.
//!
//! This crate implements the wire format, method dispatch, and request
//! correlation defined by the [JSON-RPC 2.0 specification](https://www.jsonrpc.org/specification),
//! decoupled from any particular transport. A [`DuplexChannel`] is the one
//! thing callers must supply: a source of decoded JSON values and a sink for
//! them. Three endpoint roles are built on top of it:
//!
//! - [`Client`]: sends requests and notifications, correlates responses.
//! - [`Server`]: registers method handlers and a fallback chain, dispatches
//!   inbound requests and notifications, and reports uncaught handler
//!   exceptions.
//! - [`Peer`]: co-hosts a `Client` and a `Server` over one channel,
//!   demultiplexing inbound traffic by shape.
//!
//! # Architecture
//!
//! - Strict separation between wire-facing errors ([`RpcException`]) and
//!   local programmer-misuse errors ([`EndpointError`])
//! - Manual, shape-driven decoding of inbound JSON so validation failures
//!   carry the exact error strings the protocol mandates
//! - Async-first, built on `tokio`
//! - No global or singleton state: every endpoint owns its own channel,
//!   registry, and pending-request table

pub mod channel;
pub mod client;
pub mod codec;
pub mod error;
pub mod message;
pub mod params;
pub mod peer;
pub mod server;

pub use channel::{ChannelManager, DuplexChannel, MemoryChannel};
pub use client::Client;
pub use codec::{decode, decode_message, encode};
pub use error::{EndpointError, ErrorCode, RpcException};
pub use message::{Id, Message};
pub use params::Params;
pub use peer::Peer;
pub use server::Server;

/// Version information for this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
