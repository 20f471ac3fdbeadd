//! WebSocket client for the live-poll realtime layer.
//!
//! This module provides three ways to consume the realtime feed:
//! - [`PollWsClient`]: opens one authenticated connection and exposes it
//!   as an envelope sink/stream pair
//! - [`ReconnectingStream`]: stream wrapper that survives disconnects
//!   with exponential backoff, for read-only consumers
//! - [`LiveConnection`]: the full connection manager with a listener
//!   registry, `send`, and automatic reconnect with re-authentication
//!
//! # Connection Management
//!
//! The realtime server may drop idle or rebalanced connections at any
//! time. Production consumers should use [`LiveConnection`] (or wrap a
//! subscription in [`ReconnectingStream`]) so the feed recovers without
//! user-visible errors.

mod backoff;
mod client;
mod connection;
mod dispatch;
mod stream;

pub use backoff::ReconnectConfig;
pub use client::{EnvelopeSink, EnvelopeStream, PollWsClient};
pub use connection::{ConnectionState, Connector, LiveConnection};
pub use dispatch::{EventDispatcher, Subscription};
pub use stream::ReconnectingStream;

// Re-export commonly used types for convenience
pub use crate::types::{AuthHandshake, ClientIdentity, Envelope, PollResults, ServerEvent};
