//! # livepoll-rs
//!
//! Rust primitives for the live-poll realtime layer of an interactive
//! learning platform.
//!
//! This library provides both sides of the realtime WebSocket protocol:
//! - A reconnecting client that keeps one authenticated connection alive
//!   per UI surface and delivers typed events to subscribers
//! - A server-side connection registry that fans events out to every
//!   connection matching a target audience (user, department, or subject)
//!
//! ## Features
//!
//! - **Resilient connections**: exponential backoff with a bounded retry
//!   budget; the authentication handshake is re-sent on every reconnect
//! - **Type Safety**: newtypes for identifiers (UserId, DepartmentId,
//!   SubjectId) and typed views over the `{type, data}` wire envelope
//! - **Isolated listeners**: a panicking event handler is logged and
//!   skipped, never blocking delivery to the handlers after it
//! - **Testable by construction**: the connection manager takes its
//!   transport as an injected connector, so tests drive a fake
//!

// Public modules
pub mod error;
pub mod registry;
pub mod types;
pub mod websocket;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::{
    AuthHandshake, ClientIdentity, DepartmentId, Envelope, PollOptionResult, PollResults,
    ServerEvent, SubjectId, UserId, POLL_CLOSED, POLL_VOTE,
};

// Re-export the realtime client surface
pub use websocket::{
    ConnectionState, EventDispatcher, LiveConnection, PollWsClient, ReconnectConfig,
    ReconnectingStream, Subscription,
};

// Re-export the server-side registry
pub use registry::{Audience, ConnectionId, ConnectionRegistry};
