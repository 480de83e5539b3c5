//! # gateway-client
//!
//! Session layer of a real-time gateway client: one ordered, resumable
//! connection per shard, outbound rate limiting, reconnect decisions, and
//! reconciliation of every dispatch against a pluggable cache.
//!
//! ## Example
//!
//! ```ignore
//! use gateway_cache::InMemoryStore;
//! use gateway_client::{ConnectionSession, SessionConfig};
//! use std::sync::Arc;
//!
//! let session = ConnectionSession::new(
//!     SessionConfig::new("wss://gateway.example.com", token).with_intents(513),
//!     Arc::new(InMemoryStore::new()),
//! );
//! let handle = session.handle();
//! let mut events = handle.subscribe();
//! tokio::spawn(session.run());
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event.dispatch.event_type());
//! }
//! ```

pub mod bridge;
pub mod error;
pub mod protocol;
pub mod ratelimit;
pub mod reconnect;
pub mod session;

pub use bridge::DispatchBridge;
pub use error::{SendError, SessionError, SessionResult};
pub use protocol::{DecodeError, EncodeError, OpCode, Payload, PayloadCodec, PayloadData};
pub use ratelimit::RateLimiter;
pub use reconnect::{GiveUp, NextState, Outcome, ReconnectAttempt, ReconnectConfig, ReconnectContext};
pub use session::{
    ConnectionSession, Diagnostic, GatewayEvent, SessionConfig, SessionHandle, ShardGroup,
};
