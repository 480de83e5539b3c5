//! Connection state vocabulary
//!
//! [`ConnectionState`] is what the session reports through its state watch.
//! [`GatewayStateChange`] is the internal event pushed through the dispatch
//! pipeline so the cache can react to transitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle of one gateway session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Opening the socket and waiting for HELLO
    #[default]
    Connecting,
    /// IDENTIFY sent, waiting for READY
    Identifying,
    /// RESUME sent, waiting for RESUMED
    Resuming,
    /// Handshake confirmed
    Connected,
    /// Waiting out a backoff before the next attempt
    Reconnecting,
    /// Terminal: gave up or stopped
    Disconnected,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Whether user payloads may be written
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "CONNECTING",
            Self::Identifying => "IDENTIFYING",
            Self::Resuming => "RESUMING",
            Self::Connected => "CONNECTED",
            Self::Reconnecting => "RECONNECTING",
            Self::Disconnected => "DISCONNECTED",
        };
        f.write_str(name)
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Stopped on request
    Stopped,
    /// Reconnect policy gave up; the text is the rendered cause
    GaveUp(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::GaveUp(cause) => write!(f, "gave up: {cause}"),
        }
    }
}

/// Internal connection transition, delivered as a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStateChange {
    /// Handshake confirmed by READY or RESUMED
    Connected,
    /// A retry was scheduled
    RetryStarted {
        iteration: u32,
        resume: bool,
        backoff: Duration,
    },
    /// A retry streak ended with a confirmed connection
    RetrySucceeded { attempts: u32 },
    /// Session id and sequence were discarded; cached state may be stale
    SessionInvalidated,
    /// The session ended for good
    Disconnected { reason: DisconnectReason },
}

/// `[index, count]` pair identifying one shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct ShardInfo {
    pub index: u32,
    pub count: u32,
}

impl ShardInfo {
    #[must_use]
    pub const fn new(index: u32, count: u32) -> Self {
        Self { index, count }
    }

    /// A single unsharded connection
    #[must_use]
    pub const fn single() -> Self {
        Self::new(0, 1)
    }
}

impl Default for ShardInfo {
    fn default() -> Self {
        Self::single()
    }
}

impl From<[u32; 2]> for ShardInfo {
    fn from([index, count]: [u32; 2]) -> Self {
        Self { index, count }
    }
}

impl From<ShardInfo> for [u32; 2] {
    fn from(shard: ShardInfo) -> Self {
        [shard.index, shard.count]
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.index, self.count)
    }
}
