//! Session configuration

use crate::protocol::{IdentifyProperties, PresenceUpdatePayload};
use crate::reconnect::ReconnectConfig;
use gateway_common::ClientConfig;
use gateway_core::ShardInfo;
use std::time::Duration;

/// Everything one [`ConnectionSession`](super::ConnectionSession) needs
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Initial gateway URL; READY may supply a different one for resuming
    pub url: String,
    pub token: String,
    pub intents: u64,
    pub shard: ShardInfo,
    pub properties: IdentifyProperties,
    /// Presence sent with IDENTIFY
    pub presence: Option<PresenceUpdatePayload>,
    /// Bound on opening the socket and on waiting for HELLO
    pub connect_timeout: Duration,
    /// Outbound frames allowed per `rate_limit_period`
    pub rate_limit_capacity: u32,
    pub rate_limit_period: Duration,
    pub reconnect: ReconnectConfig,
    /// Capacity of the event and diagnostic broadcast channels
    pub event_buffer: usize,
    /// Capacity of the user payload queue
    pub outbound_buffer: usize,
}

impl SessionConfig {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_RATE_LIMIT_CAPACITY: u32 = 120;
    pub const DEFAULT_RATE_LIMIT_PERIOD: Duration = Duration::from_secs(60);

    #[must_use]
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            intents: 0,
            shard: ShardInfo::single(),
            properties: IdentifyProperties::default(),
            presence: None,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            rate_limit_capacity: Self::DEFAULT_RATE_LIMIT_CAPACITY,
            rate_limit_period: Self::DEFAULT_RATE_LIMIT_PERIOD,
            reconnect: ReconnectConfig::default(),
            event_buffer: 1024,
            outbound_buffer: 64,
        }
    }

    #[must_use]
    pub fn with_intents(mut self, intents: u64) -> Self {
        self.intents = intents;
        self
    }

    #[must_use]
    pub fn with_shard(mut self, shard: ShardInfo) -> Self {
        self.shard = shard;
        self
    }

    #[must_use]
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, capacity: u32, period: Duration) -> Self {
        self.rate_limit_capacity = capacity;
        self.rate_limit_period = period;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

impl From<&ClientConfig> for SessionConfig {
    fn from(config: &ClientConfig) -> Self {
        Self::new(&config.gateway.url, &config.gateway.token)
            .with_intents(config.gateway.intents)
            .with_shard(ShardInfo::new(config.shard.index, config.shard.count))
            .with_connect_timeout(config.gateway.connect_timeout)
            .with_rate_limit(config.rate_limit.capacity, config.rate_limit.period)
            .with_reconnect(config.reconnect.into())
    }
}
