//! Configuration structs

mod client_config;

pub use client_config::{
    ClientConfig, ConfigError, Environment, GatewayConfig, RateLimitConfig, ReconnectSettings,
    ShardConfig,
};
