//! Gateway session
//!
//! [`ConnectionSession`] owns one socket at a time and keeps the logical
//! session alive across reconnects; [`SessionHandle`] is how the embedding
//! application talks to it.

mod config;
mod connection;
mod events;
mod group;
mod handle;
mod heartbeat;
mod sequence;

pub use config::SessionConfig;
pub use connection::ConnectionSession;
pub use events::{Diagnostic, GatewayEvent};
pub use group::ShardGroup;
pub use handle::SessionHandle;
