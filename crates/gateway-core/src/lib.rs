//! # gateway-core
//!
//! Domain layer for the gateway client: identifiers, the typed event model
//! decoded from dispatch frames, and the connection state vocabulary shared by
//! the cache and client crates. No I/O lives here.

pub mod events;
pub mod state;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use events::{
    AttachmentPayload, ChannelDeleteEvent, ChannelPayload, Dispatch, GatewayEventType, GuildCreate,
    GuildCreateEvent, GuildDeleteEvent, GuildEvent, GuildMemberAddEvent, GuildMemberRemoveEvent,
    GuildMemberUpdateEvent, GuildRoleDeleteEvent, GuildRoleEvent, MemberPayload,
    MessageCreateEvent, MessageDeleteEvent, MessageEvent, MessageReactionEvent, PresenceEvent,
    ReadyEvent, ResumedEvent, RolePayload, TypingStartEvent, UnavailableGuild, UserEvent,
    UserIdPayload, UserPayload, UserStatus,
};
pub use state::{ConnectionState, DisconnectReason, GatewayStateChange, ShardInfo};
pub use value_objects::{Snowflake, SnowflakeParseError};
