//! Gateway events
//!
//! Defines every dispatch event the client decodes from the gateway.

mod dispatch;
mod event_types;
mod payloads;

pub use dispatch::Dispatch;
pub use event_types::GatewayEventType;
pub use payloads::{
    AttachmentPayload, ChannelDeleteEvent, ChannelPayload, GuildCreate, GuildCreateEvent,
    GuildDeleteEvent, GuildEvent, GuildMemberAddEvent, GuildMemberRemoveEvent,
    GuildMemberUpdateEvent, GuildRoleDeleteEvent, GuildRoleEvent, MemberPayload,
    MessageCreateEvent, MessageDeleteEvent, MessageEvent, MessageReactionEvent, PresenceEvent,
    ReadyEvent, ResumedEvent, RolePayload, TypingStartEvent, UnavailableGuild, UserEvent,
    UserIdPayload, UserPayload, UserStatus,
};
