//! Store boundary
//!
//! A [`StoreAction`] is built once per dispatch and consumed by value by
//! [`Store::execute`]. Implementations must tolerate concurrent calls; the
//! caller guarantees actions for the same shard arrive one at a time and in
//! decode order.

use async_trait::async_trait;
use gateway_core::{
    ChannelDeleteEvent, ChannelPayload, GatewayEventType, GuildCreate, GuildCreateEvent,
    GuildDeleteEvent, GuildEvent, GuildMemberAddEvent, GuildMemberRemoveEvent,
    GuildMemberUpdateEvent, GuildRoleDeleteEvent, GuildRoleEvent, MemberPayload,
    MessageCreateEvent, MessageDeleteEvent, MessageEvent, PresenceEvent, ReadyEvent,
    RolePayload, UserEvent, UserPayload,
};
use std::fmt;
use std::sync::Arc;

/// Result type for store operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Shared store handle
pub type SharedStore = Arc<dyn Store>;

/// Cache implementation injected by the embedding application
#[async_trait]
pub trait Store: Send + Sync {
    /// Apply one action, returning the state it replaced (if any)
    async fn execute(&self, action: StoreAction) -> CacheResult<Option<PreviousState>>;
}

/// One cache request, scoped to the shard that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct StoreAction {
    pub shard: u32,
    pub kind: StoreActionKind,
}

impl StoreAction {
    #[must_use]
    pub fn new(shard: u32, kind: StoreActionKind) -> Self {
        Self { shard, kind }
    }
}

/// What the store should do
#[derive(Debug, Clone, PartialEq)]
pub enum StoreActionKind {
    /// Record the current user and the initial (unavailable) guild list
    Ready(Box<ReadyEvent>),
    UpsertGuild(GuildCreate),
    UpdateGuild(GuildEvent),
    RemoveGuild(GuildDeleteEvent),
    UpsertRole(GuildRoleEvent),
    RemoveRole(GuildRoleDeleteEvent),
    UpsertChannel(ChannelPayload),
    RemoveChannel(ChannelDeleteEvent),
    UpsertMessage(Box<MessageCreateEvent>),
    UpdateMessage(MessageEvent),
    RemoveMessage(MessageDeleteEvent),
    AddMember(GuildMemberAddEvent),
    UpdateMember(GuildMemberUpdateEvent),
    RemoveMember(GuildMemberRemoveEvent),
    UpdatePresence(PresenceEvent),
    UpdateUser(UserEvent),
    /// Drop everything cached for the shard
    Invalidate(InvalidationCause),
}

impl StoreActionKind {
    /// Short name for logs and error reports
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::UpsertGuild(_) => "upsert_guild",
            Self::UpdateGuild(_) => "update_guild",
            Self::RemoveGuild(_) => "remove_guild",
            Self::UpsertRole(_) => "upsert_role",
            Self::RemoveRole(_) => "remove_role",
            Self::UpsertChannel(_) => "upsert_channel",
            Self::RemoveChannel(_) => "remove_channel",
            Self::UpsertMessage(_) => "upsert_message",
            Self::UpdateMessage(_) => "update_message",
            Self::RemoveMessage(_) => "remove_message",
            Self::AddMember(_) => "add_member",
            Self::UpdateMember(_) => "update_member",
            Self::RemoveMember(_) => "remove_member",
            Self::UpdatePresence(_) => "update_presence",
            Self::UpdateUser(_) => "update_user",
            Self::Invalidate(_) => "invalidate",
        }
    }
}

/// Why a shard's cached state is being dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationCause {
    /// The session was closed deliberately
    Logout,
    /// The session was lost and must be rehydrated from scratch
    HardReconnect,
}

impl fmt::Display for InvalidationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logout => write!(f, "logout"),
            Self::HardReconnect => write!(f, "hard_reconnect"),
        }
    }
}

/// Cached value replaced or removed by an action
#[derive(Debug, Clone, PartialEq)]
pub enum PreviousState {
    /// Guild metadata, without nested channels, roles, or members
    Guild(Box<GuildCreateEvent>),
    Channel(ChannelPayload),
    Role(RolePayload),
    Member(MemberPayload),
    Message(Box<MessageCreateEvent>),
    Presence(PresenceEvent),
    User(UserPayload),
}

/// Store failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache rejected {action}: {reason}")]
    Rejected {
        action: &'static str,
        reason: String,
    },
}

/// A store failure tied to the dispatch that caused it
///
/// Published on the session's cache-error channel. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("shard {shard}: {action} for {} failed: {source}", event_label(.event))]
pub struct CacheExecutionError {
    pub shard: u32,
    /// `None` for the internal state-change event
    pub event: Option<GatewayEventType>,
    pub action: &'static str,
    #[source]
    pub source: CacheError,
}

fn event_label(event: &Option<GatewayEventType>) -> &'static str {
    event.map_or("state change", GatewayEventType::as_str)
}
