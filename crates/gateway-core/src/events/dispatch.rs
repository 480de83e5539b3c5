//! Typed dispatch events
//!
//! One variant per [`GatewayEventType`], plus the internal state-change event
//! the client synthesises itself. Matching on [`Dispatch`] is exhaustive, so a
//! new event type cannot be added without every consumer deciding what to do
//! with it.

use super::event_types::GatewayEventType;
use super::payloads::{
    ChannelDeleteEvent, ChannelPayload, GuildCreate, GuildDeleteEvent, GuildEvent,
    GuildMemberAddEvent, GuildMemberRemoveEvent, GuildMemberUpdateEvent, GuildRoleDeleteEvent,
    GuildRoleEvent, MessageCreateEvent, MessageDeleteEvent, MessageEvent, MessageReactionEvent,
    PresenceEvent, ReadyEvent, ResumedEvent, TypingStartEvent, UserEvent,
};
use crate::state::GatewayStateChange;
use serde::ser::Error as _;
use serde_json::Value;

/// A decoded dispatch event
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Ready(Box<ReadyEvent>),
    Resumed(ResumedEvent),

    GuildCreate(GuildCreate),
    GuildUpdate(GuildEvent),
    GuildDelete(GuildDeleteEvent),

    GuildRoleCreate(GuildRoleEvent),
    GuildRoleUpdate(GuildRoleEvent),
    GuildRoleDelete(GuildRoleDeleteEvent),

    ChannelCreate(ChannelPayload),
    ChannelUpdate(ChannelPayload),
    ChannelDelete(ChannelDeleteEvent),

    MessageCreate(Box<MessageCreateEvent>),
    MessageUpdate(MessageEvent),
    MessageDelete(MessageDeleteEvent),

    MessageReactionAdd(MessageReactionEvent),
    MessageReactionRemove(MessageReactionEvent),

    GuildMemberAdd(GuildMemberAddEvent),
    GuildMemberUpdate(GuildMemberUpdateEvent),
    GuildMemberRemove(GuildMemberRemoveEvent),

    PresenceUpdate(PresenceEvent),
    TypingStart(TypingStartEvent),
    UserUpdate(UserEvent),

    /// Synthesised by the client on connection state transitions. Never sent
    /// or received on the wire.
    GatewayStateChange(GatewayStateChange),
}

impl Dispatch {
    /// Wire event type, or `None` for the internal state-change event
    #[must_use]
    pub const fn event_type(&self) -> Option<GatewayEventType> {
        let event = match self {
            Self::Ready(_) => GatewayEventType::Ready,
            Self::Resumed(_) => GatewayEventType::Resumed,
            Self::GuildCreate(_) => GatewayEventType::GuildCreate,
            Self::GuildUpdate(_) => GatewayEventType::GuildUpdate,
            Self::GuildDelete(_) => GatewayEventType::GuildDelete,
            Self::GuildRoleCreate(_) => GatewayEventType::GuildRoleCreate,
            Self::GuildRoleUpdate(_) => GatewayEventType::GuildRoleUpdate,
            Self::GuildRoleDelete(_) => GatewayEventType::GuildRoleDelete,
            Self::ChannelCreate(_) => GatewayEventType::ChannelCreate,
            Self::ChannelUpdate(_) => GatewayEventType::ChannelUpdate,
            Self::ChannelDelete(_) => GatewayEventType::ChannelDelete,
            Self::MessageCreate(_) => GatewayEventType::MessageCreate,
            Self::MessageUpdate(_) => GatewayEventType::MessageUpdate,
            Self::MessageDelete(_) => GatewayEventType::MessageDelete,
            Self::MessageReactionAdd(_) => GatewayEventType::MessageReactionAdd,
            Self::MessageReactionRemove(_) => GatewayEventType::MessageReactionRemove,
            Self::GuildMemberAdd(_) => GatewayEventType::GuildMemberAdd,
            Self::GuildMemberUpdate(_) => GatewayEventType::GuildMemberUpdate,
            Self::GuildMemberRemove(_) => GatewayEventType::GuildMemberRemove,
            Self::PresenceUpdate(_) => GatewayEventType::PresenceUpdate,
            Self::TypingStart(_) => GatewayEventType::TypingStart,
            Self::UserUpdate(_) => GatewayEventType::UserUpdate,
            Self::GatewayStateChange(_) => return None,
        };
        Some(event)
    }

    /// Decode the `d` field of a dispatch frame whose `t` is `event`
    pub fn from_parts(event: GatewayEventType, data: Value) -> serde_json::Result<Self> {
        use serde_json::from_value;

        Ok(match event {
            GatewayEventType::Ready => Self::Ready(Box::new(from_value(data)?)),
            GatewayEventType::Resumed => Self::Resumed(from_value(data)?),
            GatewayEventType::GuildCreate => Self::GuildCreate(from_value(data)?),
            GatewayEventType::GuildUpdate => Self::GuildUpdate(from_value(data)?),
            GatewayEventType::GuildDelete => Self::GuildDelete(from_value(data)?),
            GatewayEventType::GuildRoleCreate => Self::GuildRoleCreate(from_value(data)?),
            GatewayEventType::GuildRoleUpdate => Self::GuildRoleUpdate(from_value(data)?),
            GatewayEventType::GuildRoleDelete => Self::GuildRoleDelete(from_value(data)?),
            GatewayEventType::ChannelCreate => Self::ChannelCreate(from_value(data)?),
            GatewayEventType::ChannelUpdate => Self::ChannelUpdate(from_value(data)?),
            GatewayEventType::ChannelDelete => Self::ChannelDelete(from_value(data)?),
            GatewayEventType::MessageCreate => Self::MessageCreate(Box::new(from_value(data)?)),
            GatewayEventType::MessageUpdate => Self::MessageUpdate(from_value(data)?),
            GatewayEventType::MessageDelete => Self::MessageDelete(from_value(data)?),
            GatewayEventType::MessageReactionAdd => Self::MessageReactionAdd(from_value(data)?),
            GatewayEventType::MessageReactionRemove => {
                Self::MessageReactionRemove(from_value(data)?)
            }
            GatewayEventType::GuildMemberAdd => Self::GuildMemberAdd(from_value(data)?),
            GatewayEventType::GuildMemberUpdate => Self::GuildMemberUpdate(from_value(data)?),
            GatewayEventType::GuildMemberRemove => Self::GuildMemberRemove(from_value(data)?),
            GatewayEventType::PresenceUpdate => Self::PresenceUpdate(from_value(data)?),
            GatewayEventType::TypingStart => Self::TypingStart(from_value(data)?),
            GatewayEventType::UserUpdate => Self::UserUpdate(from_value(data)?),
        })
    }

    /// Serialize the event body for the `d` field
    ///
    /// Fails for the internal state-change event.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        use serde_json::to_value;

        match self {
            Self::Ready(event) => to_value(event),
            Self::Resumed(event) => to_value(event),
            Self::GuildCreate(event) => to_value(event),
            Self::GuildUpdate(event) => to_value(event),
            Self::GuildDelete(event) => to_value(event),
            Self::GuildRoleCreate(event) | Self::GuildRoleUpdate(event) => to_value(event),
            Self::GuildRoleDelete(event) => to_value(event),
            Self::ChannelCreate(event) | Self::ChannelUpdate(event) => to_value(event),
            Self::ChannelDelete(event) => to_value(event),
            Self::MessageCreate(event) => to_value(event),
            Self::MessageUpdate(event) => to_value(event),
            Self::MessageDelete(event) => to_value(event),
            Self::MessageReactionAdd(event) | Self::MessageReactionRemove(event) => {
                to_value(event)
            }
            Self::GuildMemberAdd(event) => to_value(event),
            Self::GuildMemberUpdate(event) => to_value(event),
            Self::GuildMemberRemove(event) => to_value(event),
            Self::PresenceUpdate(event) => to_value(event),
            Self::TypingStart(event) => to_value(event),
            Self::UserUpdate(event) => to_value(event),
            Self::GatewayStateChange(change) => Err(serde_json::Error::custom(format!(
                "internal event {change:?} has no wire form"
            ))),
        }
    }

    /// Shorthand for an internal state-change event
    #[must_use]
    pub const fn state_change(change: GatewayStateChange) -> Self {
        Self::GatewayStateChange(change)
    }
}

impl From<GatewayStateChange> for Dispatch {
    fn from(change: GatewayStateChange) -> Self {
        Self::GatewayStateChange(change)
    }
}
