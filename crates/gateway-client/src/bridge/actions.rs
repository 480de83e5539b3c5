//! Handler table: dispatch → store action

use gateway_cache::{InvalidationCause, StoreActionKind};
use gateway_core::{Dispatch, GatewayStateChange};

/// The store action a dispatch maps to, or `None` if it leaves the cache alone
///
/// The match is exhaustive, so a new dispatch variant must be given a row
/// here before it compiles.
#[must_use]
pub fn store_action(dispatch: &Dispatch) -> Option<StoreActionKind> {
    let kind = match dispatch {
        Dispatch::Ready(ready) => StoreActionKind::Ready(ready.clone()),
        Dispatch::GuildCreate(guild) => StoreActionKind::UpsertGuild(guild.clone()),
        Dispatch::GuildUpdate(guild) => StoreActionKind::UpdateGuild(guild.clone()),
        Dispatch::GuildDelete(guild) => StoreActionKind::RemoveGuild(guild.clone()),

        Dispatch::GuildRoleCreate(role) | Dispatch::GuildRoleUpdate(role) => {
            StoreActionKind::UpsertRole(role.clone())
        }
        Dispatch::GuildRoleDelete(role) => StoreActionKind::RemoveRole(role.clone()),

        Dispatch::ChannelCreate(channel) | Dispatch::ChannelUpdate(channel) => {
            StoreActionKind::UpsertChannel(channel.clone())
        }
        Dispatch::ChannelDelete(channel) => StoreActionKind::RemoveChannel(channel.clone()),

        Dispatch::MessageCreate(message) => StoreActionKind::UpsertMessage(message.clone()),
        Dispatch::MessageUpdate(message) => StoreActionKind::UpdateMessage(message.clone()),
        Dispatch::MessageDelete(message) => StoreActionKind::RemoveMessage(message.clone()),

        Dispatch::GuildMemberAdd(member) => StoreActionKind::AddMember(member.clone()),
        Dispatch::GuildMemberUpdate(member) => StoreActionKind::UpdateMember(member.clone()),
        Dispatch::GuildMemberRemove(member) => StoreActionKind::RemoveMember(member.clone()),

        Dispatch::PresenceUpdate(presence) => StoreActionKind::UpdatePresence(presence.clone()),
        Dispatch::UserUpdate(user) => StoreActionKind::UpdateUser(user.clone()),

        Dispatch::GatewayStateChange(change) => return invalidation(change),

        Dispatch::Resumed(_)
        | Dispatch::MessageReactionAdd(_)
        | Dispatch::MessageReactionRemove(_)
        | Dispatch::TypingStart(_) => return None,
    };

    Some(kind)
}

fn invalidation(change: &GatewayStateChange) -> Option<StoreActionKind> {
    let cause = match change {
        GatewayStateChange::Disconnected { .. } => InvalidationCause::Logout,
        GatewayStateChange::SessionInvalidated => InvalidationCause::HardReconnect,
        GatewayStateChange::Connected
        | GatewayStateChange::RetryStarted { .. }
        | GatewayStateChange::RetrySucceeded { .. } => return None,
    };
    Some(StoreActionKind::Invalidate(cause))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::{
        ChannelPayload, DisconnectReason, MessageReactionEvent, ResumedEvent, Snowflake,
    };

    fn channel() -> ChannelPayload {
        ChannelPayload {
            id: Snowflake::new(10),
            guild_id: Some(Snowflake::new(1)),
            name: Some("general".to_string()),
            channel_type: 0,
            position: 0,
            topic: None,
            parent_id: None,
        }
    }

    #[test]
    fn test_create_and_update_share_upsert() {
        let created = store_action(&Dispatch::ChannelCreate(channel()));
        let updated = store_action(&Dispatch::ChannelUpdate(channel()));

        assert_eq!(created, Some(StoreActionKind::UpsertChannel(channel())));
        assert_eq!(created, updated);
    }

    #[test]
    fn test_unhandled_events_pass_through() {
        assert_eq!(store_action(&Dispatch::Resumed(ResumedEvent {})), None);

        let reaction = MessageReactionEvent {
            user_id: Snowflake::new(2),
            channel_id: Snowflake::new(3),
            message_id: Snowflake::new(4),
            guild_id: None,
            emoji: "👍".to_string(),
        };
        assert_eq!(store_action(&Dispatch::MessageReactionAdd(reaction)), None);
    }

    #[test]
    fn test_state_changes_map_to_invalidation() {
        let stopped = Dispatch::GatewayStateChange(GatewayStateChange::Disconnected {
            reason: DisconnectReason::Stopped,
        });
        let invalidated = Dispatch::GatewayStateChange(GatewayStateChange::SessionInvalidated);
        let connected = Dispatch::GatewayStateChange(GatewayStateChange::Connected);

        assert_eq!(
            store_action(&stopped),
            Some(StoreActionKind::Invalidate(InvalidationCause::Logout))
        );
        assert_eq!(
            store_action(&invalidated),
            Some(StoreActionKind::Invalidate(InvalidationCause::HardReconnect))
        );
        assert_eq!(store_action(&connected), None);
    }
}
