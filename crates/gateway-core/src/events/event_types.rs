//! Dispatch event names
//!
//! The closed table of `t` values the client understands. The server set grows
//! over time; names missing here are rejected by the codec rather than dropped.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! event_table {
    ($($(#[$doc:meta])* $variant:ident => $wire:literal,)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum GatewayEventType {
            $($(#[$doc])* $variant,)+
        }

        impl GatewayEventType {
            /// Every known event type, in table order
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Wire name, as sent in `t`
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }
    };
}

event_table! {
    /// Handshake confirmed after IDENTIFY
    Ready => "READY",
    /// Replay finished after RESUME
    Resumed => "RESUMED",
    GuildCreate => "GUILD_CREATE",
    GuildUpdate => "GUILD_UPDATE",
    /// Also sent for outages, with `unavailable` set
    GuildDelete => "GUILD_DELETE",
    GuildRoleCreate => "GUILD_ROLE_CREATE",
    GuildRoleUpdate => "GUILD_ROLE_UPDATE",
    GuildRoleDelete => "GUILD_ROLE_DELETE",
    ChannelCreate => "CHANNEL_CREATE",
    ChannelUpdate => "CHANNEL_UPDATE",
    ChannelDelete => "CHANNEL_DELETE",
    MessageCreate => "MESSAGE_CREATE",
    MessageUpdate => "MESSAGE_UPDATE",
    MessageDelete => "MESSAGE_DELETE",
    MessageReactionAdd => "MESSAGE_REACTION_ADD",
    MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
    GuildMemberAdd => "GUILD_MEMBER_ADD",
    GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
    GuildMemberRemove => "GUILD_MEMBER_REMOVE",
    PresenceUpdate => "PRESENCE_UPDATE",
    TypingStart => "TYPING_START",
    /// The connected user changed
    UserUpdate => "USER_UPDATE",
}

impl GatewayEventType {
    /// Look up an event type by its wire name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.as_str() == name)
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_resolves() {
        for &event in GatewayEventType::ALL {
            assert_eq!(GatewayEventType::from_name(event.as_str()), Some(event));
        }
        assert_eq!(GatewayEventType::ALL.len(), 22);
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(GatewayEventType::from_name("INTEGRATION_CREATE"), None);
        assert_eq!(GatewayEventType::from_name("ready"), None);
    }

    #[test]
    fn test_serde_matches_wire_name() {
        for &event in GatewayEventType::ALL {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.as_str()));
        }
    }
}
