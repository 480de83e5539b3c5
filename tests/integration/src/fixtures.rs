//! Test fixtures
//!
//! Reusable dispatch payloads for session tests.

use gateway_core::{
    ChannelPayload, Dispatch, GuildCreate, GuildCreateEvent, ReadyEvent, Snowflake,
    UnavailableGuild, UserPayload,
};

/// Token the mock gateway expects
pub const TEST_TOKEN: &str = "test-token";

/// Intents the tests identify with
pub const TEST_INTENTS: u64 = 513;

pub fn bot_user() -> UserPayload {
    UserPayload {
        id: Snowflake::new(1000),
        username: "testbot".to_string(),
        discriminator: "0001".to_string(),
        avatar: None,
        bot: true,
    }
}

/// READY listing `guilds` as unavailable
pub fn ready(session_id: &str, resume_url: Option<String>, guilds: &[u64]) -> Dispatch {
    Dispatch::Ready(Box::new(ReadyEvent {
        v: 10,
        user: bot_user(),
        guilds: guilds
            .iter()
            .map(|id| UnavailableGuild::new(Snowflake::new(*id)))
            .collect(),
        session_id: session_id.to_string(),
        resume_gateway_url: resume_url,
        shard: Some([0, 1]),
    }))
}

pub fn text_channel(id: u64, guild_id: u64, name: &str) -> ChannelPayload {
    ChannelPayload {
        id: Snowflake::new(id),
        guild_id: Some(Snowflake::new(guild_id)),
        name: Some(name.to_string()),
        channel_type: 0,
        position: 0,
        topic: None,
        parent_id: None,
    }
}

/// Hydrated GUILD_CREATE with one text channel
pub fn guild_create(id: u64, name: &str) -> Dispatch {
    Dispatch::GuildCreate(GuildCreate::Available(Box::new(GuildCreateEvent {
        id: Snowflake::new(id),
        name: name.to_string(),
        icon: None,
        description: None,
        owner_id: bot_user().id,
        channels: vec![text_channel(id + 1, id, "general")],
        roles: Vec::new(),
        members: Vec::new(),
        member_count: 1,
    })))
}
