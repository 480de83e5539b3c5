//! In-memory store backed by `DashMap`.
//!
//! Guilds are kept as metadata only; their channels, roles, and members live
//! in their own maps so that individual events can replace them. Each guild
//! remembers which shard delivered it, which is what shard invalidation keys
//! on. Messages are kept in a bounded window per channel.

use crate::store::{
    CacheResult, InvalidationCause, PreviousState, Store, StoreAction, StoreActionKind,
};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use gateway_core::{
    ChannelDeleteEvent, ChannelPayload, GuildCreate, GuildCreateEvent, GuildDeleteEvent,
    GuildEvent, GuildMemberAddEvent, GuildMemberRemoveEvent, GuildMemberUpdateEvent,
    GuildRoleDeleteEvent, GuildRoleEvent, MemberPayload, MessageCreateEvent, MessageDeleteEvent,
    MessageEvent, PresenceEvent, ReadyEvent, RolePayload, Snowflake, UserEvent, UserPayload,
};
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::{debug, instrument, trace};

type GuildScoped = (Snowflake, Snowflake);

/// Messages kept per channel before the oldest are evicted
pub const DEFAULT_MESSAGE_WINDOW: usize = 100;

/// Entry counts, for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub guilds: usize,
    pub unavailable_guilds: usize,
    pub channels: usize,
    pub roles: usize,
    pub members: usize,
    pub messages: usize,
    pub presences: usize,
}

/// Reference [`Store`] keeping everything in process memory
#[derive(Debug)]
pub struct InMemoryStore {
    current_user: RwLock<Option<UserPayload>>,
    guild_shards: DashMap<Snowflake, u32>,
    guilds: DashMap<Snowflake, GuildCreateEvent>,
    unavailable: DashSet<Snowflake>,
    channels: DashMap<Snowflake, ChannelPayload>,
    roles: DashMap<GuildScoped, RolePayload>,
    members: DashMap<GuildScoped, MemberPayload>,
    messages: DashMap<Snowflake, MessageCreateEvent>,
    /// Message ids per channel, oldest first
    message_order: DashMap<Snowflake, VecDeque<Snowflake>>,
    message_window: usize,
    presences: DashMap<GuildScoped, PresenceEvent>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_message_window(DEFAULT_MESSAGE_WINDOW)
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `window` messages per channel (at least one)
    #[must_use]
    pub fn with_message_window(window: usize) -> Self {
        Self {
            current_user: RwLock::default(),
            guild_shards: DashMap::new(),
            guilds: DashMap::new(),
            unavailable: DashSet::new(),
            channels: DashMap::new(),
            roles: DashMap::new(),
            members: DashMap::new(),
            messages: DashMap::new(),
            message_order: DashMap::new(),
            message_window: window.max(1),
            presences: DashMap::new(),
        }
    }

    // === Lookups ===

    pub fn current_user(&self) -> Option<UserPayload> {
        self.current_user.read().clone()
    }

    pub fn guild(&self, id: Snowflake) -> Option<GuildCreateEvent> {
        self.guilds.get(&id).map(|guild| guild.clone())
    }

    pub fn is_unavailable(&self, id: Snowflake) -> bool {
        self.unavailable.contains(&id)
    }

    pub fn channel(&self, id: Snowflake) -> Option<ChannelPayload> {
        self.channels.get(&id).map(|channel| channel.clone())
    }

    pub fn role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<RolePayload> {
        self.roles.get(&(guild_id, role_id)).map(|role| role.clone())
    }

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<MemberPayload> {
        self.members
            .get(&(guild_id, user_id))
            .map(|member| member.clone())
    }

    pub fn message(&self, id: Snowflake) -> Option<MessageCreateEvent> {
        self.messages.get(&id).map(|message| message.clone())
    }

    pub fn presence(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<PresenceEvent> {
        self.presences
            .get(&(guild_id, user_id))
            .map(|presence| presence.clone())
    }

    /// Shard that last delivered the guild
    pub fn guild_shard(&self, id: Snowflake) -> Option<u32> {
        self.guild_shards.get(&id).map(|shard| *shard)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            guilds: self.guilds.len(),
            unavailable_guilds: self.unavailable.len(),
            channels: self.channels.len(),
            roles: self.roles.len(),
            members: self.members.len(),
            messages: self.messages.len(),
            presences: self.presences.len(),
        }
    }

    // === Mutations ===

    fn ready(&self, shard: u32, ready: ReadyEvent) -> Option<PreviousState> {
        for guild in &ready.guilds {
            self.guild_shards.insert(guild.id, shard);
            self.unavailable.insert(guild.id);
        }

        self.current_user
            .write()
            .replace(ready.user)
            .map(PreviousState::User)
    }

    fn upsert_guild(&self, shard: u32, guild: GuildCreate) -> Option<PreviousState> {
        self.guild_shards.insert(guild.id(), shard);

        let mut guild = match guild {
            GuildCreate::Available(guild) => *guild,
            GuildCreate::Unavailable(guild) => {
                self.unavailable.insert(guild.id);
                return None;
            }
        };

        self.unavailable.remove(&guild.id);

        for mut channel in std::mem::take(&mut guild.channels) {
            if channel.guild_id.is_none() {
                channel.guild_id = Some(guild.id);
            }
            self.channels.insert(channel.id, channel);
        }
        for role in std::mem::take(&mut guild.roles) {
            self.roles.insert((guild.id, role.id), role);
        }
        for member in std::mem::take(&mut guild.members) {
            self.members.insert((guild.id, member.user.id), member);
        }

        self.guilds
            .insert(guild.id, guild)
            .map(|previous| PreviousState::Guild(Box::new(previous)))
    }

    fn update_guild(&self, update: GuildEvent) -> Option<PreviousState> {
        let mut guild = self.guilds.get_mut(&update.id)?;
        let previous = guild.clone();

        if let Some(name) = update.name {
            guild.name = name;
        }
        if update.icon.is_some() {
            guild.icon = update.icon;
        }
        if update.description.is_some() {
            guild.description = update.description;
        }
        if let Some(owner_id) = update.owner_id {
            guild.owner_id = owner_id;
        }

        Some(PreviousState::Guild(Box::new(previous)))
    }

    fn remove_guild(&self, delete: GuildDeleteEvent) -> Option<PreviousState> {
        if delete.unavailable {
            // Outage: keep what we know until the guild comes back
            self.unavailable.insert(delete.id);
            return self
                .guild(delete.id)
                .map(|guild| PreviousState::Guild(Box::new(guild)));
        }

        self.unavailable.remove(&delete.id);
        self.guild_shards.remove(&delete.id);
        self.purge_guild_children(delete.id);
        self.guilds
            .remove(&delete.id)
            .map(|(_, guild)| PreviousState::Guild(Box::new(guild)))
    }

    fn purge_guild_children(&self, guild_id: Snowflake) {
        self.channels
            .retain(|_, channel| channel.guild_id != Some(guild_id));
        self.roles.retain(|(guild, _), _| *guild != guild_id);
        self.members.retain(|(guild, _), _| *guild != guild_id);
        self.presences.retain(|(guild, _), _| *guild != guild_id);
        self.messages
            .retain(|_, message| message.guild_id != Some(guild_id));
        self.prune_message_order();
    }

    /// Drop window entries whose message is gone
    fn prune_message_order(&self) {
        self.message_order.retain(|_, order| {
            order.retain(|id| self.messages.contains_key(id));
            !order.is_empty()
        });
    }

    fn upsert_role(&self, event: GuildRoleEvent) -> Option<PreviousState> {
        self.roles
            .insert((event.guild_id, event.role.id), event.role)
            .map(PreviousState::Role)
    }

    fn remove_role(&self, event: GuildRoleDeleteEvent) -> Option<PreviousState> {
        for mut member in self.members.iter_mut() {
            if member.key().0 == event.guild_id {
                member.roles.retain(|role| *role != event.role_id);
            }
        }

        self.roles
            .remove(&(event.guild_id, event.role_id))
            .map(|(_, role)| PreviousState::Role(role))
    }

    fn upsert_channel(&self, channel: ChannelPayload) -> Option<PreviousState> {
        self.channels
            .insert(channel.id, channel)
            .map(PreviousState::Channel)
    }

    fn remove_channel(&self, event: ChannelDeleteEvent) -> Option<PreviousState> {
        self.messages
            .retain(|_, message| message.channel_id != event.id);
        self.message_order.remove(&event.id);
        self.channels
            .remove(&event.id)
            .map(|(_, channel)| PreviousState::Channel(channel))
    }

    fn upsert_message(&self, message: MessageCreateEvent) -> Option<PreviousState> {
        let (id, channel_id) = (message.id, message.channel_id);
        let previous = self.messages.insert(id, message);

        if previous.is_none() {
            let mut order = self.message_order.entry(channel_id).or_default();
            order.push_back(id);
            while order.len() > self.message_window {
                let Some(evicted) = order.pop_front() else {
                    break;
                };
                self.messages.remove(&evicted);
                trace!(channel = %channel_id, message = %evicted, "Evicted message");
            }
        }

        previous.map(|previous| PreviousState::Message(Box::new(previous)))
    }

    fn update_message(&self, update: MessageEvent) -> Option<PreviousState> {
        let mut message = self.messages.get_mut(&update.id)?;
        let previous = message.clone();

        if let Some(content) = update.content {
            message.content = content;
        }
        if update.edited_timestamp.is_some() {
            message.edited_timestamp = update.edited_timestamp;
        }

        Some(PreviousState::Message(Box::new(previous)))
    }

    fn remove_message(&self, event: MessageDeleteEvent) -> Option<PreviousState> {
        let (_, message) = self.messages.remove(&event.id)?;

        if let Some(mut order) = self.message_order.get_mut(&message.channel_id) {
            order.retain(|id| *id != event.id);
        }
        self.message_order
            .remove_if(&message.channel_id, |_, order| order.is_empty());

        Some(PreviousState::Message(Box::new(message)))
    }

    fn add_member(&self, event: GuildMemberAddEvent) -> Option<PreviousState> {
        let key = (event.guild_id, event.member.user.id);
        let previous = self.members.insert(key, event.member);

        if previous.is_none() {
            if let Some(mut guild) = self.guilds.get_mut(&event.guild_id) {
                guild.member_count = guild.member_count.saturating_add(1);
            }
        }

        previous.map(PreviousState::Member)
    }

    fn update_member(&self, update: GuildMemberUpdateEvent) -> Option<PreviousState> {
        let mut member = self.members.get_mut(&(update.guild_id, update.user.id))?;
        let previous = member.clone();

        if update.nickname.is_some() {
            member.nickname = update.nickname;
        }
        if let Some(roles) = update.roles {
            member.roles = roles;
        }

        Some(PreviousState::Member(previous))
    }

    fn remove_member(&self, event: GuildMemberRemoveEvent) -> Option<PreviousState> {
        let key = (event.guild_id, event.user.id);
        self.presences.remove(&key);

        let (_, member) = self.members.remove(&key)?;
        if let Some(mut guild) = self.guilds.get_mut(&event.guild_id) {
            guild.member_count = guild.member_count.saturating_sub(1);
        }

        Some(PreviousState::Member(member))
    }

    fn update_presence(&self, presence: PresenceEvent) -> Option<PreviousState> {
        self.presences
            .insert((presence.guild_id, presence.user.id), presence)
            .map(PreviousState::Presence)
    }

    fn update_user(&self, update: UserEvent) -> Option<PreviousState> {
        let mut current = self.current_user.write();
        let user = current.as_mut().filter(|user| user.id == update.id)?;
        let previous = user.clone();

        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(discriminator) = update.discriminator {
            user.discriminator = discriminator;
        }
        if update.avatar.is_some() {
            user.avatar = update.avatar;
        }

        Some(PreviousState::User(previous))
    }

    fn invalidate(&self, shard: u32, cause: InvalidationCause) {
        let guild_ids: Vec<Snowflake> = self
            .guild_shards
            .iter()
            .filter(|entry| *entry.value() == shard)
            .map(|entry| *entry.key())
            .collect();

        for guild_id in &guild_ids {
            self.purge_guild_children(*guild_id);
            self.guilds.remove(guild_id);
            self.unavailable.remove(guild_id);
            self.guild_shards.remove(guild_id);
        }

        // Direct-message channels and messages are not tied to a shard
        if cause == InvalidationCause::Logout {
            self.channels.retain(|_, channel| channel.guild_id.is_some());
            self.messages.retain(|_, message| message.guild_id.is_some());
            self.prune_message_order();
            if self.guild_shards.is_empty() {
                self.current_user.write().take();
            }
        }

        debug!(shard, %cause, guilds = guild_ids.len(), "Shard cache invalidated");
    }
}

#[async_trait]
impl Store for InMemoryStore {
    #[instrument(level = "trace", skip_all, fields(shard = action.shard, action = action.kind.name()))]
    async fn execute(&self, action: StoreAction) -> CacheResult<Option<PreviousState>> {
        let StoreAction { shard, kind } = action;

        let previous = match kind {
            StoreActionKind::Ready(ready) => self.ready(shard, *ready),
            StoreActionKind::UpsertGuild(guild) => self.upsert_guild(shard, guild),
            StoreActionKind::UpdateGuild(update) => self.update_guild(update),
            StoreActionKind::RemoveGuild(delete) => self.remove_guild(delete),
            StoreActionKind::UpsertRole(event) => self.upsert_role(event),
            StoreActionKind::RemoveRole(event) => self.remove_role(event),
            StoreActionKind::UpsertChannel(channel) => self.upsert_channel(channel),
            StoreActionKind::RemoveChannel(event) => self.remove_channel(event),
            StoreActionKind::UpsertMessage(message) => self.upsert_message(*message),
            StoreActionKind::UpdateMessage(update) => self.update_message(update),
            StoreActionKind::RemoveMessage(event) => self.remove_message(event),
            StoreActionKind::AddMember(event) => self.add_member(event),
            StoreActionKind::UpdateMember(update) => self.update_member(update),
            StoreActionKind::RemoveMember(event) => self.remove_member(event),
            StoreActionKind::UpdatePresence(presence) => self.update_presence(presence),
            StoreActionKind::UpdateUser(update) => self.update_user(update),
            StoreActionKind::Invalidate(cause) => {
                self.invalidate(shard, cause);
                None
            }
        };

        Ok(previous)
    }
}
