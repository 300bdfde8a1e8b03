//! End-to-end lifecycle tests over a recording fake platform.
//!
//! Tests cover:
//! - Room creation on lobby join (name, cap, category, move, registration)
//! - Reaping of empty rooms, idempotence, stale-entry self-healing
//! - private/open_channel ownership checks and reply routing
//! - clear privilege gating, purge accounting, delayed confirmation cleanup
//! - restart gating and session shutdown
//! - The bot ignoring its own messages

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hallway_sdk::error::PlatformError;
use hallway_sdk::event::GatewayEvent;
use hallway_sdk::model::{ChannelId, GuildId, MessageId, UserId};
use hallway_sdk::platform::{Platform, Privilege};

use hallway_bot::bot::{Bot, Flow};
use hallway_bot::config::{BotConfig, Lobby};

const GUILD: GuildId = GuildId(1);
const DUO_LOBBY: ChannelId = ChannelId(10);
const DUO_CATEGORY: ChannelId = ChannelId(20);
const OPEN_LOBBY: ChannelId = ChannelId(12);
const BOT_CHANNEL: ChannelId = ChannelId(30);
const LOG_CHANNEL: ChannelId = ChannelId(31);
const ALICE: UserId = UserId(100);
const BOB: UserId = UserId(101);

#[derive(Default)]
struct State {
    next_id: u64,
    /// Live voice channels and their occupancy.
    channels: HashMap<ChannelId, usize>,
    /// (category, id, name, user_limit) per created channel.
    created: Vec<(ChannelId, ChannelId, String, Option<u32>)>,
    moves: Vec<(UserId, ChannelId)>,
    deleted_channels: Vec<ChannelId>,
    messages: Vec<(ChannelId, String)>,
    directs: Vec<(UserId, String)>,
    deleted_messages: Vec<(ChannelId, MessageId)>,
    connect_permissions: Vec<(ChannelId, bool)>,
    purges: Vec<(ChannelId, usize)>,
    privileges: HashSet<(UserId, Privilege)>,
}

#[derive(Default)]
struct FakePlatform {
    state: Mutex<State>,
    fail_move: bool,
    missing_category: bool,
    purge_result: usize,
}

impl FakePlatform {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn grant(&self, user: UserId, privilege: Privilege) {
        self.state().privileges.insert((user, privilege));
    }

    fn set_occupancy(&self, channel: ChannelId, n: usize) {
        self.state().channels.insert(channel, n);
    }

    fn drop_channel(&self, channel: ChannelId) {
        self.state().channels.remove(&channel);
    }

    fn sent_to(&self, channel: ChannelId) -> Vec<String> {
        self.state()
            .messages
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn create_voice_channel(
        &self,
        _guild: GuildId,
        category: ChannelId,
        name: &str,
        user_limit: Option<u32>,
    ) -> Result<ChannelId, PlatformError> {
        if self.missing_category {
            return Err(PlatformError::NotFound);
        }
        let mut state = self.state();
        state.next_id += 1;
        let id = ChannelId(1000 + state.next_id);
        state.channels.insert(id, 0);
        state.created.push((category, id, name.to_string(), user_limit));
        Ok(id)
    }

    async fn move_member(
        &self,
        _guild: GuildId,
        user: UserId,
        channel: ChannelId,
    ) -> Result<(), PlatformError> {
        if self.fail_move {
            return Err(PlatformError::Transient("user gone".into()));
        }
        let mut state = self.state();
        state.moves.push((user, channel));
        state.channels.insert(channel, 1);
        Ok(())
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), PlatformError> {
        let mut state = self.state();
        if state.channels.remove(&channel).is_none() {
            return Err(PlatformError::NotFound);
        }
        state.deleted_channels.push(channel);
        Ok(())
    }

    async fn set_connect_permission(
        &self,
        _guild: GuildId,
        channel: ChannelId,
        allow: bool,
    ) -> Result<(), PlatformError> {
        self.state().connect_permissions.push((channel, allow));
        Ok(())
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        text: &str,
    ) -> Result<MessageId, PlatformError> {
        let mut state = self.state();
        state.next_id += 1;
        let id = MessageId(5000 + state.next_id);
        state.messages.push((channel, text.to_string()));
        Ok(id)
    }

    async fn send_direct_message(&self, user: UserId, text: &str) -> Result<(), PlatformError> {
        self.state().directs.push((user, text.to_string()));
        Ok(())
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.state().deleted_messages.push((channel, message));
        Ok(())
    }

    async fn purge_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<usize, PlatformError> {
        self.state().purges.push((channel, limit));
        Ok(self.purge_result)
    }

    async fn occupancy(&self, channel: ChannelId) -> Result<usize, PlatformError> {
        Ok(self.state().channels.get(&channel).copied().unwrap_or(0))
    }

    async fn has_privilege(
        &self,
        _guild: GuildId,
        user: UserId,
        privilege: Privilege,
    ) -> Result<bool, PlatformError> {
        Ok(self.state().privileges.contains(&(user, privilege)))
    }
}

fn test_config() -> BotConfig {
    BotConfig {
        guild_id: GUILD,
        lobbies: vec![
            Lobby {
                channel_id: DUO_LOBBY,
                category_id: DUO_CATEGORY,
                user_limit: Some(2),
            },
            Lobby {
                channel_id: OPEN_LOBBY,
                category_id: ChannelId(22),
                user_limit: None,
            },
        ],
        bot_channel_id: BOT_CHANNEL,
        log_channel_id: LOG_CHANNEL,
        command_prefix: "!".to_string(),
        api_base: "http://127.0.0.1:0".to_string(),
        gateway_url: "ws://127.0.0.1:0".to_string(),
        restart_command: vec![],
    }
}

fn make_bot(platform: FakePlatform) -> (Arc<FakePlatform>, Bot<FakePlatform>) {
    let platform = Arc::new(platform);
    let bot = Bot::new(Arc::clone(&platform), test_config());
    (platform, bot)
}

fn voice(
    user: UserId,
    name: &str,
    previous: Option<ChannelId>,
    next: Option<ChannelId>,
) -> GatewayEvent {
    GatewayEvent::VoiceStateUpdate {
        guild_id: GUILD,
        user_id: user,
        display_name: name.to_string(),
        previous,
        next,
    }
}

fn message(channel: ChannelId, author: UserId, name: &str, content: &str) -> GatewayEvent {
    GatewayEvent::MessageCreate {
        guild_id: GUILD,
        channel_id: channel,
        author_id: author,
        author_display_name: name.to_string(),
        content: content.to_string(),
    }
}

/// Join the duo lobby as `user` and return the created room.
async fn join_lobby(bot: &Bot<FakePlatform>, platform: &FakePlatform, user: UserId, name: &str) -> ChannelId {
    bot.handle_event(voice(user, name, None, Some(DUO_LOBBY))).await;
    let room = platform.state().created.last().map(|(_, id, _, _)| *id).unwrap();
    // The platform reports the creator's move as another transition.
    bot.handle_event(voice(user, name, Some(DUO_LOBBY), Some(room))).await;
    room
}

// ── Room lifecycle ─────────────────────────────────────────────────────

#[tokio::test]
async fn lobby_join_creates_owned_room() {
    let (platform, bot) = make_bot(FakePlatform::default());

    bot.handle_event(voice(ALICE, "Alice", None, Some(DUO_LOBBY))).await;

    let state = platform.state();
    let (category, room, name, limit) = state.created[0].clone();
    assert_eq!(category, DUO_CATEGORY);
    assert_eq!(name, "Alice's Channel");
    assert_eq!(limit, Some(2));
    assert_eq!(state.moves, vec![(ALICE, room)]);
    drop(state);

    assert!(bot.registry().is_owner(room, ALICE));

    let audit = platform.sent_to(LOG_CHANNEL);
    assert_eq!(audit.len(), 1);
    assert!(audit[0].contains("Alice created channel Alice's Channel"));
}

#[tokio::test]
async fn uncapped_lobby_creates_uncapped_room() {
    let (platform, bot) = make_bot(FakePlatform::default());

    bot.handle_event(voice(ALICE, "Alice", None, Some(OPEN_LOBBY))).await;

    let state = platform.state();
    assert_eq!(state.created[0].3, None);
}

#[tokio::test]
async fn join_outside_lobby_creates_nothing() {
    let (platform, bot) = make_bot(FakePlatform::default());

    bot.handle_event(voice(ALICE, "Alice", None, Some(ChannelId(999)))).await;

    assert!(platform.state().created.is_empty());
}

#[tokio::test]
async fn each_join_gets_its_own_room() {
    let (platform, bot) = make_bot(FakePlatform::default());

    let room_a = join_lobby(&bot, &platform, ALICE, "Alice").await;
    let room_b = join_lobby(&bot, &platform, BOB, "Bob").await;

    assert_ne!(room_a, room_b);
    assert!(bot.registry().is_owner(room_a, ALICE));
    assert!(bot.registry().is_owner(room_b, BOB));
}

#[tokio::test]
async fn failed_move_still_registers() {
    let (platform, bot) = make_bot(FakePlatform {
        fail_move: true,
        ..Default::default()
    });

    bot.handle_event(voice(ALICE, "Alice", None, Some(DUO_LOBBY))).await;

    let room = platform.state().created[0].1;
    assert!(bot.registry().is_owner(room, ALICE));
}

#[tokio::test]
async fn missing_category_aborts_quietly() {
    let (platform, bot) = make_bot(FakePlatform {
        missing_category: true,
        ..Default::default()
    });

    bot.handle_event(voice(ALICE, "Alice", None, Some(DUO_LOBBY))).await;

    assert!(platform.state().created.is_empty());
    assert!(platform.sent_to(LOG_CHANNEL).is_empty());
}

#[tokio::test]
async fn empty_room_is_reaped() {
    let (platform, bot) = make_bot(FakePlatform::default());
    let room = join_lobby(&bot, &platform, ALICE, "Alice").await;

    platform.set_occupancy(room, 0);
    bot.handle_event(voice(ALICE, "Alice", Some(room), None)).await;

    assert_eq!(platform.state().deleted_channels, vec![room]);
    assert!(!bot.registry().contains(room));

    let audit = platform.sent_to(LOG_CHANNEL);
    assert!(audit.last().unwrap().contains("deleted as it was empty"));
}

#[tokio::test]
async fn occupied_room_survives() {
    let (platform, bot) = make_bot(FakePlatform::default());
    let room = join_lobby(&bot, &platform, ALICE, "Alice").await;

    // Someone else is still in the room when the creator leaves.
    platform.set_occupancy(room, 1);
    bot.handle_event(voice(ALICE, "Alice", Some(room), None)).await;

    assert!(platform.state().deleted_channels.is_empty());
    assert!(bot.registry().contains(room));
}

#[tokio::test]
async fn reap_is_idempotent() {
    let (platform, bot) = make_bot(FakePlatform::default());
    let room = join_lobby(&bot, &platform, ALICE, "Alice").await;

    platform.set_occupancy(room, 0);
    bot.handle_event(voice(ALICE, "Alice", Some(room), None)).await;
    // A duplicate leave event arrives after the room is already gone.
    bot.handle_event(voice(ALICE, "Alice", Some(room), None)).await;

    assert_eq!(platform.state().deleted_channels.len(), 1);
    assert!(!bot.registry().contains(room));
}

#[tokio::test]
async fn stale_entry_self_heals() {
    let (platform, bot) = make_bot(FakePlatform::default());
    let room = join_lobby(&bot, &platform, ALICE, "Alice").await;

    // The channel disappeared behind our back (deleted by hand on the
    // platform). Occupancy reads 0 and deletion reports NotFound.
    platform.drop_channel(room);
    bot.handle_event(voice(ALICE, "Alice", Some(room), None)).await;

    assert!(!bot.registry().contains(room));
}

#[tokio::test]
async fn lobby_hop_runs_both_branches() {
    let (platform, bot) = make_bot(FakePlatform::default());
    let room = join_lobby(&bot, &platform, ALICE, "Alice").await;

    // Straight from the ephemeral room back into the lobby: one event
    // both opens a fresh room and reaps the abandoned one.
    platform.set_occupancy(room, 0);
    bot.handle_event(voice(ALICE, "Alice", Some(room), Some(DUO_LOBBY))).await;

    let state = platform.state();
    assert_eq!(state.created.len(), 2);
    assert_eq!(state.deleted_channels, vec![room]);
    drop(state);
    assert!(!bot.registry().contains(room));
}

// ── Visibility commands ────────────────────────────────────────────────

#[tokio::test]
async fn private_requires_voice() {
    let (platform, bot) = make_bot(FakePlatform::default());

    bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "!private")).await;

    let state = platform.state();
    assert_eq!(
        state.directs,
        vec![(ALICE, "You must be in your channel to make it private.".to_string())]
    );
    assert!(state.connect_permissions.is_empty());
}

#[tokio::test]
async fn private_requires_ownership() {
    let (platform, bot) = make_bot(FakePlatform::default());
    let room = join_lobby(&bot, &platform, ALICE, "Alice").await;

    // Bob wanders into Alice's room and tries to lock it.
    bot.handle_event(voice(BOB, "Bob", None, Some(room))).await;
    bot.handle_event(message(BOT_CHANNEL, BOB, "Bob", "!private")).await;

    let state = platform.state();
    assert_eq!(
        state.directs,
        vec![(BOB, "Only the channel owner can make it private.".to_string())]
    );
    assert!(state.connect_permissions.is_empty());
}

#[tokio::test]
async fn private_by_owner_locks_room() {
    let (platform, bot) = make_bot(FakePlatform::default());
    let room = join_lobby(&bot, &platform, ALICE, "Alice").await;

    bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "!private")).await;

    assert_eq!(platform.state().connect_permissions, vec![(room, false)]);

    let confirmations = platform.sent_to(BOT_CHANNEL);
    assert_eq!(confirmations, vec![format!("Channel {} is now private.", room.mention())]);

    let audit = platform.sent_to(LOG_CHANNEL);
    assert!(
        audit
            .last()
            .unwrap()
            .contains(&format!("Alice made the channel {} private.", room.mention()))
    );
}

#[tokio::test]
async fn open_channel_by_owner_unlocks_room() {
    let (platform, bot) = make_bot(FakePlatform::default());
    let room = join_lobby(&bot, &platform, ALICE, "Alice").await;

    bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "!open_channel")).await;

    assert_eq!(platform.state().connect_permissions, vec![(room, true)]);

    let confirmations = platform.sent_to(BOT_CHANNEL);
    assert_eq!(
        confirmations,
        vec![format!("Channel {} is now open to everyone.", room.mention())]
    );
}

#[tokio::test]
async fn open_channel_requires_voice() {
    let (platform, bot) = make_bot(FakePlatform::default());

    bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "!open_channel")).await;

    assert_eq!(
        platform.state().directs,
        vec![(ALICE, "You must be in your channel to open it.".to_string())]
    );
}

// ── clear ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn clear_denied_in_channel() {
    let (platform, bot) = make_bot(FakePlatform::default());

    bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "!clear")).await;

    let state = platform.state();
    assert!(state.purges.is_empty());
    // The denial goes to the invoking channel, not over DM.
    assert!(state.directs.is_empty());
    drop(state);
    assert_eq!(
        platform.sent_to(BOT_CHANNEL),
        vec!["You do not have permission to clear messages.".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn clear_purges_and_cleans_up() {
    let (platform, bot) = make_bot(FakePlatform {
        purge_result: 42,
        ..Default::default()
    });
    platform.grant(ALICE, Privilege::ManageMessages);

    bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "!clear")).await;

    assert_eq!(platform.state().purges, vec![(BOT_CHANNEL, 100)]);
    assert!(
        platform
            .sent_to(BOT_CHANNEL)
            .contains(&"Deleted 42 messages.".to_string())
    );
    let audit = platform.sent_to(LOG_CHANNEL);
    assert!(
        audit
            .last()
            .unwrap()
            .contains(&format!("Alice cleared 42 messages in {}.", BOT_CHANNEL.mention()))
    );

    // The confirmation deletes itself after its five seconds are up.
    assert!(platform.state().deleted_messages.is_empty());
    tokio::time::sleep(Duration::from_secs(6)).await;
    let deleted = platform.state().deleted_messages.clone();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].0, BOT_CHANNEL);
}

// ── restart ────────────────────────────────────────────────────────────

#[tokio::test]
async fn restart_requires_administrator() {
    let (platform, bot) = make_bot(FakePlatform::default());

    let flow = bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "!restart")).await;

    assert_eq!(flow, Flow::Continue);
    assert!(platform.sent_to(BOT_CHANNEL).is_empty());
}

#[tokio::test]
async fn restart_acknowledges_and_exits() {
    let (platform, bot) = make_bot(FakePlatform::default());
    platform.grant(ALICE, Privilege::Administrator);

    let flow = bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "!restart")).await;

    assert_eq!(flow, Flow::Restart);
    assert_eq!(platform.sent_to(BOT_CHANNEL), vec!["Restarting bot...".to_string()]);
}

// ── dispatch edges ─────────────────────────────────────────────────────

#[tokio::test]
async fn own_messages_are_ignored() {
    let (platform, bot) = make_bot(FakePlatform::default());
    let me = UserId(999);
    platform.grant(me, Privilege::Administrator);

    bot.handle_event(GatewayEvent::Ready { bot_user: me }).await;
    let flow = bot.handle_event(message(BOT_CHANNEL, me, "hallway", "!restart")).await;

    assert_eq!(flow, Flow::Continue);
    assert!(platform.sent_to(BOT_CHANNEL).is_empty());
}

#[tokio::test]
async fn unknown_commands_are_ignored() {
    let (platform, bot) = make_bot(FakePlatform::default());

    bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "!dance")).await;
    bot.handle_event(message(BOT_CHANNEL, ALICE, "Alice", "no prefix here")).await;

    let state = platform.state();
    assert!(state.messages.is_empty());
    assert!(state.directs.is_empty());
}
