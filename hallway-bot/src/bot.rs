//! Bot state and event dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use hallway_sdk::event::GatewayEvent;
use hallway_sdk::model::{ChannelId, UserId};
use hallway_sdk::platform::Platform;

use crate::config::BotConfig;
use crate::registry::OwnershipRegistry;

/// What the event loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Tear the session down and exit so the supervisor restarts us.
    Restart,
}

/// All bot state, explicitly owned. Handlers receive `&self`; nothing
/// lives in a global.
///
/// The event loop feeds one event at a time, in arrival order. Only the
/// spawned follow-ups (confirmation cleanup, supervisor invocation) run
/// off that turn, which is why the maps below carry their own locks.
pub struct Bot<P> {
    pub(crate) platform: Arc<P>,
    pub(crate) config: BotConfig,
    pub(crate) registry: OwnershipRegistry,
    /// Which voice channel each user is currently in, fed from presence
    /// transitions. Answers "where is the command invoker".
    voice_positions: Mutex<HashMap<UserId, ChannelId>>,
    /// Our own account id, known once `Ready` arrives.
    bot_user: Mutex<Option<UserId>>,
}

impl<P: Platform + 'static> Bot<P> {
    pub fn new(platform: Arc<P>, config: BotConfig) -> Self {
        Self {
            platform,
            config,
            registry: OwnershipRegistry::new(),
            voice_positions: Mutex::new(HashMap::new()),
            bot_user: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &OwnershipRegistry {
        &self.registry
    }

    /// Handle one gateway event. Failures stay contained: a failing event
    /// never affects processing of the next one.
    pub async fn handle_event(&self, event: GatewayEvent) -> Flow {
        match event {
            GatewayEvent::Ready { bot_user } => {
                *self.bot_user.lock() = Some(bot_user);
                tracing::info!(user = %bot_user, "Logged in");
                Flow::Continue
            }
            GatewayEvent::VoiceStateUpdate {
                guild_id,
                user_id,
                display_name,
                previous,
                next,
            } => {
                tracing::debug!(user = %user_id, ?previous, ?next, "Voice transition");
                self.track_position(user_id, next);
                self.on_voice_state(guild_id, user_id, &display_name, previous, next)
                    .await;
                Flow::Continue
            }
            GatewayEvent::MessageCreate {
                guild_id,
                channel_id,
                author_id,
                author_display_name,
                content,
            } => {
                if Some(author_id) == *self.bot_user.lock() {
                    return Flow::Continue;
                }
                self.on_message(guild_id, channel_id, author_id, &author_display_name, &content)
                    .await
            }
            GatewayEvent::Disconnected { reason } => {
                tracing::warn!(reason = %reason, "Gateway session closed");
                Flow::Continue
            }
        }
    }

    fn track_position(&self, user: UserId, next: Option<ChannelId>) {
        let mut positions = self.voice_positions.lock();
        match next {
            Some(channel) => {
                positions.insert(user, channel);
            }
            None => {
                positions.remove(&user);
            }
        }
    }

    pub(crate) fn voice_position(&self, user: UserId) -> Option<ChannelId> {
        self.voice_positions.lock().get(&user).copied()
    }

    /// Best-effort channel message: a missing or failing target is logged
    /// and otherwise ignored.
    pub(crate) async fn notify(&self, channel: ChannelId, text: &str) {
        if let Err(e) = self.platform.send_message(channel, text).await {
            tracing::debug!(channel = %channel, error = %e, "Notification dropped");
        }
    }

    /// Best-effort direct message.
    pub(crate) async fn direct(&self, user: UserId, text: &str) {
        if let Err(e) = self.platform.send_direct_message(user, text).await {
            tracing::debug!(user = %user, error = %e, "Direct message dropped");
        }
    }
}
