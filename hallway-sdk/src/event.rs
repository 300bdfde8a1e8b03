//! Events emitted by the gateway session for the bot to consume.

use crate::model::{ChannelId, GuildId, UserId};

/// Events that the SDK emits to the consumer.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Session handshake complete. `bot_user` is our own account.
    Ready { bot_user: UserId },

    /// A user's voice position changed.
    ///
    /// `previous` and `next` are derived from the session's voice cache;
    /// the wire frame only carries the channel the user is in now.
    VoiceStateUpdate {
        guild_id: GuildId,
        user_id: UserId,
        /// Display name at the time of the transition.
        display_name: String,
        /// Voice channel the user was in before this event, if any.
        previous: Option<ChannelId>,
        /// Voice channel the user is in after this event, if any.
        next: Option<ChannelId>,
    },

    /// A message posted in a text channel.
    MessageCreate {
        guild_id: GuildId,
        channel_id: ChannelId,
        author_id: UserId,
        author_display_name: String,
        content: String,
    },

    /// Connection was closed.
    Disconnected { reason: String },
}
