//! The outbound platform call surface.

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::model::{ChannelId, GuildId, MessageId, UserId};

/// A privilege held by a user, checked against the platform's own
/// permission model. Role logic is never reimplemented locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    ManageMessages,
    Administrator,
}

/// Calls the bot issues against the chat platform.
///
/// All calls are asynchronous and any of them may fail; implementations
/// report failures through [`PlatformError`] and do not retry.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create a voice channel under `category`. Returns the new channel's id.
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        category: ChannelId,
        name: &str,
        user_limit: Option<u32>,
    ) -> Result<ChannelId, PlatformError>;

    /// Move a connected member into `channel`.
    async fn move_member(
        &self,
        guild: GuildId,
        user: UserId,
        channel: ChannelId,
    ) -> Result<(), PlatformError>;

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), PlatformError>;

    /// Allow or deny the default role's connect permission on `channel`.
    async fn set_connect_permission(
        &self,
        guild: GuildId,
        channel: ChannelId,
        allow: bool,
    ) -> Result<(), PlatformError>;

    /// Post `text` in a text channel. Returns the new message's id.
    async fn send_message(
        &self,
        channel: ChannelId,
        text: &str,
    ) -> Result<MessageId, PlatformError>;

    /// Send a direct message to a user.
    async fn send_direct_message(&self, user: UserId, text: &str) -> Result<(), PlatformError>;

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError>;

    /// Delete up to `limit` of the most recent messages in a text channel.
    /// Returns how many were actually deleted.
    async fn purge_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<usize, PlatformError>;

    /// Number of members currently connected to a voice channel.
    ///
    /// Contract: a channel that no longer exists counts as 0 occupants, so
    /// stale references to deleted channels read as empty and can be
    /// cleaned up by the caller.
    async fn occupancy(&self, channel: ChannelId) -> Result<usize, PlatformError>;

    /// Whether `user` holds `privilege` in `guild`.
    async fn has_privilege(
        &self,
        guild: GuildId,
        user: UserId,
        privilege: Privilege,
    ) -> Result<bool, PlatformError>;
}
