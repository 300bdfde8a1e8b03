//! Presence event handler: the temporary-channel lifecycle.

use hallway_sdk::error::PlatformError;
use hallway_sdk::model::{ChannelId, GuildId, UserId};
use hallway_sdk::platform::Platform;

use crate::bot::Bot;
use crate::config::Lobby;

impl<P: Platform + 'static> Bot<P> {
    /// One voice transition. The two branches are independent and both
    /// always run: a single event can open a room (join into a lobby) and
    /// tear another down (leaving an ephemeral channel).
    pub(crate) async fn on_voice_state(
        &self,
        guild: GuildId,
        user: UserId,
        display_name: &str,
        previous: Option<ChannelId>,
        next: Option<ChannelId>,
    ) {
        if let Some(next) = next {
            if let Some(lobby) = self.config.lobby(next) {
                self.open_room(guild, user, display_name, lobby).await;
            }
        }
        if let Some(previous) = previous {
            if self.registry.contains(previous) {
                self.reap_if_empty(previous).await;
            }
        }
    }

    /// Creation branch: create the room, pull the creator in, record
    /// ownership, leave an audit line.
    async fn open_room(&self, guild: GuildId, user: UserId, display_name: &str, lobby: &Lobby) {
        let name = format!("{display_name}'s Channel");
        let channel = match self
            .platform
            .create_voice_channel(guild, lobby.category_id, &name, lobby.user_limit)
            .await
        {
            Ok(id) => id,
            Err(PlatformError::NotFound) => {
                // Misconfigured category. Not fatal to the process.
                tracing::warn!(
                    category = %lobby.category_id,
                    "Room category missing, skipping creation"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Room creation failed");
                return;
            }
        };

        // The creator may already have disconnected; the empty room is
        // then reaped by the deletion branch. A failed move never blocks
        // registration.
        if let Err(e) = self.platform.move_member(guild, user, channel).await {
            tracing::warn!(channel = %channel, error = %e, "Could not move creator into room");
        }

        if let Err(e) = self.registry.register(channel, user) {
            tracing::error!(channel = %channel, error = %e, "Ownership registration failed");
        }
        tracing::info!(channel = %channel, owner = %user, name = %name, "Room created");

        self.notify(
            self.config.log_channel_id,
            &format!("{display_name} created channel {name}."),
        )
        .await;
    }

    /// Deletion branch: a registered room with nobody left in it goes
    /// away, together with its registry entry.
    async fn reap_if_empty(&self, channel: ChannelId) {
        let occupancy = match self.platform.occupancy(channel).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Occupancy check failed");
                return;
            }
        };
        if occupancy > 0 {
            return;
        }

        match self.platform.delete_channel(channel).await {
            // NotFound means the channel was already gone: a stale entry
            // healing itself.
            Ok(()) | Err(PlatformError::NotFound) => {}
            Err(e) => {
                // Keep the entry; the next presence event retries.
                tracing::warn!(channel = %channel, error = %e, "Room deletion failed");
                return;
            }
        }

        self.registry.remove(channel);
        tracing::info!(channel = %channel, "Empty room deleted");

        self.notify(
            self.config.log_channel_id,
            &format!(
                "Temporary channel {} has been deleted as it was empty.",
                channel.mention()
            ),
        )
        .await;
    }
}
