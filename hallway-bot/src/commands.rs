//! Prefix command surface.
//!
//! Reply routing is part of the observable contract: `private` and
//! `open_channel` explain failures over direct message, while `clear`
//! posts its denial in the invoking channel.

use std::sync::Arc;
use std::time::Duration;

use hallway_sdk::model::{ChannelId, GuildId, UserId};
use hallway_sdk::platform::{Platform, Privilege};

use crate::bot::{Bot, Flow};

/// Fixed cap on how many recent messages `clear` removes.
const PURGE_LIMIT: usize = 100;

/// How long the purge confirmation stays up before deleting itself.
const CONFIRMATION_TTL: Duration = Duration::from_secs(5);

impl<P: Platform + 'static> Bot<P> {
    /// Parse and dispatch a prefixed command. Unknown commands are
    /// ignored silently.
    pub(crate) async fn on_message(
        &self,
        guild: GuildId,
        channel: ChannelId,
        author: UserId,
        display_name: &str,
        content: &str,
    ) -> Flow {
        let Some(rest) = content.strip_prefix(self.config.command_prefix.as_str()) else {
            return Flow::Continue;
        };
        let Some(command) = rest.split_whitespace().next() else {
            return Flow::Continue;
        };
        tracing::debug!(command, user = %author, "Command received");

        match command {
            "private" => {
                self.cmd_visibility(guild, author, display_name, false).await;
                Flow::Continue
            }
            "open_channel" => {
                self.cmd_visibility(guild, author, display_name, true).await;
                Flow::Continue
            }
            "clear" => {
                self.cmd_clear(guild, channel, author, display_name).await;
                Flow::Continue
            }
            "restart" => self.cmd_restart(guild, channel, author).await,
            _ => Flow::Continue,
        }
    }

    /// `private` / `open_channel`: creator-only visibility toggle on the
    /// invoker's current room.
    async fn cmd_visibility(&self, guild: GuildId, author: UserId, display_name: &str, open: bool) {
        let Some(channel) = self.voice_position(author) else {
            self.direct(
                author,
                if open {
                    "You must be in your channel to open it."
                } else {
                    "You must be in your channel to make it private."
                },
            )
            .await;
            return;
        };

        if !self.registry.is_owner(channel, author) {
            self.direct(
                author,
                if open {
                    "Only the channel owner can open it to others."
                } else {
                    "Only the channel owner can make it private."
                },
            )
            .await;
            return;
        }

        if let Err(e) = self
            .platform
            .set_connect_permission(guild, channel, open)
            .await
        {
            tracing::warn!(channel = %channel, error = %e, "Visibility change failed");
            return;
        }

        let mention = channel.mention();
        let (confirmation, audit) = if open {
            (
                format!("Channel {mention} is now open to everyone."),
                format!("{display_name} opened the channel {mention} to everyone."),
            )
        } else {
            (
                format!("Channel {mention} is now private."),
                format!("{display_name} made the channel {mention} private."),
            )
        };
        self.notify(self.config.bot_channel_id, &confirmation).await;
        self.notify(self.config.log_channel_id, &audit).await;
    }

    /// `clear`: purge up to [`PURGE_LIMIT`] recent messages. The denial
    /// stays in the invoking channel.
    async fn cmd_clear(
        &self,
        guild: GuildId,
        channel: ChannelId,
        author: UserId,
        display_name: &str,
    ) {
        match self
            .platform
            .has_privilege(guild, author, Privilege::ManageMessages)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                self.notify(channel, "You do not have permission to clear messages.")
                    .await;
                return;
            }
            Err(e) => {
                tracing::warn!(user = %author, error = %e, "Privilege check failed");
                return;
            }
        }

        let deleted = match self.platform.purge_messages(channel, PURGE_LIMIT).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Purge failed");
                return;
            }
        };

        match self
            .platform
            .send_message(channel, &format!("Deleted {deleted} messages."))
            .await
        {
            Ok(confirmation) => {
                // The confirmation cleans itself up without holding the
                // event loop.
                let platform = Arc::clone(&self.platform);
                tokio::spawn(async move {
                    tokio::time::sleep(CONFIRMATION_TTL).await;
                    if let Err(e) = platform.delete_message(channel, confirmation).await {
                        tracing::debug!(
                            message = %confirmation,
                            error = %e,
                            "Confirmation cleanup failed"
                        );
                    }
                });
            }
            Err(e) => tracing::debug!(channel = %channel, error = %e, "Purge confirmation dropped"),
        }

        self.notify(
            self.config.log_channel_id,
            &format!(
                "{display_name} cleared {deleted} messages in {}.",
                channel.mention()
            ),
        )
        .await;
    }

    /// `restart`: administrator-only restart through the external
    /// supervisor. A failed privilege check is swallowed silently.
    async fn cmd_restart(&self, guild: GuildId, channel: ChannelId, author: UserId) -> Flow {
        match self
            .platform
            .has_privilege(guild, author, Privilege::Administrator)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(user = %author, "Restart refused: not an administrator");
                return Flow::Continue;
            }
            Err(e) => {
                tracing::warn!(user = %author, error = %e, "Privilege check failed");
                return Flow::Continue;
            }
        }

        self.notify(channel, "Restarting bot...").await;

        if let Some((program, args)) = self.config.restart_command.split_first() {
            match tokio::process::Command::new(program).args(args).spawn() {
                Ok(_) => {
                    tracing::info!(command = ?self.config.restart_command, "Supervisor restart invoked");
                }
                Err(e) => tracing::error!(error = %e, "Supervisor invocation failed"),
            }
        } else {
            tracing::warn!("No restart command configured; exiting and relying on the supervisor");
        }

        Flow::Restart
    }
}
