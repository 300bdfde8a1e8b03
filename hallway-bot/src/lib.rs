//! hallway-bot: temporary voice channels for a chat guild.
//!
//! Watches lobby joins, provisions a per-user room under the lobby's
//! category, and reaps rooms the moment they empty. A few prefix commands
//! round it out:
//!
//!   !private       — deny the default role from connecting (creator only)
//!   !open_channel  — re-open the room to everyone (creator only)
//!   !clear         — purge up to 100 recent messages (manage-messages)
//!   !restart       — restart via the external supervisor (administrator)

pub mod bot;
pub mod config;
pub mod registry;

mod commands;
mod presence;
