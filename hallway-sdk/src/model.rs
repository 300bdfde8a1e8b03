//! Typed identifiers for platform objects.
//!
//! The platform assigns numeric snowflake ids to everything; keeping them
//! behind distinct newtypes stops a channel id from ever being passed where
//! a user id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake! {
    /// A guild (server) identifier.
    GuildId
}

snowflake! {
    /// A channel identifier — voice, text, or category.
    ChannelId
}

snowflake! {
    /// A user identifier.
    UserId
}

snowflake! {
    /// A message identifier.
    MessageId
}

impl ChannelId {
    /// Inline mention form, rendered as a channel link by clients.
    pub fn mention(&self) -> String {
        format!("<#{}>", self.0)
    }
}
