//! Ownership registry for runtime-created voice channels.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use parking_lot::Mutex;
use thiserror::Error;

use hallway_sdk::model::{ChannelId, UserId};

/// Error from [`OwnershipRegistry::register`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The channel already has a recorded creator. Entries are never
    /// overwritten.
    #[error("channel {0} is already registered")]
    AlreadyRegistered(ChannelId),
}

/// In-memory map from ephemeral channel to its creator.
///
/// An entry exists exactly while the corresponding platform channel is
/// believed to exist: added once at creation, removed once at deletion.
/// Nothing is persisted — channels left over from a previous process run
/// are untracked and never auto-deleted.
#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    inner: Mutex<HashMap<ChannelId, UserId>>,
}

impl OwnershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `owner` as the creator of `channel`.
    pub fn register(&self, channel: ChannelId, owner: UserId) -> Result<(), RegistryError> {
        match self.inner.lock().entry(channel) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(channel)),
            Entry::Vacant(slot) => {
                slot.insert(owner);
                Ok(())
            }
        }
    }

    /// Whether `user` is the recorded creator of `channel`.
    pub fn is_owner(&self, channel: ChannelId, user: UserId) -> bool {
        self.inner.lock().get(&channel) == Some(&user)
    }

    /// Drop the entry for `channel`. Returns whether an entry existed;
    /// removing an absent channel is a no-op.
    pub fn remove(&self, channel: ChannelId) -> bool {
        self.inner.lock().remove(&channel).is_some()
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.inner.lock().contains_key(&channel)
    }
}
