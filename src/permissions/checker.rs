//! Tier membership checks.

use std::collections::HashSet;

use crate::config::Config;

/// Static tier membership, built once from configuration.
///
/// All checks are plain set lookups with no side effects.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    admin_ids: HashSet<u64>,
    operational: HashSet<i64>,
    restricted: HashSet<i64>,
    motd_only: HashSet<i64>,
    invasive: HashSet<i64>,
}

impl Permissions {
    /// Build from explicit id lists.
    pub fn new(
        admin_ids: impl IntoIterator<Item = u64>,
        operational: impl IntoIterator<Item = i64>,
        restricted: impl IntoIterator<Item = i64>,
        motd_only: impl IntoIterator<Item = i64>,
        invasive: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            admin_ids: admin_ids.into_iter().collect(),
            operational: operational.into_iter().collect(),
            restricted: restricted.into_iter().collect(),
            motd_only: motd_only.into_iter().collect(),
            invasive: invasive.into_iter().collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.admin_ids.iter().copied(),
            config.operational_chats.iter().copied(),
            config.restricted_chats.iter().copied(),
            config.motd_only_chats.iter().copied(),
            config.invasive_chats.iter().copied(),
        )
    }

    /// Check if a user is a bot admin.
    #[inline]
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Private chats share their id with the user, so an admin's
    /// private chat counts as an admin chat.
    fn is_admin_chat(&self, chat_id: i64) -> bool {
        u64::try_from(chat_id).is_ok_and(|id| self.is_admin(id))
    }

    /// Chat may use the full command surface.
    pub fn is_operational(&self, chat_id: i64) -> bool {
        self.operational.contains(&chat_id) || self.is_admin_chat(chat_id)
    }

    /// Chat is known to the bot at all (any tier).
    pub fn is_augmented(&self, chat_id: i64) -> bool {
        self.is_operational(chat_id)
            || self.is_restricted(chat_id)
            || self.is_motd_only(chat_id)
    }

    pub fn is_restricted(&self, chat_id: i64) -> bool {
        self.restricted.contains(&chat_id)
    }

    pub fn is_motd_only(&self, chat_id: i64) -> bool {
        self.motd_only.contains(&chat_id)
    }

    /// Chat opted in to the noisier flood replies.
    pub fn is_invasive(&self, chat_id: i64) -> bool {
        self.invasive.contains(&chat_id)
    }
}
