//! Repeated-message ("wash snake") detection.
//!
//! Tracks the last message of every (chat, user) pair and flags the same
//! text sent again and again within a short window.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};

/// Window in which identical messages count as repeats.
const REPEAT_WINDOW_SECS: i64 = 60;

/// Repeats (not counting the first message) that trigger a warning.
const REPEAT_THRESHOLD: u32 = 2;

/// Chance of a random taunt in invasive chats.
const TAUNT_CHANCE: f64 = 0.005;

/// Last message seen from one sender in one chat.
#[derive(Debug, Clone, PartialEq)]
struct FloodRecord {
    first_time: DateTime<Utc>,
    /// Lowercased, trimmed text.
    content: String,
    responded: bool,
    repeat_count: u32,
}

impl FloodRecord {
    fn new(content: String, at: DateTime<Utc>) -> Self {
        Self {
            first_time: at,
            content,
            responded: false,
            repeat_count: 0,
        }
    }
}

/// Who sent the message being observed.
#[derive(Debug, Clone, Copy)]
pub struct FloodSubject {
    pub chat_id: i64,
    pub user_id: u64,
    /// Chat is on the invasive list.
    pub invasive_chat: bool,
    pub admin: bool,
}

/// What the dispatcher should do with an observed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodVerdict {
    /// Continue normal routing.
    Pass,
    /// Send a random taunt, then continue normal routing.
    Taunt,
    /// Send a flood warning and stop routing. `invasive` selects the
    /// noisier phrase pool.
    Warn { invasive: bool },
    /// Already warned; stop routing silently.
    Suppressed,
}

impl FloodVerdict {
    /// The message is consumed and must not be routed further.
    pub fn is_consumed(self) -> bool {
        matches!(self, Self::Warn { .. } | Self::Suppressed)
    }
}

/// Per-sender flood tracker.
///
/// Records idle for longer than the repeat window behave exactly like
/// missing ones, so the backing cache may evict them freely.
#[derive(Debug, Clone)]
pub struct FloodGuard {
    records: TypedCache<(i64, u64), FloodRecord>,
    window: TimeDelta,
    taunt_chance: f64,
}

impl FloodGuard {
    pub fn new() -> Self {
        Self {
            records: TypedCache::new("flood_records", CacheConfig::sender_state()),
            window: TimeDelta::seconds(REPEAT_WINDOW_SECS),
            taunt_chance: TAUNT_CHANCE,
        }
    }

    /// Override the random taunt probability.
    #[cfg(test)]
    pub fn with_taunt_chance(mut self, chance: f64) -> Self {
        self.taunt_chance = chance;
        self
    }

    /// Observe a message and advance the sender's state.
    pub fn observe<R: Rng>(
        &self,
        subject: FloodSubject,
        text: &str,
        at: DateTime<Utc>,
        rng: &mut R,
    ) -> FloodVerdict {
        if subject.invasive_chat && rng.gen_bool(self.taunt_chance) {
            debug!("Random taunt for user {} in chat {}", subject.user_id, subject.chat_id);
            return FloodVerdict::Taunt;
        }

        let key = (subject.chat_id, subject.user_id);
        let content = text.trim().to_lowercase();

        let Some(mut record) = self.records.get(&key) else {
            debug!("New flood record for user {} in chat {}", subject.user_id, subject.chat_id);
            self.records.insert(key, FloodRecord::new(content, at));
            return FloodVerdict::Pass;
        };

        if record.content != content {
            self.records.insert(key, FloodRecord::new(content, at));
            return FloodVerdict::Pass;
        }

        if at - record.first_time >= self.window {
            // Same text after the window: start counting again, keep content.
            record.responded = false;
            record.first_time = at;
            record.repeat_count = 0;
            self.records.insert(key, record);
            return FloodVerdict::Pass;
        }

        record.repeat_count += 1;
        debug!(
            "Repeat #{} from user {} in chat {}",
            record.repeat_count, subject.user_id, subject.chat_id
        );

        let verdict = if record.repeat_count < REPEAT_THRESHOLD {
            FloodVerdict::Pass
        } else if record.responded {
            FloodVerdict::Suppressed
        } else {
            record.responded = true;
            FloodVerdict::Warn {
                invasive: subject.invasive_chat || subject.admin,
            }
        };

        self.records.insert(key, record);
        verdict
    }
}

impl Default for FloodGuard {
    fn default() -> Self {
        Self::new()
    }
}
