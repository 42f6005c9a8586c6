//! Update dispatcher.
//!
//! [`BotEngine`] owns all bot state and runs each update through the
//! pipeline, strictly one at a time:
//!
//! 1. updates without text or photo are ignored
//! 2. photos are relayed back in photo-accepting mode (admins only)
//! 3. text goes through the tier check, the flood guard, the status and
//!    resume phrases, the motd flow, and finally the tier's command list
//!    (plus free-text keywords for operational chats)

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use super::transport::{Message, Transport, TransportError, Update};
use crate::database::{KeywordIndex, KeywordStore, MotdStore};
use crate::events::{FloodGuard, FloodSubject, FloodVerdict};
use crate::i18n::Strings;
use crate::permissions::Permissions;
use crate::plugins::{CallbackRegistry, RuleSet, control, motd, photos};
use crate::utils::strip_mention;

/// How an update was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to look at.
    Ignored,
    /// Chat is not registered.
    Dropped,
    /// Consumed by the flood guard.
    Flooded,
    Handled,
    /// Passed every check but nothing answered.
    Unhandled,
    /// Processing failed; an apology was attempted.
    Failed,
}

/// A text message, prepared for command matching.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub chat_id: i64,
    pub chat_is_private: bool,
    pub user_id: u64,
    pub message_id: i32,
    pub admin: bool,
    /// Text with any `@botname` removed from the command word.
    pub text: String,
    /// Lowercased `text`.
    pub lowered: String,
    pub date: DateTime<Utc>,
}

impl CommandContext {
    fn new(msg: &Message, text: &str, bot_username: &str, admin: bool) -> Self {
        let text = strip_mention(text, bot_username);
        Self {
            chat_id: msg.chat_id,
            chat_is_private: msg.chat_is_private,
            user_id: msg.user_id,
            message_id: msg.message_id,
            admin,
            lowered: text.to_lowercase(),
            text,
            date: msg.date,
        }
    }
}

/// The bot: transport, keyword store, and all in-process state.
pub struct BotEngine<T, S> {
    pub(crate) transport: T,
    pub(crate) store: S,
    pub(crate) index: KeywordIndex,
    pub(crate) motd: MotdStore,
    pub(crate) strings: Strings,
    pub(crate) permissions: Permissions,
    pub(crate) registry: CallbackRegistry,
    flood: FloodGuard,
    /// Unregistered chats already told how to register.
    notified: HashSet<i64>,
    pub(crate) running: bool,
    pub(crate) accepting_photos: bool,
    bot_username: String,
    pub(crate) images_dir: PathBuf,
    pub(crate) rng: StdRng,
}

impl<T: Transport, S: KeywordStore> BotEngine<T, S> {
    pub fn new(
        transport: T,
        store: S,
        index: KeywordIndex,
        motd: MotdStore,
        strings: Strings,
        permissions: Permissions,
    ) -> Self {
        let registry = CallbackRegistry::new(&strings);
        Self {
            transport,
            store,
            index,
            motd,
            strings,
            permissions,
            registry,
            flood: FloodGuard::new(),
            notified: HashSet::new(),
            running: true,
            accepting_photos: false,
            bot_username: String::new(),
            images_dir: PathBuf::from("images"),
            rng: StdRng::from_entropy(),
        }
    }

    /// Username stripped from `/command@username`.
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = username.into();
        self
    }

    /// Source directory for bulk uploads.
    pub fn with_images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.images_dir = dir.into();
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    #[cfg(test)]
    pub fn with_flood_guard(mut self, flood: FloodGuard) -> Self {
        self.flood = flood;
        self
    }

    /// Reply to the message behind `ctx`.
    pub(crate) async fn reply(&self, ctx: &CommandContext, text: &str) -> anyhow::Result<()> {
        self.transport
            .send_text(ctx.chat_id, text, Some(ctx.message_id))
            .await?;
        Ok(())
    }

    /// Process one update, answering failures with an apology. A failed
    /// send also rebuilds the transport.
    pub async fn handle_update(&mut self, update: &Update) -> Outcome {
        match self.process_update(update).await {
            Ok(outcome) => {
                debug!("Update {} -> {:?}", update.id, outcome);
                outcome
            }
            Err(e) => {
                match e.downcast_ref::<TransportError>() {
                    Some(te) => {
                        if te.is_retriable() {
                            warn!("Sending failed for update {}: {}", update.id, te);
                        } else {
                            error!("Sending failed for update {}: {}", update.id, te);
                        }
                        if let Err(e) = self.transport.reconnect().await {
                            error!("Reconnect failed: {}", e);
                        }
                    }
                    None => error!("Failed to handle update {}: {:#}", update.id, e),
                }

                if let Some(msg) = &update.message {
                    let apology = self.strings.text("common.apology");
                    if let Err(e) = self
                        .transport
                        .send_text(msg.chat_id, &apology, Some(msg.message_id))
                        .await
                    {
                        warn!("Could not apologize to chat {}: {}", msg.chat_id, e);
                    }
                }

                Outcome::Failed
            }
        }
    }

    /// Run one update through the pipeline.
    pub async fn process_update(&mut self, update: &Update) -> anyhow::Result<Outcome> {
        let Some(msg) = &update.message else {
            return Ok(Outcome::Ignored);
        };

        if !msg.photo_refs.is_empty() {
            let taken = photos::relay_photo(self, msg).await;
            return Ok(if taken {
                Outcome::Handled
            } else {
                Outcome::Ignored
            });
        }

        match msg.text.as_deref() {
            Some(text) => self.process_text(msg, text).await,
            None => Ok(Outcome::Ignored),
        }
    }

    async fn process_text(&mut self, msg: &Message, text: &str) -> anyhow::Result<Outcome> {
        let chat_id = msg.chat_id;

        if !self.permissions.is_augmented(chat_id) {
            self.notify_unregistered(chat_id).await?;
            return Ok(Outcome::Dropped);
        }

        let admin = self.permissions.is_admin(msg.user_id);
        let ctx = CommandContext::new(msg, text, &self.bot_username, admin);

        if self.check_flood(&ctx, text).await? {
            return Ok(Outcome::Flooded);
        }

        let status_query = self.strings.text("status.query").to_lowercase();
        if ctx.lowered.contains(&status_query) {
            let key = if self.running {
                "status.running"
            } else {
                "status.stopped"
            };
            self.reply(&ctx, &self.strings.text(key)).await?;
            return Ok(Outcome::Handled);
        }

        let resume = self.strings.text("control.resume").to_lowercase();
        if !self.running && ctx.admin && ctx.lowered.starts_with(&resume) {
            control::resume(self, &ctx).await?;
            return Ok(Outcome::Handled);
        }

        if motd::is_motd_request(&ctx, &self.strings) {
            motd::motd_command(self, &ctx).await?;
            return Ok(Outcome::Handled);
        }

        if !self.running {
            debug!("Stopped; ignoring message in chat {}", chat_id);
            return Ok(Outcome::Unhandled);
        }

        if self.permissions.is_operational(chat_id) {
            if photos::bulk_upload(self, &ctx).await? {
                return Ok(Outcome::Handled);
            }

            if self.execute_first_match(RuleSet::Full, &ctx).await? {
                return Ok(Outcome::Handled);
            }

            let reply = self
                .index
                .resolve_text(&self.store, text, &mut self.rng)
                .await?;
            if let Some(reply) = reply {
                self.reply(&ctx, &reply).await?;
                return Ok(Outcome::Handled);
            }

            return Ok(Outcome::Unhandled);
        }

        if self.permissions.is_restricted(chat_id) {
            let handled = self.execute_first_match(RuleSet::Restricted, &ctx).await?;
            return Ok(if handled {
                Outcome::Handled
            } else {
                Outcome::Unhandled
            });
        }

        if self.permissions.is_motd_only(chat_id) {
            debug!("Motd-only chat {}; nothing else to do", chat_id);
        } else {
            debug!("No route for message in chat {}", chat_id);
        }
        Ok(Outcome::Unhandled)
    }

    /// Tell an unregistered chat its id, once per process lifetime.
    async fn notify_unregistered(&mut self, chat_id: i64) -> anyhow::Result<()> {
        if !self.notified.insert(chat_id) {
            return Ok(());
        }

        info!("Message from unregistered chat {}", chat_id);
        let notice = self.strings.text("register.notice");
        self.transport.send_text(chat_id, &notice, None).await?;
        self.transport
            .send_text(chat_id, &chat_id.to_string(), None)
            .await?;
        Ok(())
    }

    /// Run the flood guard. Returns true when the message is consumed.
    async fn check_flood(&mut self, ctx: &CommandContext, text: &str) -> anyhow::Result<bool> {
        let subject = FloodSubject {
            chat_id: ctx.chat_id,
            user_id: ctx.user_id,
            invasive_chat: self.permissions.is_invasive(ctx.chat_id),
            admin: ctx.admin,
        };

        match self.flood.observe(subject, text, ctx.date, &mut self.rng) {
            FloodVerdict::Pass => Ok(false),
            FloodVerdict::Taunt => {
                let pools = ["flood.phrases", "flood.invasive_phrases"];
                if let Some(taunt) = self.strings.pick(&pools, &mut self.rng) {
                    self.reply(ctx, &taunt).await?;
                }
                Ok(false)
            }
            FloodVerdict::Warn { invasive } => {
                let pools: &[&str] = if invasive {
                    &["flood.phrases", "flood.invasive_phrases"]
                } else {
                    &["flood.phrases"]
                };
                info!("Flood from user {} in chat {}", ctx.user_id, ctx.chat_id);
                if let Some(warning) = self.strings.pick(pools, &mut self.rng) {
                    self.reply(ctx, &warning).await?;
                }
                Ok(true)
            }
            FloodVerdict::Suppressed => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::transport::PhotoSource;
    use crate::database::KeywordSpace;
    use crate::testing::*;

    fn update_at(id: u32, chat_id: i64, user_id: u64, text: &str, secs: i64) -> Update {
        let mut msg = message(chat_id, user_id, text);
        msg.date = at(secs);
        Update {
            id,
            message: Some(msg),
        }
    }

    async fn send(engine: &mut TestEngine, chat_id: i64, user_id: u64, text: &str) -> Outcome {
        engine.handle_update(&text_update(1, chat_id, user_id, text)).await
    }

    #[tokio::test]
    async fn test_flood_warns_once_then_suppresses() {
        let (mut engine, _dir) = engine().await;
        let flood_phrases = engine.strings.list("flood.phrases");

        let mut outcomes = Vec::new();
        for (i, secs) in [0, 5, 10, 15].into_iter().enumerate() {
            let update = update_at(i as u32, OPERATIONAL_CHAT, USER, "hello", secs);
            outcomes.push(engine.handle_update(&update).await);
        }

        assert_eq!(
            outcomes,
            vec![
                Outcome::Unhandled,
                Outcome::Unhandled,
                Outcome::Flooded,
                Outcome::Flooded
            ]
        );
        let texts = engine.transport.texts();
        assert_eq!(texts.len(), 1);
        assert!(flood_phrases.contains(&texts[0]));
    }

    #[tokio::test]
    async fn test_flood_consumes_commands() {
        let (mut engine, _dir) = engine().await;

        for secs in [0, 1] {
            let update = update_at(1, OPERATIONAL_CHAT, USER, "/help", secs);
            assert_eq!(engine.handle_update(&update).await, Outcome::Handled);
        }
        engine.transport.clear();

        let update = update_at(1, OPERATIONAL_CHAT, USER, "/help", 2);
        assert_eq!(engine.handle_update(&update).await, Outcome::Flooded);
        assert!(!engine.transport.texts().contains(&engine.strings.text("help.text")));
    }

    #[tokio::test]
    async fn test_flood_resets_after_window() {
        let (mut engine, _dir) = engine().await;

        for (secs, expected) in [
            (0, Outcome::Unhandled),
            (10, Outcome::Unhandled),
            (70, Outcome::Unhandled),
            (71, Outcome::Unhandled),
        ] {
            let update = update_at(1, OPERATIONAL_CHAT, USER, "hello", secs);
            assert_eq!(engine.handle_update(&update).await, expected);
        }
        assert!(engine.transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_invasive_taunt_does_not_consume() {
        let (engine, _dir) = engine().await;
        let mut engine = engine.with_flood_guard(FloodGuard::new().with_taunt_chance(1.0));
        engine.permissions = Permissions::new(
            [ADMIN],
            [OPERATIONAL_CHAT, INVASIVE_CHAT],
            [],
            [],
            [INVASIVE_CHAT],
        );
        let mut taunts = engine.strings.list("flood.phrases");
        taunts.extend(engine.strings.list("flood.invasive_phrases"));

        let outcome = send(&mut engine, INVASIVE_CHAT, USER, "/help").await;

        assert_eq!(outcome, Outcome::Handled);
        let texts = engine.transport.texts();
        assert_eq!(texts.len(), 2);
        assert!(taunts.contains(&texts[0]));
        assert_eq!(texts[1], engine.strings.text("help.text"));
    }

    #[tokio::test]
    async fn test_invasive_chat_still_needs_a_tier() {
        let (mut engine, _dir) = engine().await;

        assert_eq!(send(&mut engine, INVASIVE_CHAT, USER, "hi").await, Outcome::Dropped);
    }

    #[tokio::test]
    async fn test_mk_kw_then_free_text() {
        let (mut engine, _dir) = engine().await;

        let outcome = send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_kw foo bar").await;
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(engine.transport.texts(), vec!["foo => bar"]);

        engine.transport.clear();
        let outcome = send(&mut engine, OPERATIONAL_CHAT, USER, "I like foo").await;
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(engine.transport.texts(), vec!["bar"]);
    }

    #[tokio::test]
    async fn test_free_text_without_match_is_silent() {
        let (mut engine, _dir) = engine().await;

        let outcome = send(&mut engine, OPERATIONAL_CHAT, USER, "just chatting").await;
        assert_eq!(outcome, Outcome::Unhandled);
        assert!(engine.transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_alias_admin_commands() {
        let (mut engine, _dir) = engine().await;

        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_kw cat meow").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_sym cat kitty").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_sym kitty cat").await;
        assert_eq!(
            engine.transport.texts(),
            vec![
                "cat => meow".to_string(),
                "kitty -> cat".to_string(),
                "`cat` is already a keyword, pick another alias.".to_string(),
            ]
        );

        engine.transport.clear();
        send(&mut engine, OPERATIONAL_CHAT, USER, "what a kitty").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_kw kitty purr").await;
        assert_eq!(
            engine.transport.texts(),
            vec!["meow".to_string(), "(kitty -> cat) => purr".to_string()]
        );

        let rows = engine.store.contents(KeywordSpace::Text, "cat").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_admin_listing_and_removal() {
        let (mut engine, _dir) = engine().await;

        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_kw foo bar").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_sym foo fu").await;
        engine.transport.clear();

        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm ls_kw").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm ls_kw fu").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm rm_kw 1").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm rm_kw 99").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm rm_kw").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm frobnicate").await;

        let texts = engine.transport.texts();
        assert_eq!(texts[0], "Supported keywords:\nfoo\nfu -> foo");
        assert_eq!(texts[1], "(fu -> foo) =>\n#1 bar");
        assert_eq!(texts[2], "Removed #1.");
        assert_eq!(texts[3], "No row #99.");
        assert!(texts[4].starts_with("Usage: /adm"));
        assert_eq!(texts[5], "adm what? owo");

        engine.transport.clear();
        let outcome = send(&mut engine, OPERATIONAL_CHAT, USER, "foo again").await;
        assert_eq!(outcome, Outcome::Unhandled);
    }

    #[tokio::test]
    async fn test_adm_is_silent_for_non_admins() {
        let (mut engine, _dir) = engine().await;

        let outcome = send(&mut engine, OPERATIONAL_CHAT, USER, "/adm mk_kw foo bar").await;
        assert_eq!(outcome, Outcome::Handled);
        assert!(engine.transport.texts().is_empty());
        assert!(engine.store.contents(KeywordSpace::Text, "foo").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restricted_roll() {
        let (mut engine, _dir) = engine().await;

        let outcome = send(&mut engine, RESTRICTED_CHAT, USER, "/roll 2d6").await;
        assert_eq!(outcome, Outcome::Handled);

        let reply = engine.transport.texts().remove(0);
        let (lhs, sum) = reply.split_once(" = ").unwrap();
        let rolls: Vec<u32> = lhs
            .trim_start_matches("2d6 : (")
            .trim_end_matches(')')
            .split(", ")
            .map(|r| r.parse().unwrap())
            .collect();

        assert_eq!(rolls.len(), 2);
        assert!(rolls.iter().all(|r| (1..=6).contains(r)));
        assert_eq!(sum.parse::<u32>().unwrap(), rolls.iter().sum::<u32>());
    }

    #[tokio::test]
    async fn test_restricted_roll_caps_dice() {
        let (mut engine, _dir) = engine().await;

        send(&mut engine, RESTRICTED_CHAT, USER, "/roll 500d6").await;

        let reply = engine.transport.texts().remove(0);
        assert!(reply.starts_with("100d6 : ("));
        let inner = reply.split_once('(').unwrap().1.split_once(')').unwrap().0;
        assert_eq!(inner.split(", ").count(), 100);
    }

    #[tokio::test]
    async fn test_restricted_chat_has_no_get() {
        let (mut engine, _dir) = engine().await;

        let outcome = send(&mut engine, RESTRICTED_CHAT, USER, "/get dog").await;
        assert_eq!(outcome, Outcome::Unhandled);
        assert!(engine.transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_chat_notified_once() {
        let (mut engine, _dir) = engine().await;

        assert_eq!(send(&mut engine, UNKNOWN_CHAT, USER, "hi").await, Outcome::Dropped);
        assert_eq!(send(&mut engine, UNKNOWN_CHAT, USER, "anyone?").await, Outcome::Dropped);

        assert_eq!(
            engine.transport.texts(),
            vec![engine.strings.text("register.notice"), UNKNOWN_CHAT.to_string()]
        );
    }

    #[tokio::test]
    async fn test_stop_and_resume() {
        let (mut engine, _dir) = engine().await;

        send(&mut engine, OPERATIONAL_CHAT, USER, "bot go to sleep").await;
        assert!(engine.running);
        assert_eq!(engine.transport.texts(), vec!["Only admins can put me to sleep."]);

        engine.transport.clear();
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "bot go to sleep").await;
        assert!(!engine.running);
        assert_eq!(engine.transport.texts(), vec!["Good night."]);

        engine.transport.clear();
        assert_eq!(send(&mut engine, OPERATIONAL_CHAT, USER, "/roll").await, Outcome::Unhandled);
        assert_eq!(send(&mut engine, OPERATIONAL_CHAT, USER, "bot wake up").await, Outcome::Unhandled);
        assert_eq!(send(&mut engine, OPERATIONAL_CHAT, USER, "bot status?").await, Outcome::Handled);
        assert_eq!(engine.transport.texts(), vec![engine.strings.text("status.stopped")]);

        engine.transport.clear();
        assert_eq!(send(&mut engine, OPERATIONAL_CHAT, ADMIN, "bot wake up").await, Outcome::Handled);
        assert!(engine.running);
        assert_eq!(engine.transport.texts(), vec![engine.strings.text("control.resumed")]);
    }

    #[tokio::test]
    async fn test_resume_keeps_bot_stopped_when_reload_fails() {
        let (mut engine, _dir) = engine().await;
        engine.running = false;
        engine.store.set_failing(true);

        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "bot wake up").await;

        assert!(!engine.running);
        let texts = engine.transport.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Reloading the keyword table failed"));
    }

    #[tokio::test]
    async fn test_reload_failure_is_reported() {
        let (mut engine, _dir) = engine().await;
        engine.store.set_failing(true);

        let outcome = send(&mut engine, OPERATIONAL_CHAT, ADMIN, "bot reload keywords").await;

        assert_eq!(outcome, Outcome::Handled);
        let texts = engine.transport.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("store offline"));
    }

    #[tokio::test]
    async fn test_motd_flow() {
        let (mut engine, _dir) = engine().await;

        send(&mut engine, MOTD_CHAT, USER, "motd today").await;
        send(&mut engine, MOTD_CHAT, ADMIN, "/motd Ship It").await;
        send(&mut engine, MOTD_CHAT, USER, "what's todays highlight?").await;
        send(&mut engine, 1, ADMIN, "/motd").await;

        assert_eq!(
            engine.transport.texts(),
            vec![
                "No message of the day yet.".to_string(),
                "Message of the day updated (2023-11-14).".to_string(),
                "[2023-11-14]\nShip It".to_string(),
                "Messages of the day only work in group chats.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_motd_stale_on_later_day() {
        let (mut engine, _dir) = engine().await;

        send(&mut engine, MOTD_CHAT, ADMIN, "/motd hello").await;
        engine.transport.clear();

        let update = update_at(2, MOTD_CHAT, USER, "/motd", 86_400);
        engine.handle_update(&update).await;

        assert_eq!(
            engine.transport.texts(),
            vec!["[2023-11-14] (not updated today)\nhello"]
        );
    }

    #[tokio::test]
    async fn test_motd_only_chat_gets_nothing_else() {
        let (mut engine, _dir) = engine().await;

        assert_eq!(send(&mut engine, MOTD_CHAT, USER, "/roll").await, Outcome::Unhandled);
        assert!(engine.transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_get_photo_commands() {
        let (mut engine, _dir) = engine().await;

        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_get AbC123 Dog Cute").await;
        assert_eq!(engine.transport.photos(), vec![PhotoSource::FileId("AbC123".into())]);
        assert_eq!(engine.transport.texts(), vec!["dog => AbC123"]);

        engine.transport.clear();
        send(&mut engine, OPERATIONAL_CHAT, USER, "/get dog cute").await;
        send(&mut engine, OPERATIONAL_CHAT, USER, "/getid 1").await;
        assert_eq!(
            engine.transport.photos(),
            vec![
                PhotoSource::FileId("AbC123".into()),
                PhotoSource::FileId("AbC123".into())
            ]
        );

        engine.transport.clear();
        send(&mut engine, OPERATIONAL_CHAT, USER, "/get").await;
        send(&mut engine, OPERATIONAL_CHAT, USER, "/get cat").await;
        let texts = engine.transport.texts();
        assert_eq!(texts[0], "/get <keyword> [tag]");
        assert!(texts[1].starts_with("You get nothing! "));
        assert!(texts[1].ends_with('😃'));
    }

    #[tokio::test]
    async fn test_mk_get_reports_send_failure() {
        let (mut engine, _dir) = engine().await;
        engine.transport.fail_photos = true;

        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_get bad-ref dog").await;

        assert_eq!(engine.transport.texts(), vec!["ERROR ON: dog => bad-ref"]);
        assert!(engine.store.contents(KeywordSpace::Photo, "dog").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_photo_relay_needs_mode_and_admin() {
        let (mut engine, _dir) = engine().await;
        let photo = |user_id| {
            let mut msg = message(OPERATIONAL_CHAT, user_id, "");
            msg.text = None;
            msg.photo_refs = vec!["small".to_string(), "big".to_string()];
            Update {
                id: 9,
                message: Some(msg),
            }
        };

        assert_eq!(engine.handle_update(&photo(ADMIN)).await, Outcome::Ignored);

        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm begin_get").await;
        assert!(engine.accepting_photos);
        engine.transport.clear();

        assert_eq!(engine.handle_update(&photo(USER)).await, Outcome::Ignored);
        assert_eq!(engine.handle_update(&photo(ADMIN)).await, Outcome::Handled);
        assert_eq!(engine.transport.photos(), vec![PhotoSource::FileId("big".into())]);
        assert_eq!(engine.transport.texts(), vec!["big"]);
    }

    #[tokio::test]
    async fn test_bulk_upload() {
        let (mut engine, dir) = engine().await;

        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "bot upload photos").await;
        assert_eq!(engine.transport.texts(), vec![engine.strings.text("photos.bulk_empty")]);

        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        std::fs::write(images.join("a.jpg"), b"x").unwrap();
        engine.transport.clear();

        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "bot upload photos now").await;
        assert_eq!(
            engine.transport.photos(),
            vec![PhotoSource::Path(images.join("a.jpg"))]
        );
        assert_eq!(
            engine.transport.texts(),
            vec![format!("uploaded:{}", images.join("a.jpg").display())]
        );
    }

    #[tokio::test]
    async fn test_mention_is_stripped() {
        let (mut engine, _dir) = engine().await;

        send(&mut engine, OPERATIONAL_CHAT, USER, "/roll@Test_Bot 1d1").await;

        assert_eq!(engine.transport.texts(), vec!["1d1 : (1) = 1"]);
    }

    #[tokio::test]
    async fn test_fortune_in_restricted_chat() {
        let (mut engine, _dir) = engine().await;

        send(&mut engine, RESTRICTED_CHAT, USER, "Today's fortune please").await;

        let reply = engine.transport.texts().remove(0);
        let level = reply.strip_prefix("today's fortune: ").unwrap();
        assert!(engine.strings.list("fortune.levels").contains(&level.to_string()));
    }

    #[tokio::test]
    async fn test_failure_sends_apology_and_continues() {
        let (mut engine, _dir) = engine().await;
        engine.store.set_failing(true);

        let outcome = send(&mut engine, OPERATIONAL_CHAT, USER, "/getid 5").await;
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(engine.transport.texts(), vec![engine.strings.text("common.apology")]);

        engine.store.set_failing(false);
        let outcome = send(&mut engine, OPERATIONAL_CHAT, USER, "/help").await;
        assert_eq!(outcome, Outcome::Handled);
    }

    #[tokio::test]
    async fn test_failed_send_reconnects_transport() {
        let (mut engine, _dir) = engine().await;
        engine.transport.fail_texts = true;

        let outcome = send(&mut engine, OPERATIONAL_CHAT, USER, "/help").await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(engine.transport.reconnects, 1);

        engine.transport.fail_texts = false;
        assert_eq!(send(&mut engine, OPERATIONAL_CHAT, USER, "/roll 1d1").await, Outcome::Handled);
        assert_eq!(engine.transport.texts(), vec!["1d1 : (1) = 1"]);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_transport() {
        let (mut engine, _dir) = engine().await;
        engine.store.set_failing(true);

        send(&mut engine, OPERATIONAL_CHAT, USER, "/getid 5").await;

        assert_eq!(engine.transport.reconnects, 0);
    }

    #[tokio::test]
    async fn test_admin_edit_reports_reload_failure() {
        let (mut engine, _dir) = engine().await;
        engine.store.set_failing_loads(true);

        let outcome = send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm mk_kw foo bar").await;
        send(&mut engine, OPERATIONAL_CHAT, ADMIN, "/adm rm_kw 1").await;

        assert_eq!(outcome, Outcome::Handled);
        let texts = engine.transport.texts();
        assert_eq!(texts.len(), 2);
        assert!(texts.iter().all(|t| {
            t.starts_with("Reloading the keyword table failed") && t.contains("store offline")
        }));
    }

    #[tokio::test]
    async fn test_oversized_roll_modifier_gets_usage() {
        let (mut engine, _dir) = engine().await;

        let outcome = send(&mut engine, RESTRICTED_CHAT, USER, "/roll 1d6+9223372036854775807").await;

        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(engine.transport.texts(), vec![engine.strings.text("roll.usage")]);
    }

    #[tokio::test]
    async fn test_lookalike_commands_do_not_run() {
        let (mut engine, _dir) = engine().await;

        for text in ["/rolling 5", "/helpful", "/getaway x", "/motdx hi"] {
            assert_eq!(send(&mut engine, OPERATIONAL_CHAT, USER, text).await, Outcome::Unhandled, "{text}");
        }
        assert!(engine.transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_non_message_update_is_ignored() {
        let (mut engine, _dir) = engine().await;

        let update = Update {
            id: 3,
            message: None,
        };
        assert_eq!(engine.handle_update(&update).await, Outcome::Ignored);
    }
}
