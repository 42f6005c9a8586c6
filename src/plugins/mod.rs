//! Command plugins.
//!
//! Commands live in two ordered rule lists: the full list for operational
//! chats and a reduced one for restricted chats. The first rule whose
//! matcher accepts a message runs. Admin-only rules still consume a
//! message from a non-admin; they just answer with the rule's denial text
//! (if any) instead of running.
//!
//! Add new commands by:
//! 1. Creating a handler in this directory
//! 2. Adding an [`Action`] variant and its arm in `execute_first_match`
//! 3. Registering a rule in [`CallbackRegistry::new`]

pub mod admin;
pub mod control;
pub mod fortune;
pub mod get;
pub mod help;
pub mod motd;
pub mod photos;
pub mod roll;

use std::fmt;

use tracing::debug;

use crate::bot::dispatcher::{BotEngine, CommandContext};
use crate::bot::transport::Transport;
use crate::database::KeywordStore;
use crate::i18n::Strings;

/// What a handler did about replying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Done; send the rule's confirmation text.
    Acknowledge,
    /// The handler already answered.
    Replied,
}

/// How a rule recognizes its message.
#[derive(Clone)]
pub enum Matcher {
    /// First word of the lowercased, mention-stripped text is this command.
    Command(&'static str),
    /// Lowercased, mention-stripped text starts with this.
    Prefix(String),
    /// Arbitrary test over the lowercased text.
    Predicate(fn(&str, &Strings) -> bool),
}

impl Matcher {
    fn matches(&self, lowered: &str, strings: &Strings) -> bool {
        match self {
            Self::Command(command) => is_command(lowered, command),
            Self::Prefix(prefix) => lowered.starts_with(prefix.as_str()),
            Self::Predicate(test) => test(lowered, strings),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(command) => f.debug_tuple("Command").field(command).finish(),
            Self::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            Self::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// Whether the first word of `lowered` is exactly `command`.
pub fn is_command(lowered: &str, command: &str) -> bool {
    lowered.split_whitespace().next() == Some(command)
}

/// Handler to run for a matched rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reload,
    Stop,
    PhotosOn,
    PhotosOff,
    Admin,
    GetById,
    Get,
    Roll,
    Help,
    Fortune,
}

#[derive(Debug, Clone)]
pub struct CallbackRule {
    pub name: &'static str,
    pub requires_admin: bool,
    pub matcher: Matcher,
    pub action: Action,
    pub ok_reply: Option<String>,
    pub ng_reply: Option<String>,
}

impl CallbackRule {
    fn new(name: &'static str, matcher: Matcher, action: Action) -> Self {
        Self {
            name,
            requires_admin: false,
            matcher,
            action,
            ok_reply: None,
            ng_reply: None,
        }
    }

    fn prefix(name: &'static str, prefix: &str, action: Action) -> Self {
        Self::new(name, Matcher::Prefix(prefix.to_lowercase()), action)
    }

    fn command(name: &'static str, command: &'static str, action: Action) -> Self {
        Self::new(name, Matcher::Command(command), action)
    }

    /// Admin only, answering `ng_reply` to everyone else.
    fn admin_only(mut self, ng_reply: Option<String>) -> Self {
        self.requires_admin = true;
        self.ng_reply = ng_reply;
        self
    }

    fn ok(mut self, ok_reply: String) -> Self {
        self.ok_reply = Some(ok_reply);
        self
    }
}

/// Which rule list to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    Full,
    Restricted,
}

/// The two ordered rule lists.
#[derive(Debug, Clone)]
pub struct CallbackRegistry {
    full: Vec<CallbackRule>,
    restricted: Vec<CallbackRule>,
}

impl CallbackRegistry {
    /// Build both lists. Phrase triggers and canned replies come from `strings`.
    pub fn new(strings: &Strings) -> Self {
        let roll = CallbackRule::command("roll", "/roll", Action::Roll);
        let help = CallbackRule::command("help", "/help", Action::Help);
        let fortune = CallbackRule::new(
            "fortune",
            Matcher::Predicate(fortune::is_fortune_query),
            Action::Fortune,
        );

        let full = vec![
            CallbackRule::prefix("reload", &strings.text("control.reload"), Action::Reload)
                .admin_only(Some(strings.text("control.reload_denied")))
                .ok(strings.text("control.reloaded")),
            CallbackRule::prefix("stop", &strings.text("control.stop"), Action::Stop)
                .admin_only(Some(strings.text("control.stop_denied")))
                .ok(strings.text("control.stopped")),
            CallbackRule::prefix("photos_on", &strings.text("photos.accept_on"), Action::PhotosOn)
                .admin_only(Some(strings.text("photos.accept_on_denied")))
                .ok(strings.text("photos.accept_on_ok")),
            CallbackRule::prefix("photos_off", &strings.text("photos.accept_off"), Action::PhotosOff)
                .admin_only(Some(strings.text("photos.accept_off_denied")))
                .ok(strings.text("photos.accept_off_ok")),
            CallbackRule::command("adm", "/adm", Action::Admin).admin_only(None),
            CallbackRule::command("getid", "/getid", Action::GetById),
            CallbackRule::command("get", "/get", Action::Get),
            roll.clone(),
            help.clone(),
            fortune.clone(),
        ];

        Self {
            full,
            restricted: vec![roll, help, fortune],
        }
    }

    fn rules(&self, set: RuleSet) -> &[CallbackRule] {
        match set {
            RuleSet::Full => &self.full,
            RuleSet::Restricted => &self.restricted,
        }
    }

    /// First rule in `set` accepting the lowercased text.
    pub fn find(&self, set: RuleSet, lowered: &str, strings: &Strings) -> Option<&CallbackRule> {
        self.rules(set)
            .iter()
            .find(|rule| rule.matcher.matches(lowered, strings))
    }
}

impl<T: Transport, S: KeywordStore> BotEngine<T, S> {
    /// Run the first matching rule. Returns whether any rule matched.
    pub(crate) async fn execute_first_match(
        &mut self,
        set: RuleSet,
        ctx: &CommandContext,
    ) -> anyhow::Result<bool> {
        let Some(rule) = self.registry.find(set, &ctx.lowered, &self.strings).cloned() else {
            return Ok(false);
        };

        if rule.requires_admin && !ctx.admin {
            debug!("Rule '{}' denied for user {}", rule.name, ctx.user_id);
            if let Some(ng) = &rule.ng_reply {
                self.reply(ctx, ng).await?;
            }
            return Ok(true);
        }

        debug!("Rule '{}' matched in chat {}", rule.name, ctx.chat_id);

        let outcome = match rule.action {
            Action::Reload => control::reload(self, ctx).await?,
            Action::Stop => control::stop(self, ctx).await?,
            Action::PhotosOn => photos::accept_photos(self, true),
            Action::PhotosOff => photos::accept_photos(self, false),
            Action::Admin => admin::adm_command(self, ctx).await?,
            Action::GetById => get::get_by_id_command(self, ctx).await?,
            Action::Get => get::get_command(self, ctx).await?,
            Action::Roll => roll::roll_command(self, ctx).await?,
            Action::Help => help::help_command(self, ctx).await?,
            Action::Fortune => fortune::fortune_command(self, ctx).await?,
        };

        if outcome == HandlerOutcome::Acknowledge
            && let Some(ok) = &rule.ok_reply
        {
            self.reply(ctx, ok).await?;
        }

        Ok(true)
    }
}
