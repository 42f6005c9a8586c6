//! Permission system for chat tiers and admins.
//!
//! Every update is classified by the chat it came from and the user who
//! sent it. Chats fall into escalating tiers:
//!
//! - operational: full command surface (admins' private chats included)
//! - restricted: a reduced command subset
//! - motd-only: only the message-of-the-day flow
//! - anything else is unrecognized and dropped
//!
//! ## Usage
//!
//! ```rust
//! let perms = Permissions::from_config(&config);
//!
//! if !perms.is_augmented(chat_id) {
//!     // drop the update
//! }
//! ```

mod checker;

pub use checker::Permissions;
