//! Utility functions.
//!
//! Small text helpers shared by the dispatcher and the plugins.

use rand::Rng;

/// Remove a trailing `@username` from the command word, so
/// `/get@my_bot dog` reads as `/get dog`. Matching is case-insensitive.
pub fn strip_mention(text: &str, username: &str) -> String {
    if username.is_empty() || !text.starts_with('/') {
        return text.to_string();
    }

    let head_len = text.find(char::is_whitespace).unwrap_or(text.len());
    let (head, rest) = text.split_at(head_len);
    let mention_len = username.len() + 1;

    if head.len() > mention_len {
        let cut = head.len() - mention_len;
        if head.is_char_boundary(cut) {
            let (command, mention) = head.split_at(cut);
            if mention.starts_with('@') && mention[1..].eq_ignore_ascii_case(username) {
                return format!("{command}{rest}");
            }
        }
    }

    text.to_string()
}

/// Replace `{name}` placeholders in a template, in one pass. Inserted
/// values are never scanned again; unknown placeholders stay as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Append one to three smileys.
pub fn append_smiles<R: Rng>(text: &str, rng: &mut R) -> String {
    let count = rng.gen_range(1..=3);
    format!("{}{}", text, "😃".repeat(count))
}

/// Everything after the command word, trimmed.
pub fn command_args(text: &str) -> &str {
    text.split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("")
}
