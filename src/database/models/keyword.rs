//! Keyword table documents.
//!
//! Four collections share two shapes:
//! - `resp` / `resp_get`: keyword -> content rows (`resp_get` rows carry an optional tag)
//! - `symptom` / `symptom_get`: alias -> canonical keyword rows

use serde::{Deserialize, Serialize};

/// Which keyword space a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordSpace {
    /// Free-text replies.
    Text,
    /// Photo replies served by `/get`.
    Photo,
}

impl KeywordSpace {
    /// Collection holding content rows.
    pub fn content_table(self) -> &'static str {
        match self {
            Self::Text => "resp",
            Self::Photo => "resp_get",
        }
    }

    /// Collection holding alias rows.
    pub fn alias_table(self) -> &'static str {
        match self {
            Self::Text => "symptom",
            Self::Photo => "symptom_get",
        }
    }
}

/// A keyword -> content row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRow {
    /// Stable integer id used by delete commands
    #[serde(rename = "_id")]
    pub id: i64,

    /// Canonical keyword (lowercase)
    pub keyword: String,

    /// Reply text, or a photo reference for the photo space
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// An alias -> canonical keyword row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRow {
    #[serde(rename = "_id")]
    pub id: i64,

    pub alias: String,

    pub keyword: String,
}

/// Id sequence document in the `counters` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    /// Name of the collection the sequence belongs to
    #[serde(rename = "_id")]
    pub name: String,

    pub seq: i64,
}
