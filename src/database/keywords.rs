//! In-memory keyword index.
//!
//! Holds, per keyword space, the canonical keywords and the alias table so
//! free text can be matched without touching the store. Content itself is
//! sampled from the store at lookup time.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use super::models::KeywordSpace;
use super::store::{KeywordStore, StoreError};

/// Lookup tables for one keyword space.
#[derive(Debug, Clone, Default)]
struct SpaceIndex {
    keywords: HashSet<String>,
    /// alias -> canonical keyword
    aliases: HashMap<String, String>,
    /// Keywords and aliases, sorted so a seeded shuffle is reproducible.
    unified: Vec<String>,
}

impl SpaceIndex {
    async fn load<S: KeywordStore>(store: &S, space: KeywordSpace) -> Result<Self, StoreError> {
        let keywords: HashSet<String> = store
            .keywords(space)
            .await?
            .into_iter()
            .filter(|k| !k.is_empty())
            .collect();

        let aliases: HashMap<String, String> = store
            .aliases(space)
            .await?
            .into_iter()
            .filter(|row| !row.alias.is_empty())
            .map(|row| (row.alias, row.keyword))
            .collect();

        let mut unified: Vec<String> = keywords.iter().chain(aliases.keys()).cloned().collect();
        unified.sort();
        unified.dedup();

        Ok(Self {
            keywords,
            aliases,
            unified,
        })
    }

    /// Resolve one alias hop.
    fn canonical<'a>(&'a self, keyword: &'a str) -> &'a str {
        self.aliases.get(keyword).map_or(keyword, String::as_str)
    }

    /// A trigger whose canonical keyword has content.
    fn is_live(&self, trigger: &str) -> bool {
        self.keywords.contains(self.canonical(trigger))
    }

    fn knows(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword) || self.aliases.contains_key(keyword)
    }
}

/// Keyword and alias lookup for both spaces.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    text: SpaceIndex,
    photo: SpaceIndex,
}

impl KeywordIndex {
    /// Build a fresh index from the store.
    pub async fn load<S: KeywordStore>(store: &S) -> Result<Self, StoreError> {
        let text = SpaceIndex::load(store, KeywordSpace::Text).await?;
        let photo = SpaceIndex::load(store, KeywordSpace::Photo).await?;

        info!(
            "Keyword index loaded: {} text triggers, {} photo triggers",
            text.unified.len(),
            photo.unified.len()
        );

        Ok(Self { text, photo })
    }

    /// Rebuild from the store. On error the current index is left untouched.
    pub async fn reload<S: KeywordStore>(&mut self, store: &S) -> Result<(), StoreError> {
        *self = Self::load(store).await?;
        Ok(())
    }

    fn space(&self, space: KeywordSpace) -> &SpaceIndex {
        match space {
            KeywordSpace::Text => &self.text,
            KeywordSpace::Photo => &self.photo,
        }
    }

    /// Find a reply for free text.
    ///
    /// Triggers are scanned in shuffled order and the first one contained in
    /// the message wins. Aliases of keywords without content are skipped.
    pub async fn resolve_text<S: KeywordStore, R: Rng>(
        &self,
        store: &S,
        message: &str,
        rng: &mut R,
    ) -> Result<Option<String>, StoreError> {
        let message = message.to_lowercase();

        let mut order: Vec<&String> = self.text.unified.iter().collect();
        order.shuffle(rng);

        let Some(trigger) = order
            .into_iter()
            .find(|kw| message.contains(kw.as_str()) && self.text.is_live(kw))
        else {
            return Ok(None);
        };

        let keyword = self.text.canonical(trigger);
        debug!("Text trigger '{}' -> '{}'", trigger, keyword);

        Ok(store
            .random_content(KeywordSpace::Text, keyword, None)
            .await?
            .map(|row| row.content))
    }

    /// Find a photo for an exact keyword, preferring rows with `tag`.
    pub async fn resolve_photo<S: KeywordStore>(
        &self,
        store: &S,
        keyword: &str,
        tag: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        let keyword = keyword.trim().to_lowercase();
        if !self.photo.knows(&keyword) {
            return Ok(None);
        }
        let keyword = self.photo.canonical(&keyword);

        if let Some(tag) = tag {
            let tag = tag.to_lowercase();
            if let Some(row) = store
                .random_content(KeywordSpace::Photo, keyword, Some(&tag))
                .await?
            {
                return Ok(Some(row.content));
            }
        }

        Ok(store
            .random_content(KeywordSpace::Photo, keyword, None)
            .await?
            .map(|row| row.content))
    }

    /// Canonical keyword for `keyword` (itself when not an alias).
    pub fn canonical<'a>(&'a self, space: KeywordSpace, keyword: &'a str) -> &'a str {
        self.space(space).canonical(keyword)
    }

    /// Whether `keyword` is a canonical keyword with content.
    pub fn is_keyword(&self, space: KeywordSpace, keyword: &str) -> bool {
        self.space(space).keywords.contains(keyword)
    }

    /// Sorted listing of every trigger; aliases are shown as `alias -> keyword`.
    pub fn listing(&self, space: KeywordSpace) -> Vec<String> {
        let index = self.space(space);
        index
            .unified
            .iter()
            .map(|trigger| match index.aliases.get(trigger) {
                Some(keyword) => format!("{trigger} -> {keyword}"),
                None => trigger.clone(),
            })
            .collect()
    }
}
