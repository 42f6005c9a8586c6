//! Per-chat message of the day, persisted as a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use tracing::{debug, info};

use super::models::MotdEntry;

/// Freshness of a chat's message of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotdStatus<'a> {
    Missing,
    /// Set on an earlier day.
    Stale(&'a MotdEntry),
    /// Set today.
    Fresh(&'a MotdEntry),
}

/// File-backed message of the day table, keyed by chat id.
#[derive(Debug)]
pub struct MotdStore {
    path: PathBuf,
    entries: BTreeMap<String, MotdEntry>,
}

impl MotdStore {
    /// Load the table. A missing file yields an empty table.
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("malformed motd file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No motd file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        Ok(Self { path, entries })
    }

    pub fn status(&self, chat_id: i64, today: NaiveDate) -> MotdStatus<'_> {
        match self.entries.get(&chat_id.to_string()) {
            None => MotdStatus::Missing,
            Some(entry) if entry.is_fresh(today) => MotdStatus::Fresh(entry),
            Some(entry) => MotdStatus::Stale(entry),
        }
    }

    /// Replace a chat's message and write the table to disk.
    pub fn update(&mut self, chat_id: i64, msg: &str, today: NaiveDate) -> anyhow::Result<()> {
        self.entries.insert(
            chat_id.to_string(),
            MotdEntry {
                msg: msg.to_string(),
                date: today,
            },
        );
        self.persist()?;
        debug!("Motd for chat {} updated", chat_id);
        Ok(())
    }

    /// Write through a temporary file so a crash never leaves a torn table.
    fn persist(&self) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        let tmp = tmp_path(&self.path);

        std::fs::write(&tmp, raw).with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
