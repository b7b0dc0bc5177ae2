//! Watch-history store.
//!
//! Per-device playback positions kept in SQLite. A device has at most one row
//! per anime/episode pair; saving again overwrites the position.

use crate::models::{HistoryEntry, NewHistoryEntry};
use crate::Database;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "id, device_id, anime_slug, episode_slug, title,
    position_seconds, duration_seconds, created_at, updated_at";

/// Watch-history manager
pub struct HistoryStore {
    db: Database,
}

impl HistoryStore {
    /// Create a new history store with the given database
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Save a playback position (insert or update)
    ///
    /// Returns the row ID of the stored entry.
    pub fn save(&mut self, entry: &NewHistoryEntry) -> Result<i64> {
        let conn = self.db.conn_mut();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO watch_history (
                device_id, anime_slug, episode_slug, title,
                position_seconds, duration_seconds, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(device_id, anime_slug, episode_slug) DO UPDATE SET
                title = COALESCE(excluded.title, watch_history.title),
                position_seconds = excluded.position_seconds,
                duration_seconds = COALESCE(excluded.duration_seconds, watch_history.duration_seconds),
                updated_at = excluded.updated_at",
            params![
                entry.device_id,
                entry.anime_slug,
                entry.episode_slug,
                entry.title,
                entry.position_seconds,
                entry.duration_seconds,
                now,
            ],
        )
        .context("Failed to save history entry")?;

        let id: i64 = conn
            .query_row(
                "SELECT id FROM watch_history
                 WHERE device_id = ?1 AND anime_slug = ?2 AND episode_slug = ?3",
                params![entry.device_id, entry.anime_slug, entry.episode_slug],
                |row| row.get(0),
            )
            .context("Failed to read back history entry")?;

        debug!(
            id,
            device_id = %entry.device_id,
            anime_slug = %entry.anime_slug,
            episode_slug = %entry.episode_slug,
            position = entry.position_seconds,
            "Saved history entry"
        );

        Ok(id)
    }

    /// List a device's history, most recently updated first
    pub fn list(&self, device_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM watch_history
             WHERE device_id = ?1
             ORDER BY updated_at DESC, id DESC
             LIMIT ?2"
        ))?;

        let entries = stmt
            .query_map(params![device_id, limit as i64], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list history")?;

        Ok(entries)
    }

    /// Get one entry for a device/anime/episode triple
    pub fn get(
        &self,
        device_id: &str,
        anime_slug: &str,
        episode_slug: &str,
    ) -> Result<Option<HistoryEntry>> {
        self.db
            .conn()
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM watch_history
                     WHERE device_id = ?1 AND anime_slug = ?2 AND episode_slug = ?3"
                ),
                params![device_id, anime_slug, episode_slug],
                row_to_entry,
            )
            .optional()
            .context("Failed to query history entry")
    }

    /// Remove every entry for one anime on a device
    pub fn delete(&mut self, device_id: &str, anime_slug: &str) -> Result<usize> {
        let removed = self
            .db
            .conn_mut()
            .execute(
                "DELETE FROM watch_history WHERE device_id = ?1 AND anime_slug = ?2",
                params![device_id, anime_slug],
            )
            .context("Failed to delete history entries")?;

        info!(device_id, anime_slug, removed, "Deleted history entries");
        Ok(removed)
    }

    /// Remove a device's entire history
    pub fn clear(&mut self, device_id: &str) -> Result<usize> {
        let removed = self
            .db
            .conn_mut()
            .execute(
                "DELETE FROM watch_history WHERE device_id = ?1",
                params![device_id],
            )
            .context("Failed to clear history")?;

        info!(device_id, removed, "Cleared device history");
        Ok(removed)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        device_id: row.get(1)?,
        anime_slug: row.get(2)?,
        episode_slug: row.get(3)?,
        title: row.get(4)?,
        position_seconds: row.get(5)?,
        duration_seconds: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_entry(device: &str, anime: &str, episode: &str, position: f64) -> NewHistoryEntry {
        NewHistoryEntry {
            device_id: device.to_string(),
            anime_slug: anime.to_string(),
            episode_slug: episode.to_string(),
            title: Some(format!("{anime} {episode}")),
            position_seconds: position,
            duration_seconds: Some(1440.0),
        }
    }

    fn store() -> Result<HistoryStore> {
        Ok(HistoryStore::new(Database::open_in_memory()?))
    }

    #[test]
    fn test_save_and_get() -> Result<()> {
        let mut store = store()?;

        let id = store.save(&new_entry("dev", "frieren", "ep-1", 120.0))?;
        assert!(id > 0);

        let entry = store.get("dev", "frieren", "ep-1")?.expect("entry should exist");
        assert_eq!(entry.id, id);
        assert_eq!(entry.position_seconds, 120.0);
        assert_eq!(entry.progress(), Some(120.0 / 1440.0));

        assert!(store.get("other", "frieren", "ep-1")?.is_none());
        Ok(())
    }

    #[test]
    fn test_save_twice_updates_in_place() -> Result<()> {
        let mut store = store()?;

        let first = store.save(&new_entry("dev", "frieren", "ep-1", 120.0))?;

        let mut update = new_entry("dev", "frieren", "ep-1", 600.0);
        update.title = None;
        update.duration_seconds = None;
        let second = store.save(&update)?;
        assert_eq!(first, second);

        let entry = store.get("dev", "frieren", "ep-1")?.expect("entry should exist");
        assert_eq!(entry.position_seconds, 600.0);
        // Missing optional fields keep their previous values
        assert_eq!(entry.title.as_deref(), Some("frieren ep-1"));
        assert_eq!(entry.duration_seconds, Some(1440.0));
        assert!(entry.updated_at >= entry.created_at);
        Ok(())
    }

    #[test]
    fn test_list_is_per_device_and_limited() -> Result<()> {
        let mut store = store()?;

        store.save(&new_entry("dev", "frieren", "ep-1", 1.0))?;
        store.save(&new_entry("dev", "frieren", "ep-2", 2.0))?;
        store.save(&new_entry("dev", "dandadan", "ep-1", 3.0))?;
        store.save(&new_entry("other", "frieren", "ep-1", 4.0))?;

        let all = store.list("dev", 50)?;
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|e| e.device_id == "dev"));
        // Newest first
        assert_eq!(all[0].anime_slug, "dandadan");

        assert_eq!(store.list("dev", 2)?.len(), 2);
        assert!(store.list("nobody", 10)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_delete_and_clear() -> Result<()> {
        let mut store = store()?;

        store.save(&new_entry("dev", "frieren", "ep-1", 1.0))?;
        store.save(&new_entry("dev", "frieren", "ep-2", 2.0))?;
        store.save(&new_entry("dev", "dandadan", "ep-1", 3.0))?;

        assert_eq!(store.delete("dev", "frieren")?, 2);
        assert_eq!(store.delete("dev", "frieren")?, 0);
        assert_eq!(store.list("dev", 10)?.len(), 1);

        assert_eq!(store.clear("dev")?, 1);
        assert!(store.list("dev", 10)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_persists_across_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("history.db");

        {
            let mut store = HistoryStore::new(Database::open(&path)?);
            store.save(&new_entry("dev", "frieren", "ep-1", 42.0))?;
        }

        let store = HistoryStore::new(Database::open(&path)?);
        let entry = store.get("dev", "frieren", "ep-1")?.expect("entry should persist");
        assert_eq!(entry.position_seconds, 42.0);
        Ok(())
    }
}
