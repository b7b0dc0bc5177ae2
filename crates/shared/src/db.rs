//! SQLite connection and schema migrations.
//!
//! Migrations are plain SQL scripts applied in order. The number applied so
//! far is kept in `PRAGMA user_version`, so reopening a database only runs
//! what is new.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Schema scripts, oldest first; the index + 1 is the resulting version
const MIGRATIONS: &[&str] = &[include_str!("../schema.sql")];

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database file, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening database");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::migrated(conn)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self> {
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Number of migrations applied
    pub fn version(&self) -> Result<usize> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(usize::try_from(version).unwrap_or(0))
    }

    /// Apply pending migrations, each in its own transaction
    fn migrate(&mut self) -> Result<()> {
        let current = self.version()?;
        if current >= MIGRATIONS.len() {
            debug!(version = current, "Database schema up to date");
            return Ok(());
        }

        for (index, script) in MIGRATIONS.iter().enumerate().skip(current) {
            let version = index + 1;
            let tx = self.conn.transaction()?;
            tx.execute_batch(script)
                .with_context(|| format!("Failed to apply migration {version}"))?;
            tx.pragma_update(None, "user_version", version as i64)?;
            tx.commit()?;
            info!(version, "Applied database migration");
        }

        Ok(())
    }
}
