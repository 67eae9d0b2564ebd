//! Per-origin durable key/value storage
//!
//! Mirrors the browser's local storage: string keys, string values, scoped to
//! the origin of the backend the client talks to.

use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::database::Database;
use crate::Result;

#[derive(Clone)]
pub struct LocalStorage {
    db: Database,
    origin: String,
}

impl LocalStorage {
    pub(crate) fn new(db: Database, origin: String) -> Self {
        Self { db, origin }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.db.with_connection(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM local_storage WHERE origin = ?1 AND key = ?2",
                    [self.origin.as_str(), key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.set_items(&[(key, value)])
    }

    /// Write several entries atomically
    pub fn set_items(&self, items: &[(&str, &str)]) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.db.transaction(|conn| {
            for (key, value) in items {
                conn.execute(
                    "INSERT OR REPLACE INTO local_storage (origin, key, value, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![self.origin, key, value, updated_at],
                )?;
            }
            Ok(())
        })
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.remove_items(&[key])
    }

    /// Remove several entries atomically; missing keys are ignored
    pub fn remove_items(&self, keys: &[&str]) -> Result<()> {
        self.db.transaction(|conn| {
            for key in keys {
                conn.execute(
                    "DELETE FROM local_storage WHERE origin = ?1 AND key = ?2",
                    [self.origin.as_str(), *key],
                )?;
            }
            Ok(())
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "DELETE FROM local_storage WHERE origin = ?1",
                [&self.origin],
            )?;
            Ok(())
        })
    }

    pub fn len(&self) -> Result<usize> {
        self.db.with_connection(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM local_storage WHERE origin = ?1",
                [&self.origin],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
