//! Key-value settings region
//!
//! Holds the small set of process-wide flags the store needs across
//! launches. Keys are typed; values are opaque strings. Entries are written
//! once and read at startup. The only way to clear them wholesale is
//! [`Settings::reset`].

use rusqlite::{params, Connection, OptionalExtension};

use super::error::StoreResult;

/// Known settings keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    /// Set once the legacy single-project session has been migrated
    MigrationComplete,
    /// Serialized pre-multi-project session awaiting migration
    LegacySession,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::MigrationComplete => "migration.v1.complete",
            SettingKey::LegacySession => "legacy.session",
        }
    }
}

/// View over the `settings` table
///
/// Borrowing a plain `Connection` lets the same view run inside a
/// transaction (which derefs to `Connection`).
pub struct Settings<'a> {
    conn: &'a Connection,
}

impl<'a> Settings<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: SettingKey) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: SettingKey, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key.as_str(), value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: SettingKey) -> StoreResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?", params![key.as_str()])?;
        Ok(removed > 0)
    }

    /// A flag is set when its key exists with value `true`
    pub fn flag(&self, key: SettingKey) -> StoreResult<bool> {
        Ok(self.get(key)?.as_deref() == Some("true"))
    }

    pub fn set_flag(&self, key: SettingKey) -> StoreResult<()> {
        self.set(key, "true")
    }

    /// Clear the whole region
    pub fn reset(&self) -> StoreResult<usize> {
        Ok(self.conn.execute("DELETE FROM settings", [])?)
    }
}
