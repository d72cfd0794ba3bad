use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::HashMap;

use crate::now_s;

/// Slot holding the capped detection history list.
pub const HISTORY_SLOT: &str = "detectionHistory";
/// Slot holding the currently selected analysis result.
pub const ACTIVE_SLOT: &str = "detectionData";

/// Durable key-value storage for client state.
///
/// Values are opaque JSON documents. A single writer is assumed.
pub trait StateStore {
    fn get(&self, slot: &str) -> Result<Option<String>>;

    fn put(&mut self, slot: &str, value: &str) -> Result<()>;

    fn remove(&mut self, slot: &str) -> Result<()>;
}

pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Open (or create) the state database. `file:` URIs are honored so tests
    /// can use shared in-memory databases.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = if db_path.starts_with("file:") {
            Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )?
        } else {
            Connection::open(db_path)?
        };
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS client_state (
              slot TEXT PRIMARY KEY,
              value_json TEXT NOT NULL,
              updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Slots currently holding a value.
    pub fn slots(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT slot FROM client_state ORDER BY slot")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl StateStore for SqliteStateStore {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value_json FROM client_state WHERE slot = ?1",
                params![slot],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, slot: &str, value: &str) -> Result<()> {
        let updated_at = i64::try_from(now_s()?)
            .map_err(|_| anyhow!("current time exceeds i64 range"))?;
        self.conn.execute(
            r#"
            INSERT INTO client_state(slot, value_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(slot) DO UPDATE SET
              value_json = excluded.value_json,
              updated_at = excluded.updated_at
            "#,
            params![slot, value, updated_at],
        )?;
        Ok(())
    }

    fn remove(&mut self, slot: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM client_state WHERE slot = ?1", params![slot])?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStateStore {
    slots: HashMap<String, String>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.slots.get(slot).cloned())
    }

    fn put(&mut self, slot: &str, value: &str) -> Result<()> {
        self.slots.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, slot: &str) -> Result<()> {
        self.slots.remove(slot);
        Ok(())
    }
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        (**self).get(slot)
    }

    fn put(&mut self, slot: &str, value: &str) -> Result<()> {
        (**self).put(slot, value)
    }

    fn remove(&mut self, slot: &str) -> Result<()> {
        (**self).remove(slot)
    }
}
