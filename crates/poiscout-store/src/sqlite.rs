use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::{DocumentStore, Result, StoreError};

/// Single-file SQLite store. One `documents` table keyed by `(ns, key)`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        ensure_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn ensure_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            ns TEXT NOT NULL,
            key TEXT NOT NULL,
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (ns, key)
        );
        "#,
    )?;
    Ok(())
}

impl DocumentStore for SqliteStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE ns = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(|e| StoreError::decode(namespace, key, e)))
            .transpose()
    }

    fn put(&self, namespace: &str, key: &str, value: &Value) -> Result<()> {
        let body =
            serde_json::to_string(value).map_err(|e| StoreError::encode(namespace, key, e))?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO documents (ns, key, body, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(ns, key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![namespace, key, body, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT key, body FROM documents WHERE ns = ?1 ORDER BY key")?;
        let rows = stmt
            .query_map(params![namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(key, body)| {
                let value =
                    serde_json::from_str(&body).map_err(|e| StoreError::decode(namespace, &key, e))?;
                Ok((key, value))
            })
            .collect()
    }
}
