// Two-tier token storage
// Fast in-memory mirror over a durable SQLite key-value table.
// Reads consult the fast tier first and backfill it from the durable tier;
// the durable tier survives process restart.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS token_kv (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    secure     INTEGER NOT NULL DEFAULT 1,
    same_site  TEXT NOT NULL DEFAULT 'strict'
)";

/// Token storage with a fast tier and a durable tier.
///
/// All operations are total: storage failures are logged and degrade to
/// "value absent" instead of propagating. Durable rows carry the cookie
/// contract attributes (per-key expiry in days, secure, samesite=strict).
pub struct TokenStore {
    fast: RwLock<HashMap<String, String>>,
    conn: Mutex<Connection>,
}

impl TokenStore {
    /// Open (or create) the durable store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open token store: {}", path.display()))?;
        conn.execute(SCHEMA, [])
            .context("Failed to initialize token store schema")?;

        Ok(Self {
            fast: RwLock::new(HashMap::new()),
            conn: Mutex::new(conn),
        })
    }

    /// In-memory durable tier, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
        conn.execute(SCHEMA, [])
            .context("Failed to initialize token store schema")?;

        Ok(Self {
            fast: RwLock::new(HashMap::new()),
            conn: Mutex::new(conn),
        })
    }

    /// Write a value to both tiers. The durable entry expires after
    /// `ttl_days`.
    pub fn set(&self, key: &str, value: &str, ttl_days: i64) {
        let expires_at = (Utc::now() + Duration::days(ttl_days)).to_rfc3339();

        match self.conn.lock() {
            Ok(conn) => {
                let result = conn.execute(
                    "INSERT INTO token_kv (key, value, expires_at, secure, same_site)
                     VALUES (?1, ?2, ?3, 1, 'strict')
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         expires_at = excluded.expires_at",
                    params![key, value, expires_at],
                );
                if let Err(e) = result {
                    tracing::warn!(key = key, error = %e, "Durable token write failed");
                }
            }
            Err(_) => tracing::warn!(key = key, "Token store lock poisoned, durable write skipped"),
        }

        if let Ok(mut fast) = self.fast.write() {
            fast.insert(key.to_string(), value.to_string());
        }
    }

    /// Read a value: fast tier first, falling back to (and backfilling from)
    /// the durable tier. Expired durable rows are treated as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Ok(fast) = self.fast.read() {
            if let Some(value) = fast.get(key) {
                return Some(value.clone());
            }
        }

        let value = self.read_durable(key)?;
        if let Ok(mut fast) = self.fast.write() {
            fast.insert(key.to_string(), value.clone());
        }
        Some(value)
    }

    fn read_durable(&self, key: &str) -> Option<String> {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(_) => {
                tracing::warn!(key = key, "Token store lock poisoned, durable read skipped");
                return None;
            }
        };

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT value, expires_at FROM token_kv WHERE key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .unwrap_or_else(|e| {
                tracing::warn!(key = key, error = %e, "Durable token read failed");
                None
            });

        let (value, expires_at) = row?;

        // Rows past their expiry (or with an unreadable one) are dead.
        let alive = DateTime::parse_from_rfc3339(&expires_at)
            .map(|exp| Utc::now() < exp)
            .unwrap_or(false);
        if !alive {
            if let Err(e) = conn.execute("DELETE FROM token_kv WHERE key = ?1", [key]) {
                tracing::warn!(key = key, error = %e, "Failed to drop expired token row");
            }
            return None;
        }

        Some(value)
    }

    /// Remove a single key from both tiers.
    pub fn remove(&self, key: &str) {
        if let Ok(conn) = self.conn.lock() {
            if let Err(e) = conn.execute("DELETE FROM token_kv WHERE key = ?1", [key]) {
                tracing::warn!(key = key, error = %e, "Durable token delete failed");
            }
        }
        if let Ok(mut fast) = self.fast.write() {
            fast.remove(key);
        }
    }

    /// Remove everything from both tiers. Idempotent.
    pub fn clear(&self) {
        if let Ok(conn) = self.conn.lock() {
            if let Err(e) = conn.execute("DELETE FROM token_kv", []) {
                tracing::warn!(error = %e, "Durable token clear failed");
            }
        }
        if let Ok(mut fast) = self.fast.write() {
            fast.clear();
        }
    }
}
