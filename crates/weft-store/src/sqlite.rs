//! SQLite backend for authoritative per-space stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Keys are stored segment by
//! segment (no joined strings), so prefix scans are exact column matches
//! and segment content can never corrupt a scan.

use std::path::Path;

use rusqlite::OptionalExtension as _;
use serde_json::Value as JsonValue;

use crate::{
  Error, Result,
  key::{Key, Keyspace, Prefix},
  storage::Storage,
};

const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS kv (
    space TEXT NOT NULL,
    p0    TEXT NOT NULL DEFAULT '',
    p1    TEXT NOT NULL DEFAULT '',
    p2    TEXT NOT NULL DEFAULT '',
    n     INTEGER NOT NULL,       -- segment count of the original key
    value TEXT NOT NULL,
    PRIMARY KEY (space, p0, p1, p2)
);
";

/// A storage backend in a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStorage {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStorage {
  /// Open (or create) a store file at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let storage = Self { conn };
    storage.init_schema().await?;
    Ok(storage)
  }

  /// Open an in-memory database; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let storage = Self { conn };
    storage.init_schema().await?;
    Ok(storage)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn segments(key: &Key) -> (String, String, String, String, usize) {
  let mut parts = key.parts.iter().cloned();
  (
    key.space.as_str().to_string(),
    parts.next().unwrap_or_default(),
    parts.next().unwrap_or_default(),
    parts.next().unwrap_or_default(),
    key.parts.len(),
  )
}

impl Storage for SqliteStorage {
  async fn get(&self, key: &Key) -> Result<Option<JsonValue>> {
    let (space, p0, p1, p2, _) = segments(key);
    let row: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM kv
               WHERE space = ?1 AND p0 = ?2 AND p1 = ?3 AND p2 = ?4",
              rusqlite::params![space, p0, p1, p2],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    row
      .map(|s| serde_json::from_str(&s))
      .transpose()
      .map_err(Error::from)
  }

  async fn put(&self, key: Key, value: JsonValue) -> Result<()> {
    let (space, p0, p1, p2, n) = segments(&key);
    let value_str = value.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO kv (space, p0, p1, p2, n, value)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (space, p0, p1, p2)
           DO UPDATE SET n = excluded.n, value = excluded.value",
          rusqlite::params![space, p0, p1, p2, n as i64, value_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete(&self, key: &Key) -> Result<()> {
    let (space, p0, p1, p2, _) = segments(key);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM kv
           WHERE space = ?1 AND p0 = ?2 AND p1 = ?3 AND p2 = ?4",
          rusqlite::params![space, p0, p1, p2],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_prefix(&self, prefix: &Prefix) -> Result<Vec<(Key, JsonValue)>> {
    let space = prefix.space;
    let parts = prefix.parts.clone();

    let rows: Vec<(String, String, String, i64, String)> = self
      .conn
      .call(move |conn| {
        let mut sql = String::from(
          "SELECT p0, p1, p2, n, value FROM kv WHERE space = ?1",
        );
        for i in 0..parts.len() {
          sql.push_str(&format!(" AND p{i} = ?{}", i + 2));
        }
        sql.push_str(" ORDER BY p0, p1, p2");

        let mut bind: Vec<String> = vec![space.as_str().to_string()];
        bind.extend(parts.iter().cloned());

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(bind.iter()), |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(p0, p1, p2, n, value)| {
        let parts: Vec<String> = [p0, p1, p2]
          .into_iter()
          .take(n.max(0) as usize)
          .collect();
        let value = serde_json::from_str(&value)?;
        Ok((Key::new(space, parts), value))
      })
      .collect()
  }
}
