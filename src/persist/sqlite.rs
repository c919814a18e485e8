//! SQLite-backed object store.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};

use crate::types::ObjectVersion;

use super::{
    ListPage, ObjectInfo, ObjectStore, PersistError, PersistResult, PutCondition, StoredObject,
};

/// SQLite implementation of [`crate::persist::ObjectStore`].
///
/// Each object is one row; versions start at 1 and increase by one per put.
pub struct SqliteObjectStore {
    conn: Connection,
}

impl SqliteObjectStore {
    /// Opens or creates a SQLite-backed store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> PersistResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn current_version(conn: &Connection, key: &str) -> PersistResult<Option<ObjectVersion>> {
        let v: Option<i64> = conn
            .query_row("SELECT version FROM objects WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(v.map(|v| v as ObjectVersion))
    }
}

impl ObjectStore for SqliteObjectStore {
    fn list_objects(
        &mut self,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> PersistResult<ListPage> {
        let mut stmt = self.conn.prepare(
            "SELECT key, last_modified_ms, length(body) FROM objects \
             WHERE substr(key, 1, length(?1)) = ?1 AND key > ?2 \
             ORDER BY key ASC LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![prefix, continuation.unwrap_or(""), (max_keys + 1) as i64],
            |row| {
                let key: String = row.get(0)?;
                let last_modified_ms: i64 = row.get(1)?;
                let size: i64 = row.get(2)?;
                Ok(ObjectInfo {
                    key,
                    last_modified_ms: last_modified_ms as u64,
                    size: size as u64,
                })
            },
        )?;

        let mut objects = Vec::new();
        for row in rows {
            objects.push(row?);
        }

        let next_token = if objects.len() > max_keys {
            objects.truncate(max_keys);
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };
        Ok(ListPage { objects, next_token })
    }

    fn get_object(&mut self, key: &str) -> PersistResult<Option<StoredObject>> {
        let row: Option<(Vec<u8>, i64, String, String, i64)> = self
            .conn
            .query_row(
                "SELECT body, version, content_type, metadata, last_modified_ms \
                 FROM objects WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let Some((bytes, version, content_type, metadata, last_modified_ms)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredObject {
            bytes,
            version: version as ObjectVersion,
            content_type,
            metadata: serde_json::from_str(&metadata)?,
            last_modified_ms: last_modified_ms as u64,
        }))
    }

    fn put_object(
        &mut self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: BTreeMap<String, String>,
        condition: PutCondition,
    ) -> PersistResult<ObjectVersion> {
        let metadata = serde_json::to_string(&metadata)?;
        let ts_ms = now_ms() as i64;
        let tx = self.conn.transaction()?;

        let version = match condition {
            PutCondition::Any => {
                let v: i64 = tx.query_row(
                    "INSERT INTO objects(key, body, content_type, metadata, version, last_modified_ms) \
                     VALUES (?1, ?2, ?3, ?4, 1, ?5) \
                     ON CONFLICT(key) DO UPDATE SET body = excluded.body, \
                     content_type = excluded.content_type, metadata = excluded.metadata, \
                     version = objects.version + 1, last_modified_ms = excluded.last_modified_ms \
                     RETURNING version",
                    params![key, bytes, content_type, metadata, ts_ms],
                    |row| row.get(0),
                )?;
                v as ObjectVersion
            }
            PutCondition::IfAbsent => {
                let changed = tx.execute(
                    "INSERT OR IGNORE INTO objects(key, body, content_type, metadata, version, last_modified_ms) \
                     VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                    params![key, bytes, content_type, metadata, ts_ms],
                )?;
                if changed == 0 {
                    return Err(PersistError::VersionConflict {
                        key: key.to_string(),
                        expected: None,
                        found: Self::current_version(&tx, key)?,
                    });
                }
                1
            }
            PutCondition::IfVersion(expected) => {
                let changed = tx.execute(
                    "UPDATE objects SET body = ?2, content_type = ?3, metadata = ?4, \
                     version = version + 1, last_modified_ms = ?5 \
                     WHERE key = ?1 AND version = ?6",
                    params![key, bytes, content_type, metadata, ts_ms, expected as i64],
                )?;
                if changed == 0 {
                    return Err(PersistError::VersionConflict {
                        key: key.to_string(),
                        expected: Some(expected),
                        found: Self::current_version(&tx, key)?,
                    });
                }
                expected + 1
            }
        };

        tx.commit()?;
        Ok(version)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
