//! Object storage behind the reconciler.

/// In-process store.
pub mod memory;
/// SQLite-backed store.
pub mod sqlite;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::{ObjectKey, ObjectVersion};

/// Storage failure.
#[derive(Debug, Error)]
pub enum PersistError {
    /// SQLite backend error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Body or metadata could not be encoded or decoded.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// A conditional put found a different version.
    #[error("version conflict on {key}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        /// Object key.
        key: ObjectKey,
        /// Version the put required; `None` for create-only puts.
        expected: Option<ObjectVersion>,
        /// Version present; `None` when absent.
        found: Option<ObjectVersion>,
    },
    /// Backend-specific failure.
    #[error("{0}")]
    Message(String),
}

/// Result alias for storage calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key.
    pub key: ObjectKey,
    /// Last write, ms since the epoch.
    pub last_modified_ms: u64,
    /// Body length in bytes.
    pub size: u64,
}

/// One page of a listing; `next_token` is set while more keys remain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    /// Entries in key order.
    pub objects: Vec<ObjectInfo>,
    /// Continuation token for the next page.
    pub next_token: Option<String>,
}

/// Object body with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Body.
    pub bytes: Vec<u8>,
    /// Starts at 1 and grows with every put.
    pub version: ObjectVersion,
    /// MIME type given at put time.
    pub content_type: String,
    /// User metadata given at put time.
    pub metadata: BTreeMap<String, String>,
    /// Last write, ms since the epoch.
    pub last_modified_ms: u64,
}

/// Precondition checked atomically with a put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutCondition {
    /// Unconditional overwrite.
    Any,
    /// Only create; fail if the key exists.
    IfAbsent,
    /// Only overwrite the given version.
    IfVersion(ObjectVersion),
}

/// Flat key/value object storage with per-key versions.
///
/// Listing order is ascending by key; continuation tokens are opaque.
pub trait ObjectStore: Send {
    /// One page of keys under `prefix`, after `continuation` if given.
    fn list_objects(
        &mut self,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> PersistResult<ListPage>;

    /// Reads an object; `None` when absent.
    fn get_object(&mut self, key: &str) -> PersistResult<Option<StoredObject>>;

    /// Writes an object if `condition` holds and returns its new version.
    fn put_object(
        &mut self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: BTreeMap<String, String>,
        condition: PutCondition,
    ) -> PersistResult<ObjectVersion>;
}

/// Drains every page under `prefix`.
pub fn list_all(
    store: &mut dyn ObjectStore,
    prefix: &str,
    page_size: usize,
) -> PersistResult<Vec<ObjectInfo>> {
    let mut out = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = store.list_objects(prefix, token.as_deref(), page_size.max(1))?;
        out.extend(page.objects);
        match page.next_token {
            Some(next) if Some(&next) != token.as_ref() => token = Some(next),
            Some(_) => {
                return Err(PersistError::Message(
                    "listing continuation token did not advance".to_string(),
                ));
            }
            None => break,
        }
    }
    Ok(out)
}
