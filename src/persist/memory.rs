//! In-process object store.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::types::ObjectVersion;

use super::{
    ListPage, ObjectInfo, ObjectStore, PersistError, PersistResult, PutCondition, StoredObject,
};

/// [`ObjectStore`] backed by an ordered map; used by tests and embedders
/// that keep documents in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    objects: BTreeMap<String, StoredObject>,
    clock_ms: u64,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, ascending.
    pub fn keys(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    /// Borrows a stored object without versioning side effects.
    pub fn peek(&self, key: &str) -> Option<&StoredObject> {
        self.objects.get(key)
    }

    fn tick(&mut self) -> u64 {
        self.clock_ms += 1;
        self.clock_ms
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list_objects(
        &mut self,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> PersistResult<ListPage> {
        let lower = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut objects: Vec<ObjectInfo> = self
            .objects
            .range((lower, Bound::Unbounded))
            .skip_while(|(k, _)| k.as_str() < prefix)
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(max_keys + 1)
            .map(|(key, obj)| ObjectInfo {
                key: key.clone(),
                last_modified_ms: obj.last_modified_ms,
                size: obj.bytes.len() as u64,
            })
            .collect();

        let next_token = if objects.len() > max_keys {
            objects.truncate(max_keys);
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ListPage { objects, next_token })
    }

    fn get_object(&mut self, key: &str) -> PersistResult<Option<StoredObject>> {
        Ok(self.objects.get(key).cloned())
    }

    fn put_object(
        &mut self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: BTreeMap<String, String>,
        condition: PutCondition,
    ) -> PersistResult<ObjectVersion> {
        let current = self.objects.get(key).map(|o| o.version);
        let ok = match condition {
            PutCondition::Any => true,
            PutCondition::IfAbsent => current.is_none(),
            PutCondition::IfVersion(v) => current == Some(v),
        };
        if !ok {
            return Err(PersistError::VersionConflict {
                key: key.to_string(),
                expected: match condition {
                    PutCondition::IfVersion(v) => Some(v),
                    _ => None,
                },
                found: current,
            });
        }

        let version = current.unwrap_or(0) + 1;
        let last_modified_ms = self.tick();
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                version,
                content_type: content_type.to_string(),
                metadata,
                last_modified_ms,
            },
        );
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::list_all;

    fn put(store: &mut MemoryObjectStore, key: &str) {
        store
            .put_object(key, b"[]".to_vec(), "application/json", BTreeMap::new(), PutCondition::Any)
            .unwrap();
    }

    #[test]
    fn listing_pages_stay_inside_prefix() {
        let mut store = MemoryObjectStore::new();
        for key in ["a/1", "p/1", "p/2", "p/3", "q/1"] {
            put(&mut store, key);
        }

        let first = store.list_objects("p/", None, 2).unwrap();
        assert_eq!(first.objects.len(), 2);
        let token = first.next_token.clone().unwrap();
        let second = store.list_objects("p/", Some(&token), 2).unwrap();
        assert_eq!(second.objects.iter().map(|o| o.key.as_str()).collect::<Vec<_>>(), vec!["p/3"]);
        assert!(second.next_token.is_none());

        let all = list_all(&mut store, "p/", 1).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn versions_guard_overwrites() {
        let mut store = MemoryObjectStore::new();
        let v1 = store
            .put_object("k", b"1".to_vec(), "text/plain", BTreeMap::new(), PutCondition::IfAbsent)
            .unwrap();
        assert_eq!(v1, 1);
        assert!(matches!(
            store.put_object("k", b"x".to_vec(), "text/plain", BTreeMap::new(), PutCondition::IfAbsent),
            Err(PersistError::VersionConflict { .. })
        ));
        let v2 = store
            .put_object("k", b"2".to_vec(), "text/plain", BTreeMap::new(), PutCondition::IfVersion(1))
            .unwrap();
        assert_eq!(v2, 2);
        assert!(matches!(
            store.put_object("k", b"3".to_vec(), "text/plain", BTreeMap::new(), PutCondition::IfVersion(1)),
            Err(PersistError::VersionConflict { found: Some(2), .. })
        ));
        assert_eq!(store.peek("k").unwrap().bytes, b"2".to_vec());
    }
}
