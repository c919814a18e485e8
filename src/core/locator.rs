use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::ReconcilerConfig,
    persist::{ObjectStore, PersistError, PersistResult, list_all},
    types::ObjectKey,
};

use super::document::{Document, is_reconcilable_key};

/// Lists every reconcilable document key under the configured prefix, in
/// listing order.
pub fn candidate_keys(store: &mut dyn ObjectStore, config: &ReconcilerConfig) -> PersistResult<Vec<ObjectKey>> {
    let keys: Vec<ObjectKey> = list_all(store, &config.prefix, config.list_page_size)?
        .into_iter()
        .map(|info| info.key)
        .filter(|key| is_reconcilable_key(key, &config.document_marker))
        .collect();
    debug!(prefix = %config.prefix, count = keys.len(), "listed candidate documents");
    Ok(keys)
}

/// A candidate document could not be read, so the first holder of an OC
/// cannot be determined.
#[derive(Debug, Error)]
#[error("reading {key}: {source}")]
pub struct UnreadableDocument {
    /// Key whose read failed.
    pub key: ObjectKey,
    /// Store error.
    pub source: PersistError,
}

/// Returns the first document in `keys` holding a roll with `oc`.
///
/// Objects that vanished or do not parse as a roll array are skipped. A
/// failed read stops the scan: a later match could shadow the unread one.
pub fn locate_document(
    store: &mut dyn ObjectStore,
    keys: &[ObjectKey],
    oc: &str,
) -> Result<Option<Document>, UnreadableDocument> {
    for key in keys {
        let object = match store.get_object(key) {
            Ok(Some(object)) => object,
            Ok(None) => continue,
            Err(source) => {
                warn!(%key, oc, error = %source, "candidate document unreadable");
                return Err(UnreadableDocument {
                    key: key.clone(),
                    source,
                });
            }
        };

        match Document::parse(key.clone(), object) {
            Ok(doc) if doc.contains_oc(oc) => {
                debug!(%key, oc, "located document");
                return Ok(Some(doc));
            }
            Ok(_) => {}
            Err(err) => warn!(%key, error = %err, "skipping unparsable document"),
        }
    }
    Ok(None)
}
