//! Applies roll mutations to packing-list documents in an object store.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use tracing::{info, warn};

use crate::{
    cache::CacheInvalidator,
    config::ReconcilerConfig,
    error::ReconcileError,
    matching::{
        chain::{LocateFailure, MatcherChain},
        guard::check_integrity,
    },
    op::{ChangeRequest, Mutation, MutationKind},
    persist::{ObjectStore, PersistError, PutCondition},
    roll::{Roll, normalize_oc},
    types::{ObjectKey, ObjectVersion},
};

use super::{
    document::{JSON_CONTENT_TYPE, backup_key, encode_rolls, now_ms},
    locator::{candidate_keys, locate_document},
    report::{FileResult, MutationOutcome, ReconcileReport, SkipReason},
    validate::validate_request,
};

/// Distinct backup keys tried for one pre-mutation copy.
const MAX_BACKUP_KEY_ATTEMPTS: u32 = 8;

/// Mutations routed to one OC, by position in the request.
struct OcGroup {
    oc: String,
    indices: Vec<usize>,
}

/// Locates and mutates rolls inside JSON documents.
///
/// Holds no storage handle; every call receives the store and cache it
/// should use.
pub struct RollReconciler {
    chain: MatcherChain,
    config: ReconcilerConfig,
}

impl RollReconciler {
    /// Reconciler with the standard matcher chain.
    pub fn new(config: ReconcilerConfig) -> Self {
        Self::with_chain(config, MatcherChain::standard())
    }

    /// Reconciler with custom matcher tiers.
    pub fn with_chain(config: ReconcilerConfig, chain: MatcherChain) -> Self {
        Self { chain, config }
    }

    /// Active configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Applies `batch` (request index, mutation) to an in-memory roll list.
    ///
    /// Adds append; updates merge over the located roll; deletes remove it.
    /// Updates and deletes carrying an expected prior are refused when the
    /// located roll's identity fields differ.
    pub fn apply_to_rolls(&self, rolls: &mut Vec<Roll>, batch: &[(usize, &Mutation)]) -> Vec<MutationOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());

        for &(index, mutation) in batch {
            let target = mutation.target_id.as_str();
            let kind = mutation.kind;

            if kind == MutationKind::Add {
                let outcome = match mutation.patch.to_roll() {
                    Ok(roll) => {
                        rolls.push(roll);
                        MutationOutcome::applied(index, target, kind, None)
                    }
                    Err(field) => MutationOutcome::skipped(
                        index,
                        target,
                        kind,
                        SkipReason::InvalidRoll { field: field.to_string() },
                    ),
                };
                outcomes.push(outcome);
                continue;
            }

            let expected = mutation.expected_prior.as_ref();
            let hit = match self.chain.locate(rolls, target, expected) {
                Ok(hit) => hit,
                Err(LocateFailure::NotFound) => {
                    warn!(target_id = target, ?kind, "roll not found; skipping");
                    outcomes.push(MutationOutcome::skipped(index, target, kind, SkipReason::NotFound));
                    continue;
                }
                Err(LocateFailure::Ambiguous { count, .. }) => {
                    warn!(target_id = target, count, "composite key matches several rolls; skipping");
                    outcomes.push(MutationOutcome::skipped(
                        index,
                        target,
                        kind,
                        SkipReason::AmbiguousCompositeKey { count },
                    ));
                    continue;
                }
            };

            if let Some(expected) = expected {
                if let Err(mismatch) = check_integrity(&rolls[hit.index], expected) {
                    warn!(
                        target_id = target,
                        field = mismatch.field,
                        expected = %mismatch.expected,
                        actual = %mismatch.actual,
                        "integrity guard rejected mutation"
                    );
                    outcomes.push(MutationOutcome::skipped(
                        index,
                        target,
                        kind,
                        SkipReason::IntegrityMismatch {
                            field: mismatch.field.to_string(),
                            expected: mismatch.expected,
                            actual: mismatch.actual,
                        },
                    ));
                    continue;
                }
            }

            if kind == MutationKind::Delete {
                rolls.remove(hit.index);
            } else {
                mutation.patch.apply_to(&mut rolls[hit.index]);
            }
            outcomes.push(MutationOutcome::applied(index, target, kind, Some(hit.method)));
        }

        outcomes
    }

    /// Validates, routes, applies, and persists one request.
    ///
    /// Validation failures and listing failures abort the request before
    /// any write. Everything after that is per mutation or per document:
    /// skipped mutations and failed writes are reported, not raised.
    pub fn reconcile(
        &self,
        store: &mut dyn ObjectStore,
        cache: &mut dyn CacheInvalidator,
        request: ChangeRequest,
        actor: &str,
    ) -> Result<ReconcileReport, ReconcileError> {
        validate_request(&request)?;
        let mutations = request.into_mutations();

        let mut outcomes: Vec<Option<MutationOutcome>> = vec![None; mutations.len()];
        let mut groups: Vec<OcGroup> = Vec::new();
        let mut group_of: HashMap<String, usize> = HashMap::new();

        for (index, mutation) in mutations.iter().enumerate() {
            let Some(oc) = mutation.routing_oc() else {
                warn!(index, target_id = %mutation.target_id, "mutation names no OC; skipping");
                outcomes[index] = Some(MutationOutcome::skipped(
                    index,
                    &mutation.target_id,
                    mutation.kind,
                    SkipReason::MissingOc,
                ));
                continue;
            };
            let slot = *group_of.entry(normalize_oc(oc)).or_insert_with(|| {
                groups.push(OcGroup {
                    oc: oc.trim().to_string(),
                    indices: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].indices.push(index);
        }

        let keys = candidate_keys(store, &self.config)?;
        let mut per_file_results = Vec::new();

        for group in &groups {
            let (file, group_outcomes) = self.reconcile_group(store, &keys, group, &mutations, actor);
            for outcome in group_outcomes {
                let index = outcome.index;
                outcomes[index] = Some(outcome);
            }
            per_file_results.extend(file);
        }

        if per_file_results.iter().any(FileResult::written) {
            self.invalidate_caches(cache);
        }

        let outcomes: Vec<MutationOutcome> = outcomes.into_iter().flatten().collect();
        let changes_applied = outcomes.iter().filter(|o| o.applied).count();
        let report = ReconcileReport {
            success: true,
            changes_requested: mutations.len(),
            changes_applied,
            files_processed: per_file_results.len(),
            per_file_results,
            outcomes,
        };

        info!(
            actor,
            requested = report.changes_requested,
            applied = report.changes_applied,
            files = report.files_processed,
            "reconcile request finished"
        );
        Ok(report)
    }

    /// Current rolls of the document holding `oc`, if any.
    pub fn rolls_for_oc(
        &self,
        store: &mut dyn ObjectStore,
        oc: &str,
    ) -> Result<Option<(ObjectKey, Vec<Roll>)>, ReconcileError> {
        let keys = candidate_keys(store, &self.config)?;
        let doc = locate_document(store, &keys, oc).map_err(|err| err.source)?;
        Ok(doc.map(|doc| (doc.key, doc.rolls)))
    }

    fn reconcile_group(
        &self,
        store: &mut dyn ObjectStore,
        keys: &[ObjectKey],
        group: &OcGroup,
        mutations: &[Mutation],
        actor: &str,
    ) -> (Option<FileResult>, Vec<MutationOutcome>) {
        let batch: Vec<(usize, &Mutation)> = group.indices.iter().map(|&i| (i, &mutations[i])).collect();
        let total = batch.len();
        let mut attempt = 0usize;
        // Taken once, from the first version this request tried to replace.
        let mut backup: Option<Option<ObjectKey>> = None;

        loop {
            let doc = match locate_document(store, keys, &group.oc) {
                Ok(Some(doc)) => doc,
                Ok(None) => {
                    warn!(oc = %group.oc, mutations = total, "no document holds OC; skipping its mutations");
                    let outcomes = batch
                        .iter()
                        .map(|(i, m)| MutationOutcome::skipped(*i, &m.target_id, m.kind, SkipReason::OcUnresolved))
                        .collect();
                    return (None, outcomes);
                }
                Err(err) => {
                    let message = err.to_string();
                    let file = FileResult {
                        key: err.key,
                        oc: group.oc.clone(),
                        changes_applied: 0,
                        total_changes_requested: total,
                        backup_reference: None,
                        error: Some(message.clone()),
                    };
                    return (Some(file), storage_failures(&batch, &message));
                }
            };

            let mut rolls = doc.rolls;
            let outcomes = self.apply_to_rolls(&mut rolls, &batch);
            let applied = outcomes.iter().filter(|o| o.applied).count();

            let mut file = FileResult {
                key: doc.key.clone(),
                oc: group.oc.clone(),
                changes_applied: applied,
                total_changes_requested: total,
                backup_reference: None,
                error: None,
            };

            if applied == 0 {
                return (Some(file), outcomes);
            }

            file.backup_reference = backup
                .get_or_insert_with(|| write_backup(store, &doc.key, doc.version, doc.raw, now_ms()))
                .clone();

            match write_document(store, &doc.key, doc.version, &rolls, applied, file.backup_reference.as_deref(), actor) {
                Ok(version) => {
                    info!(key = %doc.key, oc = %group.oc, applied, total, version, "document written");
                    return (Some(file), outcomes);
                }
                Err(PersistError::VersionConflict { .. }) if attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(key = %doc.key, attempt, "document changed while reconciling; retrying");
                }
                Err(err) => {
                    warn!(key = %doc.key, error = %err, "document write failed");
                    let message = err.to_string();
                    file.changes_applied = 0;
                    file.error = Some(message.clone());
                    return (Some(file), storage_failures(&batch, &message));
                }
            }
        }
    }

    fn invalidate_caches(&self, cache: &mut dyn CacheInvalidator) {
        for pattern in &self.config.invalidate_patterns {
            if let Err(err) = cache.invalidate_pattern(pattern) {
                warn!(%pattern, error = %err, "cache invalidation failed");
            }
        }
    }
}

fn write_backup(
    store: &mut dyn ObjectStore,
    key: &str,
    version: ObjectVersion,
    raw: Vec<u8>,
    ts_ms: u64,
) -> Option<ObjectKey> {
    let mut metadata = BTreeMap::new();
    metadata.insert("source-key".to_string(), key.to_string());
    metadata.insert("source-version".to_string(), version.to_string());

    for seq in 0..MAX_BACKUP_KEY_ATTEMPTS {
        let backup = backup_key(key, ts_ms, version, seq);
        match store.put_object(&backup, raw.clone(), JSON_CONTENT_TYPE, metadata.clone(), PutCondition::IfAbsent) {
            Ok(_) => return Some(backup),
            Err(PersistError::VersionConflict { .. }) => continue,
            Err(err) => {
                warn!(%key, error = %err, "backup write failed; continuing with primary write");
                return None;
            }
        }
    }
    warn!(%key, version, "no free backup key; continuing with primary write");
    None
}

fn storage_failures(batch: &[(usize, &Mutation)], message: &str) -> Vec<MutationOutcome> {
    batch
        .iter()
        .map(|(i, m)| {
            MutationOutcome::skipped(
                *i,
                &m.target_id,
                m.kind,
                SkipReason::StorageFailure {
                    message: message.to_string(),
                },
            )
        })
        .collect()
}

fn write_document(
    store: &mut dyn ObjectStore,
    key: &str,
    version: ObjectVersion,
    rolls: &[Roll],
    applied: usize,
    backup: Option<&str>,
    actor: &str,
) -> Result<ObjectVersion, PersistError> {
    let bytes = encode_rolls(rolls)?;
    let mut metadata = BTreeMap::new();
    metadata.insert("updated-by".to_string(), actor.to_string());
    metadata.insert("changes-applied".to_string(), applied.to_string());
    if let Some(backup) = backup {
        metadata.insert("backup-key".to_string(), backup.to_string());
    }
    store.put_object(key, bytes, JSON_CONTENT_TYPE, metadata, PutCondition::IfVersion(version))
}
