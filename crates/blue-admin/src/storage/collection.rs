use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::kv::{KeyValueStore, StorageError};
use crate::records::{Reconciler, Reconciliation, ReconciliationReport};

pub const DEFAULT_PREFIX: &str = "blue-admin:";
pub const REQUESTS: &str = "requests";
pub const USERS: &str = "users";

/// Legacy request keys in the order they are tried. Entries without a
/// prefix placeholder are used verbatim.
const LEGACY_REQUEST_KEYS: [(bool, &str); 3] = [
    (false, "open-requests"),
    (true, "open-requests"),
    (true, "tickets"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LegacyOutcome {
    /// The canonical key already held requests; nothing was copied.
    AlreadyCanonical,
    Migrated { from: String },
    NothingToMigrate,
}

/// Result of [`CollectionStore::migrate_legacy_storage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyMigration {
    #[serde(flatten)]
    pub outcome: LegacyOutcome,
    pub removed: Vec<String>,
}

fn is_non_empty_array(raw: &str) -> bool {
    matches!(serde_json::from_str::<Value>(raw), Ok(Value::Array(items)) if !items.is_empty())
}

/// JSON-array collections stored under `"<prefix><collection>"`.
pub struct CollectionStore<S: ?Sized> {
    store: Arc<S>,
    prefix: String,
    reconciler: Arc<Reconciler>,
}

impl<S: ?Sized> Clone for CollectionStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: self.prefix.clone(),
            reconciler: Arc::clone(&self.reconciler),
        }
    }
}

impl<S> CollectionStore<S>
where
    S: KeyValueStore + ?Sized,
{
    pub fn new(store: Arc<S>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            store,
            prefix: DEFAULT_PREFIX.to_string(),
            reconciler,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn key(&self, collection: &str) -> String {
        format!("{}{}", self.prefix, collection)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Raw read. Missing, malformed or non-array payloads load as empty.
    pub fn load(&self, collection: &str) -> Result<Vec<Value>, StorageError> {
        let key = self.key(collection);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(Vec::new());
        };
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => {
                warn!(%key, "stored collection is not an array, treating as empty");
                Ok(Vec::new())
            }
            Err(err) => {
                let preview: String = raw.chars().take(100).collect();
                warn!(%key, error = %err, %preview, "stored collection is malformed, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Reads a collection, reconciling requests on the way.
    pub fn read_all(&self, collection: &str) -> Result<Vec<Value>, StorageError> {
        self.read_all_reconciled(collection)
            .map(|reconciliation| reconciliation.records)
    }

    /// Like [`Self::read_all`], also returning what reconciliation changed.
    ///
    /// For `requests` the legacy keys are migrated first, then the snapshot
    /// from the last successful pass is written back when anything changed.
    /// Other collections are returned as loaded.
    pub fn read_all_reconciled(&self, collection: &str) -> Result<Reconciliation, StorageError> {
        if collection != REQUESTS {
            let records = self.load(collection)?;
            debug!(collection, count = records.len(), "collection read");
            return Ok(Reconciliation {
                records,
                report: ReconciliationReport::default(),
            });
        }

        self.migrate_legacy_storage()?;
        let loaded = self.load(collection)?;
        let reconciliation = self.reconciler.reconcile(&loaded);
        self.persist_reconciled(collection, &reconciliation);
        debug!(
            collection,
            count = reconciliation.records.len(),
            "collection read"
        );
        Ok(reconciliation)
    }

    pub(crate) fn persist_reconciled(&self, collection: &str, reconciliation: &Reconciliation) {
        let report = &reconciliation.report;
        if !report.changed() {
            return;
        }

        match self.write_all(collection, &reconciliation.records) {
            Ok(()) => info!(
                collection,
                identifiers_fixed = report.identifiers_fixed,
                backfill_changed = report.backfill_changed,
                emails_fixed = report.emails_fixed,
                "reconciled collection persisted"
            ),
            Err(err) => error!(collection, error = %err, "failed to persist reconciled collection"),
        }
    }

    pub fn write_all(&self, collection: &str, records: &[Value]) -> Result<(), StorageError> {
        let body = serde_json::to_string(records)?;
        self.store.set(&self.key(collection), &body)
    }

    pub fn append(&self, collection: &str, record: Value) -> Result<(), StorageError> {
        let mut records = self.read_all(collection)?;
        records.push(record);
        self.write_all(collection, &records)
    }

    /// True when the key holds a non-empty payload.
    pub fn exists(&self, collection: &str) -> Result<bool, StorageError> {
        Ok(self
            .store
            .get(&self.key(collection))?
            .is_some_and(|raw| !raw.is_empty()))
    }

    pub fn clear(&self, collection: &str) -> Result<(), StorageError> {
        self.store.remove(&self.key(collection))
    }

    fn legacy_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(LEGACY_REQUEST_KEYS.len());
        for (prefixed, name) in LEGACY_REQUEST_KEYS {
            let key = if prefixed {
                self.key(name)
            } else {
                name.to_string()
            };
            if !keys.contains(&key) && key != self.key(REQUESTS) {
                keys.push(key);
            }
        }
        keys
    }

    /// Moves requests stored under a legacy key to the canonical key.
    ///
    /// Only the first legacy key holding a non-empty array is copied, and
    /// only when the canonical key has none. Every legacy key that exists is
    /// removed afterwards, even one holding an empty string.
    pub fn migrate_legacy_storage(&self) -> Result<LegacyMigration, StorageError> {
        let canonical = self.key(REQUESTS);
        let legacy = self.legacy_keys();

        let canonical_populated = self
            .store
            .get(&canonical)?
            .is_some_and(|raw| is_non_empty_array(&raw));

        let outcome = if canonical_populated {
            LegacyOutcome::AlreadyCanonical
        } else {
            let mut outcome = LegacyOutcome::NothingToMigrate;
            for key in &legacy {
                if let Some(raw) = self.store.get(key)?.filter(|raw| is_non_empty_array(raw)) {
                    self.store.set(&canonical, &raw)?;
                    info!(from = %key, to = %canonical, "migrated legacy requests");
                    outcome = LegacyOutcome::Migrated { from: key.clone() };
                    break;
                }
            }
            outcome
        };

        let mut removed = Vec::new();
        for key in legacy {
            if self.store.get(&key)?.is_some() {
                self.store.remove(&key)?;
                info!(%key, "removed legacy key");
                removed.push(key);
            }
        }

        Ok(LegacyMigration { outcome, removed })
    }
}
