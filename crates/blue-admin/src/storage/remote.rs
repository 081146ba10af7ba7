use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use super::collection::{CollectionStore, REQUESTS};
use super::kv::{KeyValueStore, StorageError};

/// Field carrying the document id on records read from a document store.
pub const DOCUMENT_ID_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    /// The record view: the fields with the document id merged in.
    pub fn into_record(self) -> Value {
        let mut fields = self.fields;
        fields.insert(DOCUMENT_ID_FIELD.to_string(), Value::String(self.id));
        Value::Object(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentStoreError {
    #[error("document store unreachable: {0}")]
    Unreachable(String),
    #[error("document {id} not found in {collection}")]
    NotFound { collection: String, id: String },
    #[error("record {index} is not an object")]
    NotAnObject { index: usize },
}

/// Hosted document database, one network call per operation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError>;

    async fn add_document(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, DocumentStoreError>;

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), DocumentStoreError>;
}

/// In-process document store with switches to simulate outages.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Map<String, Value>>>>,
    sequence: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .map(|guard| guard.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn guard(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, Map<String, Value>>>>, DocumentStoreError>
    {
        self.collections
            .lock()
            .map_err(|_| DocumentStoreError::Unreachable("store mutex poisoned".to_string()))
    }

    fn check_writes(&self) -> Result<(), DocumentStoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(DocumentStoreError::Unreachable("write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(DocumentStoreError::Unreachable("read rejected".to_string()));
        }
        let guard = self.guard()?;
        Ok(guard
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_document(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, DocumentStoreError> {
        self.check_writes()?;
        let id = format!("doc-{:06}", self.sequence.fetch_add(1, Ordering::Relaxed) + 1);
        self.guard()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), DocumentStoreError> {
        self.check_writes()?;
        let mut guard = self.guard()?;
        let document = guard
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| DocumentStoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        document.extend(patch);
        Ok(())
    }
}

/// Where a [`RemoteCollectionStore::write_all`] ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum WriteOutcome {
    Remote { added: usize, updated: usize },
    /// A remote call failed; the whole payload was written locally instead.
    /// Records written remotely before the failure stay there.
    LocalFallback { error: String },
}

/// Collections kept in a document store, with the local store as fallback.
pub struct RemoteCollectionStore<D: ?Sized, S: ?Sized> {
    documents: Arc<D>,
    local: CollectionStore<S>,
}

impl<D, S> RemoteCollectionStore<D, S>
where
    D: DocumentStore + ?Sized,
    S: KeyValueStore + ?Sized,
{
    pub fn new(documents: Arc<D>, local: CollectionStore<S>) -> Self {
        Self { documents, local }
    }

    pub fn local(&self) -> &CollectionStore<S> {
        &self.local
    }

    /// Lists the collection, reconciling requests and writing fixes back.
    /// Falls back to the local store when the list call fails. A failed
    /// write-back is logged and the reconciled records are still returned.
    pub async fn read_all(&self, collection: &str) -> Result<Vec<Value>, StorageError> {
        let documents = match self.documents.list_documents(collection).await {
            Ok(documents) => documents,
            Err(err) => {
                warn!(collection, error = %err, "document store read failed, using local store");
                return self.local.read_all(collection);
            }
        };

        let records: Vec<Value> = documents.into_iter().map(Document::into_record).collect();
        if collection != REQUESTS {
            return Ok(records);
        }

        let reconciliation = self.local.reconciler().reconcile(&records);
        if reconciliation.report.changed() {
            match self.write_all(collection, &reconciliation.records).await {
                Ok(outcome) => info!(collection, ?outcome, "reconciled documents written back"),
                Err(err) => {
                    error!(collection, error = %err, "failed to persist reconciled documents")
                }
            }
        }
        Ok(reconciliation.records)
    }

    /// Updates records that carry a document id and adds the rest.
    pub async fn write_all(
        &self,
        collection: &str,
        records: &[Value],
    ) -> Result<WriteOutcome, StorageError> {
        match self.write_remote(collection, records).await {
            Ok((added, updated)) => Ok(WriteOutcome::Remote { added, updated }),
            Err(err) => {
                warn!(collection, error = %err, "document store write failed, writing locally");
                self.local.write_all(collection, records)?;
                Ok(WriteOutcome::LocalFallback {
                    error: err.to_string(),
                })
            }
        }
    }

    async fn write_remote(
        &self,
        collection: &str,
        records: &[Value],
    ) -> Result<(usize, usize), DocumentStoreError> {
        let mut added = 0;
        let mut updated = 0;
        for (index, record) in records.iter().enumerate() {
            let mut fields = record
                .as_object()
                .cloned()
                .ok_or(DocumentStoreError::NotAnObject { index })?;

            match fields.remove(DOCUMENT_ID_FIELD) {
                Some(Value::String(id)) if !id.is_empty() => {
                    self.documents.update_document(collection, &id, fields).await?;
                    updated += 1;
                }
                _ => {
                    self.documents.add_document(collection, fields).await?;
                    added += 1;
                }
            }
        }
        Ok((added, updated))
    }
}
