use blue_admin::config::{StorageBackend, StorageConfig};
use blue_admin::error::AppError;
use blue_admin::records::{Clock, Reconciler, SystemClock};
use blue_admin::storage::{CollectionStore, FileStore, KeyValueStore, MemoryStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type Collections = CollectionStore<dyn KeyValueStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) collections: Collections,
    pub(crate) clock: Arc<dyn Clock>,
}

/// Opens the configured key-value backend with the system clock and an
/// entropy-seeded reconciler.
pub(crate) fn open_collections(config: &StorageConfig) -> Result<Collections, AppError> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => Arc::new(FileStore::open(&config.data_file)?),
    };
    info!(backend = ?config.backend, prefix = %config.prefix, "storage opened");

    let reconciler = Arc::new(Reconciler::from_entropy());
    Ok(CollectionStore::new(store, reconciler).with_prefix(config.prefix.clone()))
}

pub(crate) fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}
