//! Persistence for the request and user collections.

pub mod collection;
pub mod kv;
pub mod remote;
pub mod requests;
pub mod seeding;
pub mod users;

pub use collection::{CollectionStore, LegacyMigration, LegacyOutcome, DEFAULT_PREFIX, REQUESTS, USERS};
pub use kv::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use remote::{
    Document, DocumentStore, DocumentStoreError, MemoryDocumentStore, RemoteCollectionStore,
    WriteOutcome, DOCUMENT_ID_FIELD,
};
pub use requests::{RequestDesk, RequestUpdateError};
pub use seeding::{seed_demo_data, SeedReport};
pub use users::UserDirectory;
