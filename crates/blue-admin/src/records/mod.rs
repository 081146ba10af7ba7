//! Request records: the domain model, the reconciliation passes applied on
//! read, and the helpers built on top of them.

pub mod backfill;
pub mod clock;
pub mod conversation;
pub mod domain;
pub mod export;
pub mod identifiers;
pub mod reconcile;
pub mod seed;
pub mod stats;
pub mod submission;
pub mod validation;

pub use backfill::backfill_fields;
pub use clock::{Clock, FixedClock, SystemClock};
pub use conversation::{append_reply, begin_handling, close, ConversationError, Reply};
pub use domain::{
    Attachment, ConversationEntry, RequestRecord, RequestStatus, Role, Subject, Timestamp, User,
};
pub use export::{export_csv, ExportError};
pub use identifiers::{migrate_identifiers, IdentifierMigration};
pub use reconcile::{Pass, ReconcileError, Reconciler, Reconciliation, ReconciliationReport};
pub use stats::{RequestStatistics, ResponseTime};
pub use submission::{AttachmentUpload, NewRequest, SubmissionError};
pub use validation::{EntityConfig, FieldConfig, FieldError, FieldErrors, FieldKind, Validation};
