use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

use super::backfill::backfill_fields;
use super::clock::{Clock, SystemClock};
use super::identifiers::migrate_identifiers;
use crate::email::reconcile_emails;

/// Reconciliation passes in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Identifiers,
    Backfill,
    Emails,
}

impl Pass {
    pub const fn ordered() -> [Self; 3] {
        [Self::Identifiers, Self::Backfill, Self::Emails]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Identifiers => "identifier migration",
            Self::Backfill => "field backfill",
            Self::Emails => "email reconciliation",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("{pass} failed: entry {index} is not an object")]
    NotAnObject { pass: Pass, index: usize },
    #[error("field backfill failed: record {index} has malformed `{field}` ({reason})")]
    MalformedField {
        index: usize,
        field: &'static str,
        reason: &'static str,
    },
    #[error("random source unavailable")]
    RandomSourcePoisoned,
}

/// What each pass changed. `failure` is set when a pass aborted; the passes
/// after it did not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub identifiers_fixed: usize,
    pub backfill_changed: bool,
    pub emails_fixed: usize,
    pub completed: Vec<Pass>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_failure")]
    pub failure: Option<ReconcileError>,
}

fn serialize_failure<S>(failure: &Option<ReconcileError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match failure {
        Some(err) => serializer.serialize_str(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

impl ReconciliationReport {
    /// True when the returned snapshot differs from the input and should be
    /// persisted.
    pub fn changed(&self) -> bool {
        self.identifiers_fixed > 0 || self.backfill_changed || self.emails_fixed > 0
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.completed.len() == Pass::ordered().len()
    }
}

/// Snapshot produced by the last pass that succeeded, plus its report.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub records: Vec<Value>,
    pub report: ReconciliationReport,
}

/// Runs identifier migration, field backfill and email reconciliation.
///
/// The transform is pure: nothing is read from or written to storage, the
/// caller decides whether to persist [`Reconciliation::records`].
pub struct Reconciler<R = StdRng> {
    rng: Mutex<R>,
    clock: Arc<dyn Clock>,
}

impl Reconciler<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy(), Arc::new(SystemClock))
    }

    /// Reproducible identifiers and subjects for tests and replays.
    pub fn seeded(seed: u64, clock: Arc<dyn Clock>) -> Self {
        Self::new(StdRng::seed_from_u64(seed), clock)
    }
}

impl<R: Rng + Send> Reconciler<R> {
    pub fn new(rng: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            rng: Mutex::new(rng),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn reconcile(&self, records: &[Value]) -> Reconciliation {
        let mut report = ReconciliationReport::default();
        let mut snapshot = records.to_vec();

        if let Err(err) = self.run_passes(&mut snapshot, &mut report) {
            error!(error = %err, completed = report.completed.len(), "reconciliation aborted, keeping last good snapshot");
            report.failure = Some(err);
        }

        Reconciliation {
            records: snapshot,
            report,
        }
    }

    fn run_passes(
        &self,
        snapshot: &mut Vec<Value>,
        report: &mut ReconciliationReport,
    ) -> Result<(), ReconcileError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ReconcileError::RandomSourcePoisoned)?;

        let ids = migrate_identifiers(snapshot, &mut *rng)?;
        if ids.fixed_count > 0 {
            debug!(fixed_count = ids.fixed_count, "identifiers migrated");
        }
        *snapshot = ids.updated;
        report.identifiers_fixed = ids.fixed_count;
        report.completed.push(Pass::Identifiers);

        let now = self.clock.timestamp();
        let backfilled = backfill_fields(snapshot, &mut *rng, &now)?;
        report.backfill_changed = serialized(&backfilled) != serialized(snapshot);
        *snapshot = backfilled;
        report.completed.push(Pass::Backfill);

        let emails = reconcile_emails(snapshot);
        *snapshot = emails.updated;
        report.emails_fixed = emails.fixed_count;
        report.completed.push(Pass::Emails);

        Ok(())
    }
}

fn serialized(records: &[Value]) -> String {
    serde_json::to_string(records).unwrap_or_default()
}
