use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};

use super::domain::{
    is_falsy, Subject, ATTACHMENTS_FIELD, CREATED_AT_FIELD, DETAILS_FIELD, EMAIL_FIELD,
    GENERIC_DETAILS, NAME_FIELD, SUBJECT_FIELD, UPDATED_AT_FIELD,
};
use super::reconcile::{Pass, ReconcileError};
use crate::email::expected_email;

/// Fills absent subject, details, email, attachments and timestamps.
///
/// A field that is already filled is never touched, so running the pass on
/// its own output changes nothing. `now` is used for missing `createdAt`.
/// Present but unparseable timestamps are left alone.
pub fn backfill_fields<R: Rng + ?Sized>(
    records: &[Value],
    rng: &mut R,
    now: &str,
) -> Result<Vec<Value>, ReconcileError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let map = record.as_object().ok_or(ReconcileError::NotAnObject {
                pass: Pass::Backfill,
                index,
            })?;
            backfill_record(index, map, rng, now).map(Value::Object)
        })
        .collect()
}

fn backfill_record<R: Rng + ?Sized>(
    index: usize,
    record: &Map<String, Value>,
    rng: &mut R,
    now: &str,
) -> Result<Map<String, Value>, ReconcileError> {
    let mut updated = record.clone();

    if is_falsy(updated.get(SUBJECT_FIELD)) {
        let subject = Subject::ordered()
            .choose(rng)
            .copied()
            .unwrap_or(Subject::Other);
        updated.insert(SUBJECT_FIELD.to_string(), Value::from(subject.label()));
    }

    let details_missing = match updated.get(DETAILS_FIELD) {
        value if is_falsy(value) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => {
            return Err(ReconcileError::MalformedField {
                index,
                field: DETAILS_FIELD,
                reason: "details must be text",
            })
        }
        None => true,
    };
    if details_missing {
        let placeholder = updated
            .get(SUBJECT_FIELD)
            .and_then(Value::as_str)
            .and_then(Subject::from_label)
            .map_or(GENERIC_DETAILS, Subject::placeholder);
        updated.insert(DETAILS_FIELD.to_string(), Value::from(placeholder));
    }

    if let Some(expected) = expected_email(updated.get(NAME_FIELD)) {
        if updated.get(EMAIL_FIELD).and_then(Value::as_str) != Some(expected.as_str()) {
            updated.insert(EMAIL_FIELD.to_string(), Value::String(expected));
        }
    }

    if is_falsy(updated.get(ATTACHMENTS_FIELD)) {
        updated.insert(ATTACHMENTS_FIELD.to_string(), Value::Array(Vec::new()));
    }

    if is_falsy(updated.get(CREATED_AT_FIELD)) {
        updated.insert(CREATED_AT_FIELD.to_string(), Value::from(now));
    }
    if is_falsy(updated.get(UPDATED_AT_FIELD)) {
        let created = updated
            .get(CREATED_AT_FIELD)
            .cloned()
            .unwrap_or_else(|| Value::from(now));
        updated.insert(UPDATED_AT_FIELD.to_string(), created);
    }

    Ok(updated)
}
