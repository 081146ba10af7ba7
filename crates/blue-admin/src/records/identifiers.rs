use rand::Rng;
use serde_json::Value;
use std::collections::HashSet;

use super::domain::{is_valid_identifier, ID_FIELD};
use super::reconcile::{Pass, ReconcileError};

const ID_RANGE: std::ops::Range<u32> = 100_000_000..1_000_000_000;

/// Output of [`migrate_identifiers`].
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierMigration {
    pub updated: Vec<Value>,
    pub fixed_count: usize,
}

/// Nine-digit JSON numbers are accepted and rewritten as strings.
fn numeric_identifier(value: &Value) -> Option<String> {
    value
        .as_u64()
        .map(|number| number.to_string())
        .filter(|text| is_valid_identifier(text))
}

/// Draws identifiers until one is not yet taken, then reserves it.
pub fn fresh_identifier<R: Rng + ?Sized>(rng: &mut R, taken: &mut HashSet<String>) -> String {
    loop {
        let candidate = rng.gen_range(ID_RANGE).to_string();
        if taken.insert(candidate.clone()) {
            return candidate;
        }
    }
}

/// Assigns a unique nine-digit `idNumber` to every record whose identifier
/// is missing or malformed. Valid identifiers, and record order, are kept.
/// Duplicates among already-valid identifiers are left as they are.
pub fn migrate_identifiers<R: Rng + ?Sized>(
    records: &[Value],
    rng: &mut R,
) -> Result<IdentifierMigration, ReconcileError> {
    let mut taken = HashSet::new();
    let mut maps = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let map = record.as_object().ok_or(ReconcileError::NotAnObject {
            pass: Pass::Identifiers,
            index,
        })?;
        maps.push(map);
        match map.get(ID_FIELD) {
            Some(Value::String(id)) if is_valid_identifier(id) => {
                taken.insert(id.clone());
            }
            Some(other) => {
                if let Some(id) = numeric_identifier(other) {
                    taken.insert(id);
                }
            }
            None => {}
        }
    }

    let mut fixed_count = 0;
    let mut updated = Vec::with_capacity(records.len());
    for map in maps {
        let replacement = match map.get(ID_FIELD) {
            Some(Value::String(id)) if is_valid_identifier(id) => None,
            Some(other) => Some(
                numeric_identifier(other).unwrap_or_else(|| fresh_identifier(rng, &mut taken)),
            ),
            None => Some(fresh_identifier(rng, &mut taken)),
        };

        match replacement {
            Some(id) => {
                let mut map = map.clone();
                map.insert(ID_FIELD.to_string(), Value::String(id));
                updated.push(Value::Object(map));
                fixed_count += 1;
            }
            None => updated.push(Value::Object(map.clone())),
        }
    }

    Ok(IdentifierMigration {
        updated,
        fixed_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn assigns_distinct_ids_when_none_are_valid() {
        let records = vec![
            json!({}),
            json!({ "idNumber": "" }),
            json!({ "idNumber": "12345" }),
            json!({ "idNumber": "abcdefghi" }),
            json!({ "idNumber": null }),
            json!({ "idNumber": "1234567890" }),
        ];

        let result = migrate_identifiers(&records, &mut rng()).expect("migration runs");

        assert_eq!(result.fixed_count, records.len());
        let ids: HashSet<&str> = result
            .updated
            .iter()
            .map(|r| r[ID_FIELD].as_str().expect("string id"))
            .collect();
        assert_eq!(ids.len(), records.len());
        assert!(ids.iter().all(|id| is_valid_identifier(id)));
    }

    #[test]
    fn leaves_valid_ids_and_order_untouched() {
        let records = vec![
            json!({ "idNumber": "213233430", "name": "a" }),
            json!({ "idNumber": "214305047", "name": "b" }),
        ];

        let result = migrate_identifiers(&records, &mut rng()).expect("migration runs");

        assert_eq!(result.fixed_count, 0);
        assert_eq!(result.updated, records);
    }

    #[test]
    fn fresh_ids_avoid_existing_ones() {
        let mut taken: HashSet<String> = HashSet::new();
        let mut first = rng();
        let expected = fresh_identifier(&mut first, &mut taken);

        // Replaying the same seed must skip the identifier that is already reserved.
        let mut replay = rng();
        let next = fresh_identifier(&mut replay, &mut taken);
        assert_ne!(next, expected);
        assert_eq!(taken.len(), 2);
    }

    #[test]
    fn numeric_ids_are_normalized_to_strings() {
        let records = vec![json!({ "idNumber": 213233430 }), json!({ "idNumber": 12 })];

        let result = migrate_identifiers(&records, &mut rng()).expect("migration runs");

        assert_eq!(result.fixed_count, 2);
        assert_eq!(result.updated[0][ID_FIELD], "213233430");
        assert_ne!(result.updated[1][ID_FIELD], "213233430");
    }

    #[test]
    fn duplicate_valid_ids_are_not_reassigned() {
        let records = vec![json!({ "idNumber": "111111111" }), json!({ "idNumber": "111111111" })];

        let result = migrate_identifiers(&records, &mut rng()).expect("migration runs");

        assert_eq!(result.fixed_count, 0);
        assert_eq!(result.updated, records);
    }

    #[test]
    fn non_object_entries_fail_the_pass() {
        let records = vec![json!({ "idNumber": "111111111" }), json!(null)];

        let err = migrate_identifiers(&records, &mut rng()).expect_err("null entry rejected");

        assert!(matches!(
            err,
            ReconcileError::NotAnObject {
                pass: Pass::Identifiers,
                index: 1
            }
        ));
    }
}
