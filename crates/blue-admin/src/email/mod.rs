//! Deterministic email addresses derived from Hebrew full names.
//!
//! Every word of the name is transliterated on its own, compressed, and the
//! words are joined with dots into the local part of a `gmail.com` address.
//! Inputs that leave nothing usable map to [`FALLBACK_EMAIL`].

mod normalizer;
mod transliterator;

use serde_json::Value;

use crate::records::domain::is_falsy;

use normalizer::{clean_name, collapse_runs, normalize_latin};
use transliterator::{compress_repeats, transliterate_word};

/// Address returned when a name yields no usable local part.
pub const FALLBACK_EMAIL: &str = "user@gmail.com";

pub const EMAIL_DOMAIN: &str = "gmail.com";

/// Derives the email address for a Hebrew full name.
///
/// ```
/// use blue_admin::email::derive_email;
///
/// assert_eq!(derive_email("דוד לוי"), "dod.lvi@gmail.com");
/// assert_eq!(derive_email("   "), "user@gmail.com");
/// ```
pub fn derive_email(name: &str) -> String {
    let cleaned = clean_name(name);
    if cleaned.is_empty() {
        return FALLBACK_EMAIL.to_string();
    }

    let latin_words: Vec<String> = cleaned
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(|word| compress_repeats(&transliterate_word(word)))
        .collect();

    let normalized = normalize_latin(&latin_words.join(" ")).to_ascii_lowercase();
    let parts: Vec<&str> = normalized.split_whitespace().collect();
    if parts.is_empty() {
        return FALLBACK_EMAIL.to_string();
    }

    let joined = collapse_runs(&parts.join("."), '.');
    let trimmed = joined.strip_prefix('.').unwrap_or(&joined);
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    let local = collapse_runs(trimmed, '-');

    if local.is_empty() {
        FALLBACK_EMAIL.to_string()
    } else {
        format!("{local}@{EMAIL_DOMAIN}")
    }
}

/// Exact comparison against [`derive_email`]; no fuzzy matching.
pub fn is_email_valid_for_name(email: &str, name: &str) -> bool {
    email == derive_email(name)
}

/// Address expected for a stored `name` value. Falsy names have none; any
/// other non-text name maps to [`FALLBACK_EMAIL`].
pub fn expected_email(name: Option<&Value>) -> Option<String> {
    if is_falsy(name) {
        return None;
    }
    Some(name.and_then(Value::as_str).map_or_else(|| FALLBACK_EMAIL.to_string(), derive_email))
}

/// Output of [`reconcile_emails`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmailReconciliation {
    pub updated: Vec<Value>,
    pub fixed_count: usize,
}

/// Rewrites the `email` of every record with a truthy `name` so that it
/// matches [`expected_email`]. Records without a name are returned untouched.
pub fn reconcile_emails(records: &[Value]) -> EmailReconciliation {
    let mut fixed_count = 0;
    let updated = records
        .iter()
        .map(|record| {
            let Some(map) = record.as_object() else {
                return record.clone();
            };
            let Some(expected) = expected_email(map.get("name")) else {
                return record.clone();
            };

            if map.get("email").and_then(Value::as_str) == Some(expected.as_str()) {
                return record.clone();
            }

            fixed_count += 1;
            let mut map = map.clone();
            map.insert("email".to_string(), Value::String(expected));
            Value::Object(map)
        })
        .collect();

    EmailReconciliation {
        updated,
        fixed_count,
    }
}
