use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const ID_FIELD: &str = "idNumber";
pub const NAME_FIELD: &str = "name";
pub const EMAIL_FIELD: &str = "email";
pub const ROLE_FIELD: &str = "role";
pub const STATUS_FIELD: &str = "status";
pub const SUBJECT_FIELD: &str = "subject";
pub const DETAILS_FIELD: &str = "details";
pub const ATTACHMENTS_FIELD: &str = "attachments";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";
pub const CONVERSATION_FIELD: &str = "conversation";

/// Details text used when a subject has no placeholder of its own.
pub const GENERIC_DETAILS: &str = "בקשה כללית";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "סטודנט")]
    Student,
    #[serde(rename = "מנהל")]
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Student => "סטודנט",
            Self::Admin => "מנהל",
        }
    }

    /// Route-guard role name used by sessions.
    pub const fn app_role(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "פתוחה")]
    Open,
    #[serde(rename = "בטיפול")]
    InProgress,
    #[serde(rename = "נסגרה")]
    Closed,
}

impl RequestStatus {
    pub const fn ordered() -> [Self; 3] {
        [Self::Open, Self::InProgress, Self::Closed]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "פתוחה",
            Self::InProgress => "בטיפול",
            Self::Closed => "נסגרה",
        }
    }

    /// Lenient mapping used by dashboards: unknown values count as open.
    pub fn normalize(raw: Option<&Value>) -> Self {
        let text = match raw {
            Some(Value::String(value)) => value.trim().to_lowercase(),
            _ => String::new(),
        };
        match text.as_str() {
            "נסגרה" | "closed" => Self::Closed,
            "בטיפול" | "in_progress" | "processing" => Self::InProgress,
            _ => Self::Open,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    #[serde(rename = "קורסים")]
    Courses,
    #[serde(rename = "מערכת שעות")]
    Timetable,
    #[serde(rename = "בחינות ועבודות")]
    ExamsAndAssignments,
    #[serde(rename = "אישורים ומסמכים")]
    ApprovalsAndDocuments,
    #[serde(rename = "שכר לימוד")]
    Tuition,
    #[serde(rename = "אחר")]
    Other,
}

impl Subject {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Courses,
            Self::Timetable,
            Self::ExamsAndAssignments,
            Self::ApprovalsAndDocuments,
            Self::Tuition,
            Self::Other,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Courses => "קורסים",
            Self::Timetable => "מערכת שעות",
            Self::ExamsAndAssignments => "בחינות ועבודות",
            Self::ApprovalsAndDocuments => "אישורים ומסמכים",
            Self::Tuition => "שכר לימוד",
            Self::Other => "אחר",
        }
    }

    /// Canned details text for records that were stored without any.
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::Courses => "בקשה לבירור בנושא קורסים",
            Self::Timetable => "בקשה לבירור בנושא מערכת שעות",
            Self::ExamsAndAssignments => "בקשת מידע על בחינה",
            Self::ApprovalsAndDocuments => "בקשה לאישור או מסמך",
            Self::Tuition => "בקשה בנוגע לשכר לימוד",
            Self::Other => GENERIC_DETAILS,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|subject| subject.label() == label)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Attachment metadata; the binary payload is never retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub media_type: String,
}

/// Conversation timestamps are stored either as epoch milliseconds or as
/// RFC 3339 text depending on which screen wrote them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl Timestamp {
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            Self::Millis(ms) => Some(*ms),
            Self::Text(text) => parse_timestamp_millis(text),
        }
    }
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (UTC midnight).
pub fn parse_timestamp_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc).timestamp_millis());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Reads a JSON timestamp value that may be a number or a string.
pub fn value_to_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(text) => parse_timestamp_millis(text),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub sender: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// Typed projection of a reconciled request. Unknown keys are kept in
/// `extra` so converting back does not lose data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id_number: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: RequestStatus,
    pub subject: Subject,
    pub details: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub conversation: Vec<ConversationEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A row of the users collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id_number: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// JavaScript-style falsiness: missing, `null`, `false`, `0` or `""`.
pub fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(flag)) => !flag,
        Some(Value::Number(number)) => number.as_f64() == Some(0.0),
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => false,
    }
}

/// Exactly nine ASCII digits.
pub fn is_valid_identifier(value: &str) -> bool {
    value.len() == 9 && value.bytes().all(|b| b.is_ascii_digit())
}
