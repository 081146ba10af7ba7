use chrono::DateTime;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::domain::{
    RequestRecord, RequestStatus, Role, Subject, DETAILS_FIELD, EMAIL_FIELD, ID_FIELD, NAME_FIELD,
    ROLE_FIELD, STATUS_FIELD, SUBJECT_FIELD,
};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Number,
    Date,
    Select,
    Multiline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    fn same(label: &str) -> Self {
        Self {
            value: label.to_string(),
            label: label.to_string(),
        }
    }
}

/// Declarative description of one form/table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldConfig {
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

impl FieldConfig {
    pub fn new(key: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            required: false,
            min_len: None,
            max_len: None,
            pattern: None,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_len(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    pub fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    pub fn options<'a>(mut self, labels: impl IntoIterator<Item = &'a str>) -> Self {
        self.options = labels.into_iter().map(SelectOption::same).collect();
        self
    }
}

/// A collection's form/table configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityConfig {
    pub key: String,
    pub label: String,
    pub id_field: String,
    pub fields: Vec<FieldConfig>,
}

impl EntityConfig {
    pub fn requests() -> Self {
        Self {
            key: "requests".to_string(),
            label: "פניות".to_string(),
            id_field: ID_FIELD.to_string(),
            fields: vec![
                FieldConfig::new(ID_FIELD, "מספר זהות", FieldKind::Text)
                    .required()
                    .pattern(r"^\d{9}$"),
                FieldConfig::new(NAME_FIELD, "שם", FieldKind::Text)
                    .required()
                    .min_len(2),
                FieldConfig::new(EMAIL_FIELD, "מייל", FieldKind::Email).required(),
                FieldConfig::new(ROLE_FIELD, "תפקיד", FieldKind::Select)
                    .required()
                    .options([Role::Student.label(), Role::Admin.label()]),
                FieldConfig::new(STATUS_FIELD, "סטטוס", FieldKind::Select)
                    .required()
                    .options(RequestStatus::ordered().map(RequestStatus::label)),
                FieldConfig::new(SUBJECT_FIELD, "נושא", FieldKind::Select)
                    .required()
                    .options(Subject::ordered().map(Subject::label)),
                FieldConfig::new(DETAILS_FIELD, "תיאור", FieldKind::Multiline)
                    .required()
                    .min_len(10),
            ],
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|field| field.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FieldError {
    #[error("field is required")]
    Required,
    #[error("enter at least {min} characters")]
    TooShort { min: usize },
    #[error("enter at most {max} characters")]
    TooLong { max: usize },
    #[error("invalid format")]
    Pattern,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("enter a number")]
    NotANumber,
    #[error("invalid date")]
    InvalidDate,
    #[error("value is not one of the allowed options")]
    InvalidOption,
    #[error("record is malformed: {message}")]
    Malformed { message: String },
}

pub type FieldErrors = BTreeMap<String, FieldError>;

/// Outcome of validating a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    Valid(T),
    Invalid(FieldErrors),
}

impl<T> Validation<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn into_result(self) -> Result<T, FieldErrors> {
        match self {
            Self::Valid(value) => Ok(value),
            Self::Invalid(errors) => Err(errors),
        }
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

/// Checks one value against its field configuration.
pub fn validate_field(value: Option<&Value>, field: &FieldConfig) -> Option<FieldError> {
    if is_empty(value) {
        return field.required.then_some(FieldError::Required);
    }
    let text = value.map(as_text).unwrap_or_default();
    let length = text.chars().count();

    if let Some(min) = field.min_len.filter(|min| length < *min) {
        return Some(FieldError::TooShort { min });
    }
    if let Some(max) = field.max_len.filter(|max| length > *max) {
        return Some(FieldError::TooLong { max });
    }

    // Patterns come from configuration; one that does not compile is ignored.
    if let Some(pattern) = field.pattern.as_deref().and_then(|p| Regex::new(p).ok()) {
        if !pattern.is_match(&text) {
            return Some(FieldError::Pattern);
        }
    }

    match field.kind {
        FieldKind::Email if !EMAIL_RE.is_match(&text) => Some(FieldError::InvalidEmail),
        FieldKind::Number if text.trim().parse::<f64>().is_err() => Some(FieldError::NotANumber),
        FieldKind::Date
            if !DATE_RE.is_match(&text) && DateTime::parse_from_rfc3339(text.trim()).is_err() =>
        {
            Some(FieldError::InvalidDate)
        }
        FieldKind::Select
            if !field.options.is_empty()
                && !field.options.iter().any(|option| option.value == text) =>
        {
            Some(FieldError::InvalidOption)
        }
        _ => None,
    }
}

/// Validates every configured field of `record`.
pub fn validate_record(record: &Map<String, Value>, entity: &EntityConfig) -> Validation<Map<String, Value>> {
    let errors: FieldErrors = entity
        .fields
        .iter()
        .filter_map(|field| {
            validate_field(record.get(&field.key), field).map(|error| (field.key.clone(), error))
        })
        .collect();

    if errors.is_empty() {
        Validation::Valid(record.clone())
    } else {
        Validation::Invalid(errors)
    }
}

impl RequestRecord {
    /// Validates a raw record against the request form and projects it
    /// into the typed view.
    pub fn validate(raw: &Value) -> Validation<Self> {
        let empty = Map::new();
        let map = raw.as_object().unwrap_or(&empty);

        match validate_record(map, &EntityConfig::requests()) {
            Validation::Invalid(errors) => Validation::Invalid(errors),
            Validation::Valid(map) => match serde_json::from_value(Value::Object(map)) {
                Ok(record) => Validation::Valid(record),
                Err(err) => {
                    let mut errors = FieldErrors::new();
                    errors.insert(
                        "record".to_string(),
                        FieldError::Malformed {
                            message: err.to_string(),
                        },
                    );
                    Validation::Invalid(errors)
                }
            },
        }
    }
}
