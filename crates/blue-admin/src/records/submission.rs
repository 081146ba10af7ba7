use serde::Deserialize;
use serde_json::{json, Value};

use super::clock::Clock;
use super::domain::{Attachment, RequestRecord, RequestStatus, Role, Subject};
use super::validation::{FieldErrors, Validation};
use crate::email::derive_email;

/// Largest attachment accepted with a new request.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Metadata of a file picked in the submission form.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentUpload {
    pub name: String,
    pub size: u64,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
}

impl AttachmentUpload {
    fn into_attachment(self) -> Result<Attachment, SubmissionError> {
        if self.size > MAX_ATTACHMENT_BYTES {
            return Err(SubmissionError::AttachmentTooLarge {
                name: self.name,
                size: self.size,
            });
        }

        let media_type = match self.media_type.filter(|value| !value.trim().is_empty()) {
            Some(declared) => declared
                .parse::<mime::Mime>()
                .map_err(|_| SubmissionError::InvalidMediaType {
                    name: self.name.clone(),
                    media_type: declared.clone(),
                })?
                .essence_str()
                .to_string(),
            None => mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };

        Ok(Attachment {
            name: self.name,
            size: self.size,
            media_type,
        })
    }
}

/// A ticket opened by a student.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub id_number: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub subject: Subject,
    pub details: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

fn default_role() -> Role {
    Role::Student
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("attachment {name} is {size} bytes, above the {MAX_ATTACHMENT_BYTES} byte limit")]
    AttachmentTooLarge { name: String, size: u64 },
    #[error("attachment {name} declares an invalid media type `{media_type}`")]
    InvalidMediaType { name: String, media_type: String },
    #[error("request failed validation")]
    Invalid(FieldErrors),
}

impl NewRequest {
    /// Builds the stored record: email derived from the name, status open,
    /// and the details as the first conversation entry.
    pub fn into_record(self, clock: &dyn Clock) -> Result<RequestRecord, SubmissionError> {
        let attachments = self
            .attachments
            .into_iter()
            .map(AttachmentUpload::into_attachment)
            .collect::<Result<Vec<_>, _>>()?;

        let now = clock.now();
        let at = clock.timestamp();
        let name = self.name.trim().to_string();
        let raw = json!({
            "idNumber": self.id_number.trim(),
            "name": name,
            "email": derive_email(&name),
            "role": self.role.label(),
            "status": RequestStatus::Open.label(),
            "subject": self.subject.label(),
            "details": self.details,
            "attachments": attachments,
            "createdAt": at,
            "updatedAt": at,
            "conversation": [{
                "sender": self.role.label(),
                "text": self.details,
                "timestamp": now.timestamp_millis(),
            }],
        });

        match RequestRecord::validate(&raw) {
            Validation::Valid(record) => Ok(record),
            Validation::Invalid(errors) => Err(SubmissionError::Invalid(errors)),
        }
    }
}

impl RequestRecord {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::clock::FixedClock;
    use crate::records::domain::{DETAILS_FIELD, ID_FIELD};
    use crate::records::validation::FieldError;
    use chrono::{TimeZone, Utc};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap())
    }

    fn new_request() -> NewRequest {
        NewRequest {
            id_number: "213233430".to_string(),
            name: " שיר אלון ".to_string(),
            role: Role::Student,
            subject: Subject::ExamsAndAssignments,
            details: "בקשה להארכת מועד הגשה של העבודה".to_string(),
            attachments: vec![
                AttachmentUpload {
                    name: "approval.pdf".to_string(),
                    size: 2048,
                    media_type: None,
                },
                AttachmentUpload {
                    name: "scan".to_string(),
                    size: 10,
                    media_type: Some("image/png".to_string()),
                },
            ],
        }
    }

    #[test]
    fn builds_open_request_with_derived_email() {
        let record = new_request().into_record(&clock()).expect("valid submission");

        assert_eq!(record.name, "שיר אלון");
        assert_eq!(record.email, derive_email("שיר אלון"));
        assert_eq!(record.status, RequestStatus::Open);
        assert_eq!(record.created_at.as_deref(), Some("2025-10-01T09:00:00.000Z"));
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.conversation.len(), 1);
        assert_eq!(record.attachments[0].media_type, "application/pdf");
        assert_eq!(record.attachments[1].media_type, "image/png");
    }

    #[test]
    fn unknown_extensions_fall_back_to_octet_stream() {
        let mut request = new_request();
        request.attachments = vec![AttachmentUpload {
            name: "notes".to_string(),
            size: 1,
            media_type: None,
        }];

        let record = request.into_record(&clock()).expect("valid submission");

        assert_eq!(record.attachments[0].media_type, "application/octet-stream");
    }

    #[test]
    fn oversized_attachments_are_rejected() {
        let mut request = new_request();
        request.attachments[0].size = MAX_ATTACHMENT_BYTES + 1;

        assert!(matches!(
            request.into_record(&clock()),
            Err(SubmissionError::AttachmentTooLarge { .. })
        ));
    }

    #[test]
    fn invalid_media_types_are_rejected() {
        let mut request = new_request();
        request.attachments[1].media_type = Some("not a mime".to_string());

        assert!(matches!(
            request.into_record(&clock()),
            Err(SubmissionError::InvalidMediaType { .. })
        ));
    }

    #[test]
    fn form_rules_apply_to_submissions() {
        let mut request = new_request();
        request.id_number = "12".to_string();
        request.details = "קצר".to_string();

        match request.into_record(&clock()) {
            Err(SubmissionError::Invalid(errors)) => {
                assert_eq!(errors.get(ID_FIELD), Some(&FieldError::Pattern));
                assert_eq!(errors.get(DETAILS_FIELD), Some(&FieldError::TooShort { min: 10 }));
            }
            other => panic!("expected validation errors, got {other:?}"),
        }
    }
}
