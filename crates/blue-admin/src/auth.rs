use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::domain::{is_valid_identifier, Role, ID_FIELD, ROLE_FIELD};
use crate::records::seed::{
    DEMO_ADMIN_ID, DEMO_ADMIN_PASSWORD, DEMO_STUDENT_ID, DEMO_STUDENT_PASSWORD,
};
use crate::records::validation::{FieldError, FieldErrors};
use crate::storage::{KeyValueStore, StorageError, UserDirectory};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub id_number: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    Admin,
    Student,
}

impl AppRole {
    /// Only the admin label maps to admin; any other stored role is a student.
    pub fn from_stored(role: Option<&Value>) -> Self {
        match role.and_then(Value::as_str) {
            Some(label) if label == Role::Admin.label() => Self::Admin,
            _ => Self::Student,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub role: AppRole,
    pub id_number: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("credentials failed validation")]
    Validation(FieldErrors),
    #[error("id number or password is incorrect")]
    InvalidCredentials,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Credentials {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.id_number.trim().is_empty() {
            errors.insert(ID_FIELD.to_string(), FieldError::Required);
        } else if !is_valid_identifier(&self.id_number) {
            errors.insert(ID_FIELD.to_string(), FieldError::Pattern);
        }
        if self.password.trim().is_empty() {
            errors.insert("password".to_string(), FieldError::Required);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn demo_session(id_number: &str, password: &str) -> Option<Session> {
    let role = match (id_number, password) {
        (DEMO_ADMIN_ID, DEMO_ADMIN_PASSWORD) => AppRole::Admin,
        (DEMO_STUDENT_ID, DEMO_STUDENT_PASSWORD) => AppRole::Student,
        _ => return None,
    };
    Some(Session {
        role,
        id_number: id_number.to_string(),
    })
}

/// Checks the demo accounts first, then the users collection.
pub fn authenticate<S>(
    credentials: &Credentials,
    users: &UserDirectory<'_, S>,
) -> Result<Session, LoginError>
where
    S: KeyValueStore + ?Sized,
{
    credentials.validate().map_err(LoginError::Validation)?;
    let id_number = credentials.id_number.as_str();

    if let Some(session) = demo_session(id_number, &credentials.password) {
        return Ok(session);
    }

    users
        .read_all_users()?
        .iter()
        .find(|user| {
            user.get(ID_FIELD).and_then(Value::as_str) == Some(id_number)
                && user.get("password").and_then(Value::as_str) == Some(credentials.password.as_str())
        })
        .map(|user| Session {
            role: AppRole::from_stored(user.get(ROLE_FIELD)),
            id_number: id_number.to_string(),
        })
        .ok_or(LoginError::InvalidCredentials)
}
