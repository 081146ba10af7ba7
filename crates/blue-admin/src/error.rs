use crate::auth::LoginError;
use crate::config::ConfigError;
use crate::records::{ConversationError, ExportError, SubmissionError};
use crate::storage::{RequestUpdateError, StorageError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Storage(StorageError),
    Export(ExportError),
    Submission(SubmissionError),
    Login(LoginError),
    RequestUpdate(RequestUpdateError),
    Json(serde_json::Error),
    NotFound(String),
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Storage(err) => write!(f, "storage error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
            AppError::Submission(err) => write!(f, "invalid request: {}", err),
            AppError::Login(err) => write!(f, "login failed: {}", err),
            AppError::RequestUpdate(err) => write!(f, "request update failed: {}", err),
            AppError::Json(err) => write!(f, "invalid json: {}", err),
            AppError::NotFound(what) => write!(f, "{} not found", what),
            AppError::Conflict(reason) => write!(f, "conflict: {}", reason),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Storage(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::Submission(err) => Some(err),
            AppError::Login(err) => Some(err),
            AppError::RequestUpdate(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::NotFound(_) | AppError::Conflict(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Submission(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Login(LoginError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Login(LoginError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            AppError::RequestUpdate(RequestUpdateError::Conversation(ConversationError::EmptyText)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) | AppError::RequestUpdate(RequestUpdateError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Conflict(_)
            | AppError::RequestUpdate(RequestUpdateError::Conversation(ConversationError::Closed)) => {
                StatusCode::CONFLICT
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Storage(_)
            | AppError::Export(_)
            | AppError::Login(LoginError::Storage(_))
            | AppError::RequestUpdate(RequestUpdateError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let fields = match &self {
            AppError::Submission(SubmissionError::Invalid(errors))
            | AppError::Login(LoginError::Validation(errors)) => Some(errors),
            _ => None,
        };
        let body = match fields {
            Some(fields) => json!({ "error": self.to_string(), "fields": fields }),
            None => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<StorageError> for AppError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<ExportError> for AppError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

impl From<SubmissionError> for AppError {
    fn from(value: SubmissionError) -> Self {
        Self::Submission(value)
    }
}

impl From<LoginError> for AppError {
    fn from(value: LoginError) -> Self {
        Self::Login(value)
    }
}

impl From<RequestUpdateError> for AppError {
    fn from(value: RequestUpdateError) -> Self {
        Self::RequestUpdate(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
