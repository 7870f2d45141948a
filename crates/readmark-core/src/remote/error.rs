//! Remote error taxonomy and HTTP error-body classification.

use serde::Deserialize;
use thiserror::Error;

pub const EMPTY_ERROR_BODY: &str = "Empty error body";

/// Failure of a remote bookmark server call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Connectivity, timeout or TLS failure. Transient.
    #[error("Network error: {0}")]
    Network(String),
    /// 422 field validation failure
    #[error("Validation error: {0}")]
    Validation(String),
    /// Any other non-2xx response
    #[error("Server error ({code}): {message}")]
    Server { message: String, code: u16 },
    /// Malformed success payload
    #[error("Decode error: {0}")]
    Decode(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Whether retrying the same call later may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Network(message)
            | Self::Validation(message)
            | Self::Decode(message)
            | Self::Server { message, .. } => message,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if error.is_timeout() {
            Self::Network(format!("Request timed out: {error}"))
        } else if let Some(status) = error.status() {
            Self::Server {
                message: error.to_string(),
                code: status.as_u16(),
            }
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Classify a non-2xx response from its status code and raw body.
pub fn classify_error_response(status: u16, body: &str) -> ApiError {
    if status == 422 {
        return ApiError::Validation(validation_message(body));
    }

    let message = if body.trim().is_empty() {
        EMPTY_ERROR_BODY.to_string()
    } else {
        match serde_json::from_str::<StatusMessage>(body) {
            Ok(payload) => payload.message,
            Err(error) => format!("Failed to parse error: {error}"),
        }
    };
    ApiError::Server {
        message,
        code: status,
    }
}

fn validation_message(body: &str) -> String {
    if body.trim().is_empty() {
        return EMPTY_ERROR_BODY.to_string();
    }
    match serde_json::from_str::<ValidationErrorBody>(body) {
        Ok(payload) => payload.joined_messages(),
        Err(error) => format!("Failed to parse error: {error}"),
    }
}

/// Generic `{status, message}` error payload
#[derive(Debug, Deserialize)]
struct StatusMessage {
    #[allow(dead_code)]
    #[serde(default)]
    status: Option<u16>,
    message: String,
}

/// Structured 422 payload returned by the edit endpoint
#[derive(Debug, Deserialize)]
struct ValidationErrorBody {
    #[serde(default)]
    errors: Option<Vec<String>>,
    #[serde(default)]
    fields: Option<PatchFieldErrors>,
}

/// Per-field errors, in patch field declaration order.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PatchFieldErrors {
    add_labels: Option<FieldError>,
    remove_labels: Option<FieldError>,
    labels: Option<FieldError>,
    is_archived: Option<FieldError>,
    is_deleted: Option<FieldError>,
    is_marked: Option<FieldError>,
    read_anchor: Option<FieldError>,
    read_progress: Option<FieldError>,
    title: Option<FieldError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FieldError {
    errors: Option<Vec<String>>,
}

impl PatchFieldErrors {
    fn in_order(&self) -> [(&'static str, Option<&FieldError>); 9] {
        [
            ("add_labels", self.add_labels.as_ref()),
            ("remove_labels", self.remove_labels.as_ref()),
            ("labels", self.labels.as_ref()),
            ("is_archived", self.is_archived.as_ref()),
            ("is_deleted", self.is_deleted.as_ref()),
            ("is_marked", self.is_marked.as_ref()),
            ("read_anchor", self.read_anchor.as_ref()),
            ("read_progress", self.read_progress.as_ref()),
            ("title", self.title.as_ref()),
        ]
    }
}

impl ValidationErrorBody {
    fn joined_messages(&self) -> String {
        let mut messages = self.errors.clone().unwrap_or_default();

        if let Some(fields) = &self.fields {
            for (name, field) in fields.in_order() {
                let Some(errors) = field.and_then(|field| field.errors.as_ref()) else {
                    continue;
                };
                messages.extend(errors.iter().map(|error| format!("{name}: {error}")));
            }
        }

        if messages.is_empty() {
            "Validation failed".to_string()
        } else {
            messages.join("; ")
        }
    }
}
