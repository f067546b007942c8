use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::catalog::ToolId;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Entitlement error: {0}")]
    EntitlementError(#[from] EntitlementError),

    #[error("Network error: {0}")]
    NetworkError(#[from] NetworkError),

    #[error("Service error ({status}): {message}")]
    ServiceError { status: u16, message: String },

    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Message shown to the user at the presentation boundary.
    ///
    /// Validation errors are field-scoped, so the general message only asks
    /// the user to fix the form; `field_errors` carries the details.
    pub fn user_message(&self) -> String {
        match self {
            AppError::AuthError(AuthError::Unauthenticated) => {
                "Please login to continue".to_string()
            }
            AppError::AuthError(AuthError::TokenExpired) => {
                "Your session has expired. Please login again".to_string()
            }
            AppError::EntitlementError(e) => match e {
                EntitlementError::NotEntitled(_) => {
                    "Purchase this tool to download it".to_string()
                }
                EntitlementError::EntitlementExpired(_) => {
                    "Your license for this tool has expired".to_string()
                }
                EntitlementError::QuotaExceeded => {
                    "Download quota exceeded. Please upgrade your plan.".to_string()
                }
                EntitlementError::OperationInProgress(_) => {
                    "Please wait for the current request to finish".to_string()
                }
            },
            AppError::ServiceError { message, .. } => message.clone(),
            AppError::NetworkError(_) => "Network error. Please try again.".to_string(),
            AppError::ValidationError(_) => "Please correct the highlighted fields".to_string(),
            AppError::StorageError(_) | AppError::ConfigError(_) | AppError::InternalError(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AppError::ValidationError(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::NetworkError(NetworkError::Timeout)
        } else if err.is_decode() {
            AppError::NetworkError(NetworkError::MalformedResponse(err.to_string()))
        } else {
            AppError::NetworkError(NetworkError::Unreachable(err.to_string()))
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::ConfigError(format!("invalid URL: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::ValidationError(errors)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Token expired")]
    TokenExpired,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    #[error("Tool {0} is not owned")]
    NotEntitled(ToolId),

    #[error("Entitlement for tool {0} has expired")]
    EntitlementExpired(ToolId),

    #[error("Download quota exceeded")]
    QuotaExceeded,

    #[error("A request for tool {0} is already in progress")]
    OperationInProgress(ToolId),
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(())` when nothing was recorded, otherwise a `ValidationError`.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationError(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}
