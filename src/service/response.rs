//! JSON bodies returned by the service handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RowguardError;
use crate::types::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub code: u16,
    pub token: String,
    pub expire: DateTime<Utc>,
}

/// Error body: HTTP status plus a message safe to show to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl From<&RowguardError> for ApiError {
    fn from(err: &RowguardError) -> Self {
        let message = match err {
            RowguardError::InvalidInput { .. } => "invalid input".to_string(),
            RowguardError::PolicyDenied { .. } | RowguardError::FilterTypeMismatch { .. } => {
                "forbidden".to_string()
            }
            RowguardError::NotFound { entity, .. } => format!("{entity} not found"),
            RowguardError::ConstraintViolation { reason } => reason.clone(),
            RowguardError::Unauthenticated => "auth header is empty".to_string(),
            RowguardError::AuthenticationFailed
            | RowguardError::InvalidToken { .. }
            | RowguardError::TokenExpired => err.to_string(),
            RowguardError::Cancelled | RowguardError::DeadlineExceeded => {
                "request aborted".to_string()
            }
            RowguardError::InvalidPolicy { .. }
            | RowguardError::InvalidConfig { .. }
            | RowguardError::PasswordHash { .. }
            | RowguardError::Lock { .. } => "internal error".to_string(),
        };
        Self {
            code: err.http_status(),
            message,
        }
    }
}

impl From<RowguardError> for ApiError {
    fn from(err: RowguardError) -> Self {
        Self::from(&err)
    }
}

impl ApiError {
    #[must_use]
    pub fn not_found(entity: EntityKind) -> Self {
        Self {
            code: 404,
            message: format!("{entity} not found"),
        }
    }
}
