//! Crate-wide error type.
//!
//! Every fallible operation in `rowguard` returns [`Result`]. Policy denials are
//! deliberately opaque at the boundary: all of them render the same message, so a
//! caller cannot tell "no rule matched" from "a rule rejected the request". The
//! [`DenyReason`] stays reachable for logging.

use thiserror::Error;

use crate::types::{DenyReason, EntityKind};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RowguardError>;

#[derive(Debug, Error)]
pub enum RowguardError {
    /// No viewer is bound to the request context where one is required.
    #[error("unauthenticated: no viewer bound to the request context")]
    Unauthenticated,

    /// A rule received a filter handle for a different entity kind.
    #[error("unexpected filter type: expected {expected} filter, found {found} filter")]
    FilterTypeMismatch {
        expected: EntityKind,
        found: EntityKind,
    },

    /// A rule or a chain fallback denied the operation.
    #[error("privacy: access denied")]
    PolicyDenied { reason: DenyReason },

    /// Credentials did not match any user.
    #[error("incorrect username or password")]
    AuthenticationFailed,

    #[error("{entity} not found: id {id}")]
    NotFound { entity: EntityKind, id: i64 },

    #[error("constraint violation: {reason}")]
    ConstraintViolation { reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("token is expired")]
    TokenExpired,

    /// The request context was cancelled before evaluation finished.
    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid policy: {reason}")]
    InvalidPolicy { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("password hashing failed: {reason}")]
    PasswordHash { reason: String },

    #[error("storage lock poisoned: {reason}")]
    Lock { reason: String },
}

impl RowguardError {
    pub(crate) fn denied(reason: DenyReason) -> Self {
        Self::PolicyDenied { reason }
    }

    /// True for every outcome that must surface as "forbidden".
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::PolicyDenied { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Cancellation and deadline errors abort evaluation instead of turning into a deny.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// HTTP status the handler layer answers with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::Unauthenticated
            | Self::AuthenticationFailed
            | Self::InvalidToken { .. }
            | Self::TokenExpired => 401,
            Self::PolicyDenied { .. } | Self::FilterTypeMismatch { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::ConstraintViolation { .. } => 409,
            Self::Cancelled | Self::DeadlineExceeded => 503,
            Self::InvalidPolicy { .. }
            | Self::InvalidConfig { .. }
            | Self::PasswordHash { .. }
            | Self::Lock { .. } => 500,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for RowguardError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denials_render_identically() {
        let explicit = RowguardError::denied(DenyReason::rule("blocked"));
        let fallback = RowguardError::denied(DenyReason::NoMatchingRule);
        assert_eq!(explicit.to_string(), fallback.to_string());
        assert_eq!(explicit.http_status(), 403);
        assert!(fallback.is_denied());
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = RowguardError::NotFound {
            entity: EntityKind::Todo,
            id: 7,
        };
        assert!(err.is_not_found());
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.to_string(), "todo not found: id 7");
    }
}
