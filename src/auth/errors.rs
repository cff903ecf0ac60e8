//! Authentication error types and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::repo::StoreError;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Why a refresh was refused. Logged, never shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Bad signature, expired, or not a refresh token.
    TokenInvalid,
    UnknownUser,
    /// The user is logged out.
    NoSession,
    /// The token's `jti` is not the live session id.
    StaleToken,
    HashMismatch,
    /// Another request rotated the same session first.
    ConcurrentRotation,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("email already exists")]
    EmailTaken,

    /// Unknown email and wrong password both end up here.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed or expired bearer token.
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("access denied")]
    AccessDenied(DenyReason),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::EmailTaken,
            StoreError::UnknownTenant(id) => AuthError::Validation(vec![FieldError::new(
                "tenantId",
                format!("tenant {id} does not exist"),
            )]),
            StoreError::Database(e) => AuthError::Internal(e.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::Unauthorized(_)
            | AuthError::AccessDenied(_) => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::EmailTaken => "conflict",
            AuthError::InvalidCredentials | AuthError::Unauthorized(_) => "unauthorized",
            AuthError::AccessDenied(_) => "access_denied",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Client-safe body; internal details stay in the logs.
    pub fn body(&self) -> ErrorBody {
        let message = match self {
            AuthError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        let fields = match self {
            AuthError::Validation(fields) => fields.clone(),
            _ => Vec::new(),
        };
        ErrorBody {
            error: self.code(),
            message,
            fields,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(ref e) = self {
            error!(error = %e, "internal error");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::Validation(vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::AccessDenied(DenyReason::HashMismatch).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let body = AuthError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3")).body();
        assert_eq!(body.error, "internal_error");
        assert_eq!(body.message, "internal server error");
    }

    #[test]
    fn deny_reason_is_not_exposed() {
        let body = AuthError::AccessDenied(DenyReason::StaleToken).body();
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"access_denied","message":"access denied"}"#);
    }

    #[test]
    fn validation_body_carries_fields() {
        let body = AuthError::Validation(vec![FieldError::new("email", "is invalid")]).body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["fields"][0]["field"], "email");
        assert_eq!(json["fields"][0]["message"], "is invalid");
    }

    #[test]
    fn store_errors_map_into_taxonomy() {
        assert!(matches!(
            AuthError::from(StoreError::DuplicateEmail),
            AuthError::EmailTaken
        ));
        match AuthError::from(StoreError::UnknownTenant(9)) {
            AuthError::Validation(fields) => assert_eq!(fields[0].field, "tenantId"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            AuthError::from(StoreError::Database(sqlx::Error::PoolTimedOut)),
            AuthError::Internal(_)
        ));
    }
}
