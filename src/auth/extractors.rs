use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{
    auth::{
        dto::Identity,
        errors::{AuthError, FieldError},
        repo_types::UserProfile,
    },
    state::AppState,
};

/// Request body fields that can be named in a rejection.
const BODY_FIELDS: [&str; 6] = [
    "email",
    "password",
    "firstName",
    "lastName",
    "tenantId",
    "refreshToken",
];

/// `Json<T>` whose rejections are reported as field-level validation errors.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                warn!(error = %rejection.body_text(), "rejected request body");
                Err(body_rejection(&rejection))
            }
        }
    }
}

fn body_rejection(rejection: &JsonRejection) -> AuthError {
    let field = match rejection {
        JsonRejection::JsonDataError(e) => {
            let detail = e.body_text();
            BODY_FIELDS
                .into_iter()
                .find(|f| detail.contains(&format!("{f}:")))
                .map(|f| FieldError::new(f, "has an invalid value"))
                .unwrap_or_else(|| FieldError::new("body", "does not match the expected shape"))
        }
        JsonRejection::JsonSyntaxError(_) => FieldError::new("body", "is not valid JSON"),
        JsonRejection::MissingJsonContentType(_) => {
            FieldError::new("body", "must be sent as application/json")
        }
        _ => FieldError::new("body", "could not be read"),
    };
    AuthError::Validation(vec![field])
}

/// Verified identity from a `Bearer` access token.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::Unauthorized("missing Authorization header"))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                warn!("invalid auth scheme");
                AuthError::Unauthorized("invalid Authorization header")
            })?;

        state.auth.authenticate(token).map(AuthUser)
    }
}

/// [`AuthUser`] resolved against the credential store.
pub struct CurrentUser(pub UserProfile);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        match state.auth.validate_user(identity.id).await? {
            Some(profile) => Ok(CurrentUser(profile)),
            None => {
                warn!(user_id = %identity.id, "token for unknown user");
                Err(AuthError::Unauthorized("user not found"))
            }
        }
    }
}
