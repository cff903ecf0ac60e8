use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Authorization level. Informational to this service, enforced downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Viewer,
    Admin,
}

/// Full user row. Deliberately not `Serialize`: anything leaving the
/// service goes through [`crate::auth::dto::PublicUser`].
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub tenant_id: i32,
    pub role: Role,
    pub is_active: bool,
    pub refresh_token_hash: Option<String>,
    pub refresh_token_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to create a user together with its first session.
/// `email` must already be normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub tenant_id: i32,
    pub role: Role,
    pub session: SessionSlot,
}

/// Projection used by refresh rotation.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub email: String,
    pub tenant_id: i32,
    pub role: Role,
    pub refresh_token_hash: Option<String>,
    pub refresh_token_id: Option<Uuid>,
}

/// The single live refresh token of a user: its `jti` plus its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSlot {
    pub token_id: Uuid,
    pub token_hash: String,
}

/// Minimal non-sensitive projection for downstream authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub tenant_id: i32,
    pub first_name: String,
    pub last_name: String,
}
