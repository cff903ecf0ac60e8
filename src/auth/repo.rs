use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, SessionRecord, SessionSlot, UserProfile, UserRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error("tenant {0} does not exist")]
    UnknownTenant(i32),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for user credentials. All emails passed in are
/// already trimmed and lower-cased.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<SessionRecord>>;

    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<UserProfile>>;

    /// Creates the user and its session slot in one write; nothing is
    /// stored when it fails.
    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord>;

    /// Overwrites the session slot (`None` clears it). Returns whether the user exists.
    async fn replace_session(&self, id: Uuid, slot: Option<SessionSlot>) -> StoreResult<bool>;

    /// Compare-and-swap on the stored refresh token id. Returns `false` when
    /// the slot no longer holds `expected`.
    async fn rotate_session(&self, id: Uuid, expected: Uuid, next: SessionSlot)
        -> StoreResult<bool>;
}

const USER_COLUMNS: &str = r#"id, email, password_hash, first_name, last_name, tenant_id, role,
       is_active, refresh_token_hash, refresh_token_id, created_at, updated_at"#;

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_insert_error(e: sqlx::Error, tenant_id: i32) -> StoreError {
    if let sqlx::Error::Database(ref db) = e {
        match db.code().as_deref() {
            Some("23505") => return StoreError::DuplicateEmail,
            Some("23503") => return StoreError::UnknownTenant(tenant_id),
            _ => {}
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, email, tenant_id, role, refresh_token_hash, refresh_token_id
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, email, tenant_id, first_name, last_name
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, tenant_id, role,
                               refresh_token_id, refresh_token_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.tenant_id)
            .bind(user.role)
            .bind(user.session.token_id)
            .bind(&user.session.token_hash)
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_insert_error(e, user.tenant_id))
    }

    async fn replace_session(&self, id: Uuid, slot: Option<SessionSlot>) -> StoreResult<bool> {
        let (token_id, token_hash) = match slot {
            Some(s) => (Some(s.token_id), Some(s.token_hash)),
            None => (None, None),
        };
        let res = sqlx::query(
            r#"
            UPDATE users
               SET refresh_token_id = $2, refresh_token_hash = $3, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_id)
        .bind(token_hash)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn rotate_session(
        &self,
        id: Uuid,
        expected: Uuid,
        next: SessionSlot,
    ) -> StoreResult<bool> {
        // Single statement: a concurrent rotation re-evaluates the WHERE
        // clause after the first commit and matches nothing.
        let res = sqlx::query(
            r#"
            UPDATE users
               SET refresh_token_id = $3, refresh_token_hash = $4, updated_at = now()
             WHERE id = $1 AND refresh_token_id = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next.token_id)
        .bind(next.token_hash)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}
