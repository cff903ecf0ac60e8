use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::{TokenKind, TokenSubject},
        dto::{AuthResponse, Identity, LoginRequest, PublicUser, RegisterRequest, TokenPair},
        errors::{AuthError, AuthResult, DenyReason},
        jwt::TokenIssuer,
        password::{hash_blocking, verify_blocking},
        repo::CredentialStore,
        repo_types::{NewUser, Role, SessionSlot, UserProfile},
        validation::{validate_login, validate_registration},
    },
    config::HashingConfig,
};

/// A freshly issued pair plus the refresh slot to persist for it.
struct Issued {
    tokens: TokenPair,
    slot: SessionSlot,
}

/// Register / login / refresh / logout / validate over the store, hasher
/// and token issuer.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenIssuer>,
    hashing: HashingConfig,
    default_tenant_id: i32,
    /// Password hash verified against when the email is unknown, so both
    /// login failures cost the same.
    decoy_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenIssuer>,
        hashing: HashingConfig,
        default_tenant_id: i32,
    ) -> Self {
        Self {
            store,
            tokens,
            hashing,
            default_tenant_id,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    #[instrument(skip(self, req))]
    pub async fn register(&self, req: RegisterRequest) -> AuthResult<AuthResponse> {
        let reg = validate_registration(req)?;

        if self.store.find_by_email(&reg.email).await?.is_some() {
            warn!(email = %reg.email, "email already registered");
            return Err(AuthError::EmailTaken);
        }

        let id = Uuid::new_v4();
        let tenant_id = reg.tenant_id.unwrap_or(self.default_tenant_id);
        let role = Role::default();
        let password_hash = hash_blocking(reg.password, self.hashing.password).await?;
        let issued = self
            .issue(&subject_of(id, &reg.email, tenant_id, role))
            .await?;

        // User row and first session land in a single insert.
        let user = self
            .store
            .insert(NewUser {
                id,
                email: reg.email,
                password_hash,
                first_name: reg.first_name,
                last_name: reg.last_name,
                tenant_id,
                role,
                session: issued.slot,
            })
            .await?;

        info!(user_id = %user.id, tenant_id = user.tenant_id, "user registered");
        Ok(AuthResponse {
            user: PublicUser::from(&user),
            tokens: issued.tokens,
        })
    }

    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> AuthResult<AuthResponse> {
        let (email, password) = validate_login(req)?;

        let Some(user) = self.store.find_by_email(&email).await? else {
            let decoy = self.decoy_hash().await?;
            verify_blocking(password, decoy).await?;
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_blocking(password, user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            // Not enforced here; downstream consumers decide.
            warn!(user_id = %user.id, "inactive account authenticated");
        }

        let issued = self.issue(&subject_of(user.id, &user.email, user.tenant_id, user.role)).await?;
        self.store
            .replace_session(user.id, Some(issued.slot))
            .await?;

        info!(user_id = %user.id, tenant_id = user.tenant_id, "user logged in");
        Ok(AuthResponse {
            user: PublicUser::from(&user),
            tokens: issued.tokens,
        })
    }

    /// Verifies the refresh token first, then checks it against the stored
    /// session and rotates the session with a compare-and-swap.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|e| deny(None, DenyReason::TokenInvalid, Some(&e)))?;
        self.rotate(claims.sub, claims.jti, refresh_token).await
    }

    async fn rotate(&self, user_id: Uuid, token_id: Uuid, presented: &str) -> AuthResult<TokenPair> {
        let Some(session) = self.store.find_session(user_id).await? else {
            return Err(deny(Some(user_id), DenyReason::UnknownUser, None));
        };
        let (Some(stored_id), Some(stored_hash)) =
            (session.refresh_token_id, session.refresh_token_hash)
        else {
            return Err(deny(Some(user_id), DenyReason::NoSession, None));
        };
        if stored_id != token_id {
            return Err(deny(Some(user_id), DenyReason::StaleToken, None));
        }
        if !verify_blocking(presented.to_string(), stored_hash).await? {
            return Err(deny(Some(user_id), DenyReason::HashMismatch, None));
        }

        let issued = self
            .issue(&subject_of(session.id, &session.email, session.tenant_id, session.role))
            .await?;
        if !self
            .store
            .rotate_session(user_id, stored_id, issued.slot)
            .await?
        {
            return Err(deny(Some(user_id), DenyReason::ConcurrentRotation, None));
        }

        info!(user_id = %user_id, "refresh token rotated");
        Ok(issued.tokens)
    }

    /// Clears the session slot. Unknown ids are a silent no-op.
    #[instrument(skip(self))]
    pub async fn logout(&self, user_id: Uuid) -> AuthResult<()> {
        if self.store.replace_session(user_id, None).await? {
            info!(user_id = %user_id, "user logged out");
        } else {
            warn!(user_id = %user_id, "logout for unknown user");
        }
        Ok(())
    }

    /// Lookup primitive for downstream authorization; `None` when unknown.
    pub async fn validate_user(&self, user_id: Uuid) -> AuthResult<Option<UserProfile>> {
        Ok(self.store.find_profile(user_id).await?)
    }

    /// Verifies a bearer access token.
    pub fn authenticate(&self, access_token: &str) -> AuthResult<Identity> {
        match self.tokens.verify(access_token, TokenKind::Access) {
            Ok(claims) => Ok(Identity::from(claims)),
            Err(_) if self.tokens.verify(access_token, TokenKind::Refresh).is_ok() => {
                warn!("refresh token presented as bearer");
                Err(AuthError::Unauthorized("access token required"))
            }
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                Err(AuthError::Unauthorized("invalid or expired token"))
            }
        }
    }

    /// Built on first use with the account password work factor.
    async fn decoy_hash(&self) -> AuthResult<String> {
        let work = self.hashing.password;
        let hash = self
            .decoy_hash
            .get_or_try_init(|| hash_blocking(Uuid::new_v4().to_string(), work))
            .await?;
        Ok(hash.clone())
    }

    /// Signs both tokens concurrently and hashes the refresh token for storage.
    async fn issue(&self, subject: &TokenSubject) -> AuthResult<Issued> {
        let sign = |kind: TokenKind| {
            let tokens = Arc::clone(&self.tokens);
            let subject = subject.clone();
            tokio::task::spawn_blocking(move || tokens.issue(&subject, kind))
        };
        let (access, refresh) = tokio::try_join!(sign(TokenKind::Access), sign(TokenKind::Refresh))
            .map_err(anyhow::Error::from)?;
        let (access, refresh) = (access?, refresh?);

        let token_hash = hash_blocking(refresh.token.clone(), self.hashing.refresh_token).await?;
        Ok(Issued {
            tokens: TokenPair {
                access_token: access.token,
                refresh_token: refresh.token,
            },
            slot: SessionSlot {
                token_id: refresh.jti,
                token_hash,
            },
        })
    }
}

fn subject_of(user_id: Uuid, email: &str, tenant_id: i32, role: Role) -> TokenSubject {
    TokenSubject {
        user_id,
        email: email.to_string(),
        tenant_id,
        role: Some(role),
    }
}

fn deny(user_id: Option<Uuid>, reason: DenyReason, cause: Option<&anyhow::Error>) -> AuthError {
    match (user_id, cause) {
        (Some(id), _) => warn!(user_id = %id, reason = ?reason, "refresh denied"),
        (None, Some(e)) => warn!(error = %e, reason = ?reason, "refresh denied"),
        (None, None) => warn!(reason = ?reason, "refresh denied"),
    }
    AuthError::AccessDenied(reason)
}
