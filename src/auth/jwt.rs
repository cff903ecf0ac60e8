use anyhow::Context;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::claims::{Claims, TokenKind, TokenSubject},
    config::JwtConfig,
};

/// A freshly signed token together with its `jti`.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: Uuid,
}

/// Signing and verification seam used by the orchestrator and the guard.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, subject: &TokenSubject, kind: TokenKind) -> anyhow::Result<IssuedToken>;

    /// Checks signature, expiry, issuer, audience and kind.
    fn verify(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims>;
}

#[derive(Clone)]
struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KindKeys {
    fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_minutes.max(0).saturating_mul(60)),
        }
    }
}

/// HS256 keys, one secret and lifetime per token kind.
#[derive(Clone)]
pub struct JwtKeys {
    access: KindKeys,
    refresh: KindKeys,
    issuer: String,
    audience: String,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access: KindKeys::new(&cfg.access_secret, cfg.access_ttl_minutes),
            refresh: KindKeys::new(&cfg.refresh_secret, cfg.refresh_ttl_minutes),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }
}

impl TokenIssuer for JwtKeys {
    fn issue(&self, subject: &TokenSubject, kind: TokenKind) -> anyhow::Result<IssuedToken> {
        let keys = self.keys(kind);
        let now = OffsetDateTime::now_utc();
        let exp = now
            .checked_add(keys.ttl)
            .context("token lifetime out of range")?;
        let jti = Uuid::new_v4();
        let claims = Claims {
            sub: subject.user_id,
            email: subject.email.clone(),
            tenant_id: subject.tenant_id,
            role: subject.role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti,
            kind,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding)?;
        debug!(user_id = %subject.user_id, kind = ?kind, "jwt signed");
        Ok(IssuedToken { token, jti })
    }

    fn verify(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation())?;
        if data.claims.kind != kind {
            anyhow::bail!("expected {:?} token", kind);
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }
}
