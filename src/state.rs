use std::sync::Arc;

use anyhow::Context;

use crate::auth::{jwt::JwtKeys, repo::{CredentialStore, PgCredentialStore}, services::AuthService};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
}

impl AppState {
    /// Connects to Postgres, runs migrations and wires the auth service.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let store = Arc::new(PgCredentialStore::new(db)) as Arc<dyn CredentialStore>;
        Ok(Self::from_parts(config, store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn CredentialStore>) -> Self {
        let auth = AuthService::new(
            store,
            Arc::new(JwtKeys::from_config(&config.jwt)),
            config.hashing.clone(),
            config.default_tenant_id,
        );
        Self { config, auth }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::auth::memory_repo::InMemoryCredentialStore;

        let config = Arc::new(AppConfig::for_tests());
        let store = Arc::new(InMemoryCredentialStore::default()) as Arc<dyn CredentialStore>;
        Self::from_parts(config, store)
    }
}
