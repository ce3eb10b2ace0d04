use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::auth::password::hash_password;
use crate::auth::session::{generate_token, MemorySessionStore, SessionStore};
use crate::auth::store::{PgUserStore, UserStore};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: Arc<AppConfig>,
    /// Well-formed hash of a random throwaway password. Logins against
    /// unknown usernames verify against this so the miss path costs a KDF
    /// run, same as a wrong password.
    pub decoy_hash: Arc<String>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
        let sessions = Arc::new(MemorySessionStore::default()) as Arc<dyn SessionStore>;
        let decoy_hash = Arc::new(hash_password(&generate_token())?);

        Ok(Self {
            db,
            users,
            sessions,
            config,
            decoy_hash,
        })
    }

    pub fn from_parts(
        db: PgPool,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        config: Arc<AppConfig>,
        decoy_hash: Arc<String>,
    ) -> Self {
        Self {
            db,
            users,
            sessions,
            config,
            decoy_hash,
        }
    }
}
