use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String, // stored lowercase
    #[serde(skip_serializing)]
    pub password_hash: String, // `<derivedKeyHex>.<saltHex>`, not exposed in JSON
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields supplied when creating a user; id and timestamps are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum InsertError {
    /// Unique-index violation on the username. The pre-insert existence
    /// check has a race window; this closes it.
    #[error("username already exists")]
    DuplicateUsername,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Abstract user-record store consumed by the auth handlers.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up by lowercase-normalized username.
    async fn find_by_username(&self, normalized: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn insert(&self, new_user: NewUser) -> Result<User, InsertError>;
}

const USER_COLUMNS: &str = "id, username, password_hash, email, first_name, last_name, \
                            profile_image_url, created_at, updated_at";

/// Postgres-backed user store.
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, normalized: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(username) = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(normalized)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, InsertError> {
        let sql = format!(
            "INSERT INTO users (username, password_hash, email, first_name, last_name)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.username)
            .bind(&new_user.password_hash)
            .bind(&new_user.email)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .fetch_one(&self.db)
            .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(InsertError::DuplicateUsername)
            }
            Err(e) => Err(InsertError::Other(e.into())),
        }
    }
}

/// In-memory user store, used by `AppState::fake` and tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    /// Overwrite a record in place, simulating an out-of-band profile edit.
    pub async fn replace(&self, user: User) {
        self.users.lock().await.insert(user.id, user);
    }

    /// Drop a record, simulating an out-of-band account deletion.
    pub async fn remove(&self, id: Uuid) {
        self.users.lock().await.remove(&id);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, normalized: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(normalized))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, InsertError> {
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&new_user.username))
        {
            return Err(InsertError::DuplicateUsername);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            password_hash: new_user.password_hash,
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            profile_image_url: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[cfg(test)]
impl User {
    pub(crate) fn test_record(username: &str, password_hash: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            email: None,
            first_name: None,
            last_name: None,
            profile_image_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "deadbeef.cafe".to_string(),
            email: None,
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn memory_store_insert_and_find() {
        let store = MemoryUserStore::default();
        let user = store.insert(new_user("dave")).await.expect("insert");

        let by_name = store.find_by_username("dave").await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(user.id));

        let by_id = store.find_by_id(user.id).await.unwrap();
        assert_eq!(by_id.map(|u| u.username), Some("dave".to_string()));
    }

    #[tokio::test]
    async fn memory_store_rejects_case_variant_duplicates() {
        let store = MemoryUserStore::default();
        store.insert(new_user("alice")).await.expect("first insert");

        let err = store.insert(new_user("Alice")).await.unwrap_err();
        assert!(matches!(err, InsertError::DuplicateUsername));
    }

    #[tokio::test]
    async fn memory_store_replace_updates_record() {
        let store = MemoryUserStore::default();
        let mut user = store.insert(new_user("erin")).await.expect("insert");

        user.email = Some("erin@example.com".to_string());
        store.replace(user.clone()).await;

        let fetched = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.email.as_deref(), Some("erin@example.com"));
    }
}
