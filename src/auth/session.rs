use std::collections::HashMap;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Token byte length before hex encoding (32 bytes = 64 hex chars).
const TOKEN_BYTES: usize = 32;

/// Server-side session persistence. The durable payload is the user id
/// only; identity is re-fetched from the user store on every request, so
/// out-of-band profile changes and account deletion take effect
/// immediately rather than at TTL expiry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, token: &str, user_id: Uuid, ttl: Duration) -> anyhow::Result<()>;
    /// Resolve a token to a user id. Unknown or expired tokens yield
    /// `None`, never an error.
    async fn get(&self, token: &str) -> anyhow::Result<Option<Uuid>>;
    /// Idempotent: destroying an unknown token is not an error.
    async fn destroy(&self, token: &str) -> anyhow::Result<()>;
}

/// Generate an opaque, unguessable session token (hex-encoded).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

struct SessionEntry {
    user_id: Uuid,
    expires_at: OffsetDateTime,
}

/// In-memory session store with lazy expiry on read.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, token: &str, user_id: Uuid, ttl: Duration) -> anyhow::Result<()> {
        let entry = SessionEntry {
            user_id,
            expires_at: OffsetDateTime::now_utc() + ttl,
        };
        self.sessions.lock().await.insert(token.to_string(), entry);
        Ok(())
    }

    async fn get(&self, token: &str) -> anyhow::Result<Option<Uuid>> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(entry) if entry.expires_at > OffsetDateTime::now_utc() => Ok(Some(entry.user_id)),
            Some(_) => {
                sessions.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn destroy(&self, token: &str) -> anyhow::Result<()> {
        self.sessions.lock().await.remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn put_get_destroy_lifecycle() {
        let store = MemorySessionStore::default();
        let user_id = Uuid::new_v4();
        let token = generate_token();

        store.put(&token, user_id, Duration::hours(24)).await.unwrap();
        assert_eq!(store.get(&token).await.unwrap(), Some(user_id));

        store.destroy(&token).await.unwrap();
        assert_eq!(store.get(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_sessions_resolve_to_none() {
        let store = MemorySessionStore::default();
        let token = generate_token();

        store
            .put(&token, Uuid::new_v4(), Duration::seconds(-1))
            .await
            .unwrap();
        assert_eq!(store.get(&token).await.unwrap(), None);
        // Lazy expiry removed the entry; a second read is still None.
        assert_eq!(store.get(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let store = MemorySessionStore::default();
        store.destroy("never-established").await.unwrap();
        store.destroy("never-established").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_tokens_resolve_to_none() {
        let store = MemorySessionStore::default();
        assert_eq!(store.get("tampered-or-unknown").await.unwrap(), None);
    }
}
