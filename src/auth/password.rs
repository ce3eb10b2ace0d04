use rand::rngs::OsRng;
use rand::RngCore;
use scrypt::Params;
use thiserror::Error;
use tracing::error;

const SALT_BYTES: usize = 16;
const KEY_BYTES: usize = 64;

// Node's crypto.scrypt defaults (N=16384, r=8, p=1); existing credential
// rows were derived with these, so they are part of the stored format.
const LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Stored value is not `<derivedKeyHex>.<saltHex>`. Signals a corrupt
    /// or legacy row, never a bad password.
    #[error("stored credential is malformed")]
    Malformed,
    #[error("key derivation failed: {0}")]
    Kdf(String),
}

fn derive_key(password: &str, salt_hex: &str) -> Result<[u8; KEY_BYTES], CredentialError> {
    let params = Params::new(LOG_N, SCRYPT_R, SCRYPT_P, KEY_BYTES).map_err(|e| {
        error!(error = %e, "invalid scrypt parameters");
        CredentialError::Kdf(e.to_string())
    })?;
    let mut key = [0u8; KEY_BYTES];
    scrypt::scrypt(password.as_bytes(), salt_hex.as_bytes(), &params, &mut key).map_err(|e| {
        error!(error = %e, "scrypt derivation error");
        CredentialError::Kdf(e.to_string())
    })?;
    Ok(key)
}

/// Hash a password into the stored form `<derivedKeyHex>.<saltHex>`.
///
/// The salt is 16 random bytes, hex-encoded; the KDF consumes the hex
/// string's bytes, so `verify_password` can re-derive from the stored text
/// without decoding.
pub fn hash_password(plain: &str) -> Result<String, CredentialError> {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);
    let key = derive_key(plain, &salt_hex)?;
    Ok(format!("{}.{}", hex::encode(key), salt_hex))
}

/// Verify a password against a stored `<derivedKeyHex>.<saltHex>` value.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, CredentialError> {
    let (key_hex, salt_hex) = stored.split_once('.').ok_or(CredentialError::Malformed)?;
    let stored_key = hex::decode(key_hex).map_err(|_| CredentialError::Malformed)?;
    let derived = derive_key(plain, salt_hex)?;
    Ok(constant_time_eq(&stored_key, &derived))
}

/// Run `hash_password` on the blocking pool so the KDF never stalls the
/// async runtime.
pub async fn hash_password_blocking(plain: String) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| CredentialError::Kdf(e.to_string()))?
}

/// Run `verify_password` on the blocking pool.
pub async fn verify_password_blocking(
    plain: String,
    stored: String,
) -> Result<bool, CredentialError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &stored))
        .await
        .map_err(|e| CredentialError::Kdf(e.to_string()))?
}

/// Constant-time byte comparison; never short-circuits on the first
/// differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn stored_form_is_key_dot_salt_hex() {
        let hash = hash_password("pw").expect("hashing should succeed");
        let (key_hex, salt_hex) = hash.split_once('.').expect("separator present");
        assert_eq!(key_hex.len(), KEY_BYTES * 2);
        assert_eq!(salt_hex.len(), SALT_BYTES * 2);
        assert!(key_hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(salt_hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("repeat-me").expect("hash a");
        let b = hash_password("repeat-me").expect("hash b");
        assert_ne!(a, b, "salts must be unique per hash");
        assert!(verify_password("repeat-me", &a).unwrap());
        assert!(verify_password("repeat-me", &b).unwrap());
    }

    #[test]
    fn verify_fails_closed_on_missing_separator() {
        let err = verify_password("anything", "deadbeef").unwrap_err();
        assert!(matches!(err, CredentialError::Malformed));
    }

    #[test]
    fn verify_fails_closed_on_non_hex_key() {
        let err = verify_password("anything", "not-hex-at-all.abcdef").unwrap_err();
        assert!(matches!(err, CredentialError::Malformed));
    }

    #[tokio::test]
    async fn blocking_wrappers_roundtrip() {
        let hash = hash_password_blocking("offloaded".into())
            .await
            .expect("hash");
        assert!(verify_password_blocking("offloaded".into(), hash)
            .await
            .expect("verify"));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
