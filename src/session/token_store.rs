/// Persisted-credential access for the session client.
///
/// Exactly two named values survive reloads: the bearer token and the
/// serialized user-profile snapshot. The refresh guard and throttle stamp
/// deliberately live in the session manager's memory instead, so a crash
/// mid-refresh can never leave a stuck persisted flag behind.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::session::error::DecodeError;

const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "user";

/// Key-value persistence seam. The default backend is in-memory; an embedding
/// front end plugs in whatever survives its reloads.
pub trait CredentialStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-lifetime storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl CredentialStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }
}

/// The user snapshot persisted next to the token, mirroring the `user`
/// object in auth responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub status: String,
}

/// Claims the client reads out of a token payload. Lenient: only `sub` is
/// required, and expiry handling treats a missing `exp` as already expired.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientClaims {
    pub sub: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Decodes a token's payload segment WITHOUT verifying the signature.
/// The client only needs the expiry claim; the server re-verifies every
/// token it receives.
pub fn decode_claims(token: &str) -> Result<ClientClaims, DecodeError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<ClientClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| DecodeError(e.to_string()))
}

/// `max(0, exp - now)`. Zero for tokens with no expiry claim, undecodable
/// tokens, and already-expired tokens.
pub fn remaining_lifetime(token: &str) -> Duration {
    let Ok(claims) = decode_claims(token) else {
        return Duration::ZERO;
    };
    let Some(exp) = claims.exp else {
        return Duration::ZERO;
    };

    let now = chrono::Utc::now().timestamp();
    if exp > now {
        Duration::from_secs((exp - now) as u64)
    } else {
        Duration::ZERO
    }
}

/// True iff the remaining lifetime is zero or the claims are undecodable.
pub fn is_expired(token: &str) -> bool {
    remaining_lifetime(token).is_zero()
}

/// Typed access to the two persisted session values.
pub struct TokenStore {
    storage: Box<dyn CredentialStorage>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(Box::new(MemoryStorage::default()))
    }
}

impl TokenStore {
    pub fn new(storage: Box<dyn CredentialStorage>) -> Self {
        Self { storage }
    }

    /// Persists the bearer token, overwriting any prior value.
    pub fn set_token(&self, token: &str) {
        self.storage.set(TOKEN_KEY, token);
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY)
    }

    /// Idempotent.
    pub fn remove_token(&self) {
        self.storage.remove(TOKEN_KEY);
    }

    pub fn set_user_snapshot(&self, user: &UserProfile) {
        match serde_json::to_string(user) {
            Ok(serialized) => self.storage.set(USER_KEY, &serialized),
            Err(e) => tracing::error!(error = %e, "Failed to serialize user snapshot"),
        }
    }

    /// A snapshot that fails to parse is treated as absent.
    pub fn user_snapshot(&self) -> Option<UserProfile> {
        let raw = self.storage.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unparseable user snapshot");
                None
            }
        }
    }

    pub fn remove_user_snapshot(&self) {
        self.storage.remove(USER_KEY);
    }

    /// Clears both persisted values. Idempotent.
    pub fn clear(&self) {
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(USER_KEY);
    }

    /// True when no persisted session values remain.
    pub fn is_empty(&self) -> bool {
        self.storage.get(TOKEN_KEY).is_none() && self.storage.get(USER_KEY).is_none()
    }
}
