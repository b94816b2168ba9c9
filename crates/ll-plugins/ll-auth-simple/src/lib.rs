//! # ll-auth-simple
//!
//! Argon2-based implementation of `IdentityProvider`.
//! Credentials and sessions live in process memory; a restart signs everyone out.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ll_core::traits::{IdentityProvider, Principal, Session};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

struct Credential {
    uid: String,
    /// PHC string produced by Argon2
    password_hash: String,
}

pub struct SimpleIdentityProvider {
    /// Mixed into every session token
    token_salt: String,
    credentials: DashMap<String, Credential>,
    sessions: DashMap<String, Principal>,
}

impl SimpleIdentityProvider {
    /// `token_salt` comes from `LINKLOCAL__TOKEN_SALT` in deployed builds.
    pub fn new(token_salt: &str) -> Self {
        Self {
            token_salt: token_salt.to_string(),
            credentials: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// Opaque bearer token: hex SHA-256 over the salt, the principal and a random nonce.
    fn issue_token(&self, uid: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.token_salt.as_bytes());
        hasher.update(uid.as_bytes());
        hasher.update(Uuid::new_v4().as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for SimpleIdentityProvider {
    async fn register(&self, email: &str, password: &str) -> anyhow::Result<Principal> {
        let email = normalize(email);
        if password.chars().count() < MIN_PASSWORD_LEN {
            anyhow::bail!("password must be at least {MIN_PASSWORD_LEN} characters");
        }
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
            .to_string();

        let uid = Uuid::new_v4().simple().to_string();
        match self.credentials.entry(email.clone()) {
            Entry::Occupied(_) => anyhow::bail!("{email} already has credentials"),
            Entry::Vacant(slot) => {
                slot.insert(Credential {
                    uid: uid.clone(),
                    password_hash,
                });
            }
        }
        info!(%uid, "credentials registered");
        Ok(Principal { uid, email })
    }

    /// Only removes credentials still owned by `principal.uid`, so a later
    /// registration under the same email survives.
    async fn unregister(&self, principal: &Principal) -> anyhow::Result<()> {
        let email = normalize(&principal.email);
        if self
            .credentials
            .remove_if(&email, |_, c| c.uid == principal.uid)
            .is_some()
        {
            info!(uid = %principal.uid, "credentials withdrawn");
        }
        self.sessions.retain(|_, p| p.uid != principal.uid);
        Ok(())
    }

    /// Verifies the password against the stored Argon2 hash.
    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<Option<Session>> {
        let email = normalize(email);
        let Some((uid, stored)) = self
            .credentials
            .get(&email)
            .map(|c| (c.uid.clone(), c.password_hash.clone()))
        else {
            warn!("sign-in for unknown email");
            return Ok(None);
        };
        let parsed = PasswordHash::new(&stored)
            .map_err(|e| anyhow::anyhow!("stored hash for {uid} is unreadable: {e}"))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            warn!(%uid, "sign-in with wrong password");
            return Ok(None);
        }

        let principal = Principal { uid, email };
        let token = self.issue_token(&principal.uid);
        self.sessions.insert(token.clone(), principal.clone());
        info!(uid = %principal.uid, "session opened");
        Ok(Some(Session { token, principal }))
    }

    async fn principal_for(&self, token: &str) -> anyhow::Result<Option<Principal>> {
        Ok(self.sessions.get(token).map(|p| p.value().clone()))
    }

    async fn sign_out(&self, token: &str) -> anyhow::Result<()> {
        if let Some((_, principal)) = self.sessions.remove(token) {
            info!(uid = %principal.uid, "session closed");
        }
        Ok(())
    }
}
