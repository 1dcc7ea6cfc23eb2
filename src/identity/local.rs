use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::{Digest, Sha256};

use super::{AuthStateNotifier, Identity, IdentityProvider, Subscription};

const PBKDF2_ITERATIONS: u32 = 10_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const UID_LEN: usize = 28;

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    salt: String,
    hash: String,
}

/// In-process email/password provider for offline runs and tests.
#[derive(Default)]
pub struct LocalIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    notifier: AuthStateNotifier,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, email: &str, password: &str) -> Result<Identity> {
        let key = normalize_email(email);
        if key.is_empty() {
            return Err(anyhow!("email must not be empty"));
        }
        if password.is_empty() {
            return Err(anyhow!("password must not be empty"));
        }
        let mut accounts = self.accounts.lock().expect("local accounts lock poisoned");
        if accounts.contains_key(&key) {
            return Err(anyhow!("account already exists: {key}"));
        }
        let salt_bytes: [u8; SALT_LEN] = rand::thread_rng().r#gen();
        let salt = BASE64.encode(salt_bytes);
        let account = Account {
            uid: uid_for(&key),
            email: key.clone(),
            hash: hash_password(password, &salt),
            salt,
        };
        let identity = Identity {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
        };
        accounts.insert(key, account);
        Ok(identity)
    }

    fn verify(&self, email: &str, password: &str) -> Option<Identity> {
        let accounts = self.accounts.lock().expect("local accounts lock poisoned");
        let account = accounts.get(&normalize_email(email))?;
        let candidate = hash_password(password, &account.salt);
        if !constant_time_eq(candidate.as_bytes(), account.hash.as_bytes()) {
            return None;
        }
        Some(Identity {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
        })
    }
}

impl IdentityProvider for LocalIdentity {
    fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = self
            .verify(email, password)
            .ok_or_else(|| anyhow!("sign-in failed: invalid credentials"))?;
        tracing::info!(target: "pitchside::auth", uid = %identity.uid, "local sign-in");
        self.notifier.publish(Some(identity.clone()));
        Ok(identity)
    }

    fn sign_out(&self) -> Result<()> {
        tracing::info!(target: "pitchside::auth", "local sign-out");
        self.notifier.publish(None);
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.notifier.current()
    }

    fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Derived from the normalized email so a uid, and the role document keyed
/// by it, stays the same across runs.
fn uid_for(email: &str) -> String {
    Sha256::digest(email.as_bytes())
        .iter()
        .take(UID_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), PBKDF2_ITERATIONS, &mut key);
    BASE64.encode(key)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
