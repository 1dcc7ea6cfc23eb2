use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::identity::{AuthChange, Identity, IdentityProvider, LocalIdentity, Subscription};
use crate::store::{DocumentStore, Fields};

pub const USERS_COLLECTION: &str = "users";
pub const ROLE_FIELD: &str = "role";
pub const ADMIN_ROLE: &str = "admin";

/// Reads `users/{uid}.role`; `None` when the document or field is missing.
pub fn lookup_role(store: &dyn DocumentStore, uid: &str) -> Result<Option<String>> {
    let doc = store
        .get(USERS_COLLECTION, uid)
        .with_context(|| format!("role lookup for {uid}"))?;
    Ok(doc.and_then(|d| d.get_str(ROLE_FIELD).map(str::to_string)))
}

/// Registers a local account and grants it the admin role. The role document
/// is replaced in place, so seeding again on a later run adds nothing.
pub fn seed_admin(
    store: &dyn DocumentStore,
    local: &LocalIdentity,
    email: &str,
    password: &str,
) -> Result<Identity> {
    let identity = local
        .register(email, password)
        .context("register local admin")?;
    let mut fields = Fields::new();
    fields.insert(ROLE_FIELD.to_string(), ADMIN_ROLE.into());
    fields.insert("email".to_string(), identity.email.clone().into());
    store
        .set(USERS_COLLECTION, &identity.uid, fields)
        .context("seed admin role document")?;
    tracing::info!(target: "pitchside::session", uid = %identity.uid, "local admin seeded");
    Ok(identity)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub identity: Option<Identity>,
    pub role: Option<String>,
    pub ready: bool,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.identity.is_some() && self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Shared read view of the session, handed to every consumer.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> Session {
        self.inner
            .read()
            .expect("session lock poisoned")
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.read().expect("session lock poisoned").ready
    }

    fn write(&self, f: impl FnOnce(&mut Session)) {
        let mut guard = self.inner.write().expect("session lock poisoned");
        f(&mut guard);
    }
}

pub struct SessionManager {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn IdentityProvider>,
    handle: SessionHandle,
    subscription: Option<Subscription>,
}

impl SessionManager {
    /// Subscribes to the provider; the initial state is queued immediately.
    pub fn start(store: Arc<dyn DocumentStore>, provider: Arc<dyn IdentityProvider>) -> Self {
        let subscription = provider.subscribe();
        Self {
            store,
            provider,
            handle: SessionHandle::default(),
            subscription: Some(subscription),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn session(&self) -> Session {
        self.handle.snapshot()
    }

    /// The transition applied for every sign-in-state change.
    pub fn apply_identity_change(&self, identity: AuthChange) -> Result<()> {
        let Some(identity) = identity else {
            self.handle.write(|s| {
                s.identity = None;
                s.role = None;
                s.ready = true;
            });
            tracing::debug!(target: "pitchside::session", "signed out");
            return Ok(());
        };

        let uid = identity.uid.clone();
        self.handle.write(|s| s.identity = Some(identity));
        match lookup_role(self.store.as_ref(), &uid) {
            Ok(role) => {
                tracing::debug!(
                    target: "pitchside::session",
                    uid = %uid,
                    role = ?role,
                    "session resolved"
                );
                self.handle.write(|s| {
                    s.role = role;
                    s.ready = true;
                });
                Ok(())
            }
            Err(err) => {
                self.handle.write(|s| s.role = None);
                Err(err)
            }
        }
    }

    /// Applies every queued change without blocking; returns how many were applied.
    pub fn process_pending(&self) -> Result<usize> {
        let Some(sub) = self.subscription.as_ref() else {
            return Ok(0);
        };
        let mut applied = 0;
        while let Some(change) = sub.try_next() {
            self.apply_identity_change(change)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Blocks up to `timeout` for the next change. `Ok(false)` on timeout.
    pub fn wait_for_change(&self, timeout: Duration) -> Result<bool> {
        let Some(sub) = self.subscription.as_ref() else {
            return Ok(false);
        };
        match sub.next_timeout(timeout) {
            Some(change) => {
                self.apply_identity_change(change)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Identity> {
        self.provider.sign_in(email, password)
    }

    pub fn logout(&self) -> Result<()> {
        self.provider.sign_out()
    }

    /// Releases the provider subscription; later changes are no longer observed.
    pub fn shutdown(&mut self) {
        self.subscription.take();
    }
}
