//! Identity providers and the sign-in-state subscription they publish.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod firebase;
pub mod local;

pub use firebase::FirebaseAuth;
pub use local::LocalIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
}

pub trait IdentityProvider: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> Result<Identity>;

    fn sign_out(&self) -> Result<()>;

    fn current_identity(&self) -> Option<Identity>;

    /// The current state is delivered first, then every later change.
    fn subscribe(&self) -> Subscription;
}

/// Bearer credentials for calls made on behalf of the signed-in user.
pub trait TokenSource: Send + Sync {
    fn id_token(&self) -> Option<String>;
}

pub type AuthChange = Option<Identity>;

#[derive(Default)]
struct Listeners {
    current: Option<Identity>,
    next_id: u64,
    senders: Vec<(u64, Sender<AuthChange>)>,
}

/// Holds the signed-in identity and fans changes out to subscribers.
#[derive(Clone, Default)]
pub struct AuthStateNotifier {
    inner: Arc<Mutex<Listeners>>,
}

impl AuthStateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Identity> {
        self.inner
            .lock()
            .expect("auth listeners lock poisoned")
            .current
            .clone()
    }

    pub fn publish(&self, identity: AuthChange) {
        let mut guard = self.inner.lock().expect("auth listeners lock poisoned");
        guard.current = identity.clone();
        guard
            .senders
            .retain(|(_, tx)| tx.send(identity.clone()).is_ok());
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let mut guard = self.inner.lock().expect("auth listeners lock poisoned");
        let id = guard.next_id;
        guard.next_id += 1;
        let _ = tx.send(guard.current.clone());
        guard.senders.push((id, tx));
        Subscription {
            id,
            rx,
            listeners: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .expect("auth listeners lock poisoned")
            .senders
            .len()
    }
}

/// Owned end of a sign-in-state subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: Receiver<AuthChange>,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// `None` when nothing is pending.
    pub fn try_next(&self) -> Option<AuthChange> {
        match self.rx.try_recv() {
            Ok(change) => Some(change),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<AuthChange> {
        match self.rx.recv_timeout(timeout) {
            Ok(change) => Some(change),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            if let Ok(mut guard) = listeners.lock() {
                guard.senders.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
