//! Session store
//!
//! Owns the credential/identity pair, its persistence, and the reaction to
//! the session signal. It is the only writer of the persisted pair: the
//! transport raises the signal, and the handler registered here does the
//! clearing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde_json::json;
use tracing::{debug, info, warn};

use crate::backend::{HttpBackend, Method};
use crate::config::{ClientConfig, StorageKeys};
use crate::error::{ClientError, Result};
use crate::notice::{Notice, Notifier};
use crate::routes;
use crate::signal::{SessionSignal, Subscription};
use crate::storage::KeyValueStore;
use crate::transport::{CredentialSource, TransportClient};
use crate::types::{Credential, Identity, LoginResponse};

const MIN_PASSWORD_LEN: usize = 6;

/// Authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            SessionState::Unauthenticated => None,
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Coalescing re-authentication prompt. At most one is open at a time.
struct ReauthPrompt {
    open: AtomicBool,
    opened: AtomicU64,
    listeners: SessionSignal,
}

impl ReauthPrompt {
    fn open(&self) {
        if self
            .open
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.opened.fetch_add(1, Ordering::SeqCst);
            info!("Re-authentication required");
            self.listeners.raise();
        } else {
            debug!("Re-authentication prompt already open, coalescing");
        }
    }
}

/// State shared between the store, its transport and its signal handler.
struct SessionShared {
    storage: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    placeholder: String,
    state: RwLock<SessionState>,
    credential: RwLock<Option<Credential>>,
    prompt: ReauthPrompt,
    notifier: Arc<dyn Notifier>,
    initialized: AtomicBool,
}

impl CredentialSource for SessionShared {
    fn credential(&self) -> Option<Credential> {
        read(&self.credential).clone()
    }
}

impl SessionShared {
    // Identity first, then credential. A credential on disk therefore always
    // has an identity next to it.
    fn persist(&self, credential: &Credential, identity: &Identity) -> Result<()> {
        let serialized = serde_json::to_string(identity)?;
        self.storage.set(&self.keys.identity, &serialized)?;
        if let Err(e) = self.storage.set(&self.keys.credential, credential.as_str()) {
            if let Err(rollback) = self.storage.remove(&self.keys.identity) {
                warn!(error = %rollback, "Failed to roll back persisted identity");
            }
            return Err(e.into());
        }
        Ok(())
    }

    // Credential first, then identity, mirroring `persist`.
    fn clear_persisted(&self) -> Result<()> {
        self.storage.remove(&self.keys.credential)?;
        self.storage.remove(&self.keys.identity)?;
        Ok(())
    }

    fn become_unauthenticated(&self) {
        *write(&self.credential) = None;
        *write(&self.state) = SessionState::Unauthenticated;
    }

    fn invalidate(&self) {
        if let Err(e) = self.clear_persisted() {
            warn!(error = %e, "Failed to clear persisted session");
        }
        let was_authenticated = matches!(*read(&self.state), SessionState::Authenticated(_));
        self.become_unauthenticated();
        info!(was_authenticated, "Session invalidated");
        self.prompt.open();
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    fn notify_failure(&self, err: &ClientError, fallback: &str) {
        if let Some(message) = err.user_message(fallback) {
            self.notify(Notice::error(message));
        }
    }
}

/// Process-wide authentication state.
///
/// Construct with [`SessionStore::new`], then call [`SessionStore::init`]
/// before presenting anything that depends on the session.
pub struct SessionStore {
    shared: Arc<SessionShared>,
    signal: SessionSignal,
    transport: TransportClient,
    _invalidation: Subscription,
}

impl SessionStore {
    /// Create a store whose transport talks to `backend`.
    pub fn new(
        config: &ClientConfig,
        backend: Arc<dyn HttpBackend>,
        storage: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let shared = Arc::new(SessionShared {
            storage,
            keys: config.storage.clone(),
            placeholder: config.placeholder_username.clone(),
            state: RwLock::new(SessionState::Unauthenticated),
            credential: RwLock::new(None),
            prompt: ReauthPrompt {
                open: AtomicBool::new(false),
                opened: AtomicU64::new(0),
                listeners: SessionSignal::new(),
            },
            notifier,
            initialized: AtomicBool::new(false),
        });

        let signal = SessionSignal::new();
        let transport = TransportClient::new(backend, shared.clone(), signal.emitter());

        let handler: Weak<SessionShared> = Arc::downgrade(&shared);
        let invalidation = signal.subscribe(move || {
            if let Some(shared) = handler.upgrade() {
                shared.invalidate();
            }
        });

        Self {
            shared,
            signal,
            transport,
            _invalidation: invalidation,
        }
    }

    /// Restore the session from storage.
    ///
    /// A credential without an identity gets the placeholder identity; no
    /// remote call verifies either value. An identity without a credential
    /// is removed.
    pub fn init(&self) -> Result<SessionState> {
        let keys = &self.shared.keys;
        let storage = &self.shared.storage;

        let state = match storage.get(&keys.credential)? {
            Some(token) if !token.is_empty() => {
                let identity = match storage.get(&keys.identity)? {
                    Some(raw) => serde_json::from_str::<Identity>(&raw).unwrap_or_else(|e| {
                        warn!(error = %e, "Persisted identity unreadable, using placeholder");
                        Identity::new(self.shared.placeholder.clone())
                    }),
                    None => {
                        debug!("Credential restored without identity, using placeholder");
                        Identity::new(self.shared.placeholder.clone())
                    }
                };
                *write(&self.shared.credential) = Some(Credential::new(token));
                SessionState::Authenticated(identity)
            }
            _ => {
                if storage.get(&keys.identity)?.is_some() {
                    debug!("Removing identity persisted without a credential");
                    storage.remove(&keys.identity)?;
                }
                *write(&self.shared.credential) = None;
                SessionState::Unauthenticated
            }
        };

        *write(&self.shared.state) = state.clone();
        self.shared.initialized.store(true, Ordering::SeqCst);
        info!(authenticated = matches!(state, SessionState::Authenticated(_)), "Session restored");
        Ok(state)
    }

    /// Whether [`init`](Self::init) has completed.
    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SessionState {
        read(&self.shared.state).clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state().identity().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*read(&self.shared.state), SessionState::Authenticated(_))
    }

    pub fn credential(&self) -> Option<Credential> {
        self.shared.credential()
    }

    /// Transport carrying this session's credential. Clones are cheap.
    pub fn transport(&self) -> TransportClient {
        self.transport.clone()
    }

    /// The session-invalid signal raised by the transport.
    pub fn signal(&self) -> &SessionSignal {
        &self.signal
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in. Returns `Ok(false)` when the server refuses; state is then
    /// unchanged, even for a 401, since the request is sent outside the
    /// current session. `Err` only for local persistence failures.
    pub async fn login(&self, username: &str, password: &str) -> Result<bool> {
        let body = json!({ "username": username, "password": password });
        let response: LoginResponse = match self.transport.post_anonymous(routes::LOGIN, &body).await {
            Ok(response) => response,
            Err(e) => {
                warn!(username, error = %e, "Login failed");
                let message = e.server_message().unwrap_or("Invalid credentials").to_string();
                self.shared.notify(Notice::error(message));
                return Ok(false);
            }
        };

        let credential = Credential::new(response.token);
        let identity = Identity::new(username);
        self.shared.persist(&credential, &identity)?;

        *write(&self.shared.credential) = Some(credential);
        *write(&self.shared.state) = SessionState::Authenticated(identity);
        info!(username, "Logged in");
        self.shared.notify(Notice::success("Welcome back!"));
        Ok(true)
    }

    /// Create an account. Never changes the session state.
    pub async fn register(&self, username: &str, password: &str) -> bool {
        let body = json!({ "username": username, "password": password });
        match self.transport.request_anonymous(Method::Post, routes::REGISTER, Some(body)).await {
            Ok(_) => {
                info!(username, "Registered");
                self.shared.notify(Notice::success("Registration successful! Please login."));
                true
            }
            Err(e) => {
                warn!(username, error = %e, "Registration failed");
                let message = e.server_message().unwrap_or("Registration failed").to_string();
                self.shared.notify(Notice::error(message));
                false
            }
        }
    }

    /// Clear the session locally. No network call.
    pub fn logout(&self) -> Result<()> {
        self.shared.clear_persisted()?;
        self.shared.become_unauthenticated();
        info!("Logged out");
        self.shared.notify(Notice::success("Logged out successfully"));
        Ok(())
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Change the username. On success the session is ended and the user
    /// must log in again under the new name.
    pub async fn change_username(&self, new_username: &str) -> Result<bool> {
        let new_username = new_username.trim();
        if new_username.is_empty() {
            self.shared.notify(Notice::error("Username cannot be empty"));
            return Ok(false);
        }
        if self.identity().is_some_and(|current| current.username == new_username) {
            self.shared.notify(Notice::error("New username is same as current"));
            return Ok(false);
        }

        let body = json!({ "newUsername": new_username });
        match self.transport.request_with(Method::Put, routes::CHANGE_USERNAME, &body).await {
            Ok(_) => {
                info!(new_username, "Username changed");
                self.shared.notify(Notice::success("Username updated. Please login again."));
                self.logout()?;
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Username change failed");
                self.shared.notify_failure(&e, "Failed to update username");
                Ok(false)
            }
        }
    }

    /// Change the password after local validation of the new one.
    pub async fn change_password(&self, old_password: &str, new_password: &str, confirm: &str) -> bool {
        if new_password != confirm {
            self.shared.notify(Notice::error("Passwords don't match"));
            return false;
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            self.shared.notify(Notice::error("Password must be at least 6 characters"));
            return false;
        }

        let body = json!({ "oldPassword": old_password, "newPassword": new_password });
        match self.transport.request_with(Method::Put, routes::CHANGE_PASSWORD, &body).await {
            Ok(_) => {
                info!("Password changed");
                self.shared.notify(Notice::success("Password updated successfully"));
                true
            }
            Err(e) => {
                warn!(error = %e, "Password change failed");
                self.shared.notify_failure(&e, "Failed to update password");
                false
            }
        }
    }

    // =========================================================================
    // Re-authentication prompt
    // =========================================================================

    /// Called each time a re-authentication prompt opens. Repeated signals
    /// while a prompt is open do not call it again.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn on_reauth_required(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.shared.prompt.listeners.subscribe(listener)
    }

    /// Whether a prompt is open and waiting for the user.
    pub fn reauth_pending(&self) -> bool {
        self.shared.prompt.open.load(Ordering::SeqCst)
    }

    /// Number of prompts opened over the store's lifetime.
    pub fn reauth_prompts_opened(&self) -> u64 {
        self.shared.prompt.opened.load(Ordering::SeqCst)
    }

    /// The user acted on the prompt. A later signal may open a new one.
    pub fn acknowledge_reauth(&self) {
        if self.shared.prompt.open.swap(false, Ordering::SeqCst) {
            debug!("Re-authentication prompt acknowledged");
        }
    }
}
