//! Session signal registry.
//!
//! A stateless, no-payload broadcast meaning "the current credential is no
//! longer valid". The registry is owned by the session store; the transport
//! only receives a [`SignalEmitter`], which holds a weak reference and never
//! keeps the registry alive.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

type Listener = Arc<dyn Fn() + Send + Sync>;

struct RegistryInner {
    next_id: AtomicU64,
    raised: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl RegistryInner {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn raise(&self) {
        self.raised.fetch_add(1, Ordering::SeqCst);
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let snapshot: Vec<Listener> = self.listeners().iter().map(|(_, l)| l.clone()).collect();
        debug!(listeners = snapshot.len(), "Raising session signal");
        for listener in snapshot {
            listener();
        }
    }
}

/// Subscription registry for the session signal.
#[derive(Clone)]
pub struct SessionSignal {
    inner: Arc<RegistryInner>,
}

impl SessionSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                next_id: AtomicU64::new(0),
                raised: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners().push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Handle for raising the signal without owning the registry.
    pub fn emitter(&self) -> SignalEmitter {
        SignalEmitter {
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Raise the signal, calling every listener synchronously.
    pub fn raise(&self) {
        self.inner.raise();
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }

    /// How many times the signal has been raised.
    pub fn times_raised(&self) -> u64 {
        self.inner.raised.load(Ordering::SeqCst)
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSignal")
            .field("listeners", &self.listener_count())
            .field("raised", &self.times_raised())
            .finish()
    }
}

/// Raises a [`SessionSignal`]. A no-op once the registry is gone.
#[derive(Clone)]
pub struct SignalEmitter {
    registry: Weak<RegistryInner>,
}

impl SignalEmitter {
    /// Emitter not connected to any registry.
    pub fn detached() -> Self {
        Self {
            registry: Weak::new(),
        }
    }

    pub fn raise(&self) {
        match self.registry.upgrade() {
            Some(registry) => registry.raise(),
            None => debug!("Session signal raised with no registry attached"),
        }
    }
}

impl fmt::Debug for SignalEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalEmitter")
            .field("attached", &(self.registry.strong_count() > 0))
            .finish()
    }
}

/// Keeps a listener registered; unsubscribes on drop.
pub struct Subscription {
    id: u64,
    registry: Weak<RegistryInner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.listeners().retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
