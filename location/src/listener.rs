use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::LocationController;

/// Receives notifications from a [`LocationController`].
///
/// Both a live location update and a finished address lookup are reported
/// through [`on_location_changed`](Self::on_location_changed); read
/// [`LocationController::latest_location`] or
/// [`LocationController::latest_address`] to see what changed.
pub trait LocationListener: Send + Sync {
    /// The location or the resolved address changed.
    fn on_location_changed(&self, controller: &LocationController);

    /// The provider finished connecting.
    fn on_provider_connected(&self, controller: &LocationController) {
        let _ = controller;
    }
}

/// Ordered list of listeners. The same listener may be registered more than
/// once and is then notified once per registration.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Arc<dyn LocationListener>>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Arc<dyn LocationListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a listener. Returns `true` if the registry was empty before.
    pub fn register(&self, listener: Arc<dyn LocationListener>) -> bool {
        let mut listeners = self.listeners();
        let was_empty = listeners.is_empty();
        listeners.push(listener);
        was_empty
    }

    /// Removes the earliest registration of `listener`. Returns whether one
    /// was found.
    pub fn unregister<L: LocationListener + ?Sized>(&self, listener: &Arc<L>) -> bool {
        let target = Arc::as_ptr(listener).cast::<()>();
        let mut listeners = self.listeners();
        let position = listeners
            .iter()
            .position(|entry| Arc::as_ptr(entry).cast::<()>() == target);
        position.map(|index| listeners.remove(index)).is_some()
    }

    /// Removes every listener.
    pub fn unregister_all(&self) {
        self.listeners().clear();
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners().is_empty()
    }

    /// Copy of the current registrations in order. Notifications iterate over
    /// a snapshot so listeners can register or unregister from a callback.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<dyn LocationListener>> {
        self.listeners().clone()
    }
}
