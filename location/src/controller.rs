use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use geokit_geocoder::{
    AddressLookup, AddressResolver, AddressTask, Dispatcher, EnglishMessages, ImmediateDispatcher,
    Messages, Spawner, ThreadSpawner,
};
use log::{debug, error, info, warn};

use crate::{
    ConnectionFailure, ConnectionState, ListenerRegistry, Location, LocationListener,
    LocationProvider, ProviderCallbacks, UpdateConfig,
};

/// Collaborators and settings for a [`LocationController`].
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Configuration used when requesting continuous updates.
    pub update_config: UpdateConfig,
    /// Where blocking address lookups run.
    pub spawner: Arc<dyn Spawner>,
    /// Where lookup completions, and the notifications they trigger, run.
    pub dispatcher: Arc<dyn Dispatcher>,
    /// Text for lookup outcomes.
    pub messages: Arc<dyn Messages>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            update_config: UpdateConfig::default(),
            spawner: Arc::new(ThreadSpawner::default()),
            dispatcher: Arc::new(ImmediateDispatcher),
            messages: Arc::new(EnglishMessages),
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    connection: ConnectionState,
    latest_location: Option<Location>,
    latest_address: Option<String>,
    receiving_updates: bool,
}

/// Forwards provider events to the controller without keeping it alive.
struct CallbackRelay {
    controller: Weak<LocationController>,
}

impl ProviderCallbacks for CallbackRelay {
    fn on_connected(&self) {
        if let Some(controller) = self.controller.upgrade() {
            controller.on_connected();
        }
    }

    fn on_disconnected(&self) {
        if let Some(controller) = self.controller.upgrade() {
            controller.on_disconnected();
        }
    }

    fn on_location_changed(&self, location: Location) {
        if let Some(controller) = self.controller.upgrade() {
            controller.on_location_changed(location);
        }
    }

    fn on_connection_failed(&self, failure: ConnectionFailure) {
        if let Some(controller) = self.controller.upgrade() {
            controller.on_connection_failed(failure);
        }
    }
}

/// Single point of access to the current location and resolved address.
///
/// The controller connects its provider on construction and keeps the
/// connection until [`disconnect`](Self::disconnect). Listeners are notified
/// in registration order, never while an internal lock is held, so they may
/// call back into the controller.
pub struct LocationController {
    this: Weak<Self>,
    provider: Arc<dyn LocationProvider>,
    callbacks: Arc<dyn ProviderCallbacks>,
    lookup: AddressLookup,
    update_config: UpdateConfig,
    listeners: ListenerRegistry,
    state: Mutex<ControllerState>,
    // Held across a subscription change and the provider call making it.
    subscription: Mutex<()>,
}

impl fmt::Debug for LocationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationController")
            .field("provider", &self.provider)
            .field("update_config", &self.update_config)
            .field("listeners", &self.listeners.len())
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

impl LocationController {
    /// Creates a controller and starts connecting `provider`.
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        resolver: Arc<dyn AddressResolver>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let ControllerOptions {
            update_config,
            spawner,
            dispatcher,
            messages,
        } = options;

        let controller = Arc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            provider,
            callbacks: Arc::new(CallbackRelay {
                controller: this.clone(),
            }),
            lookup: AddressLookup::new(resolver, messages, spawner, dispatcher),
            update_config,
            listeners: ListenerRegistry::new(),
            state: Mutex::new(ControllerState::default()),
            subscription: Mutex::new(()),
        });

        controller.state().connection = ConnectionState::Connecting;
        controller.provider.connect(controller.callbacks.clone());
        controller
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscription(&self) -> MutexGuard<'_, ()> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts continuous updates if they are not running and returns the best
    /// last-known location. Returns `None` when the provider is not connected.
    pub fn get_location_updates(&self) -> Option<Location> {
        if !self.provider.is_connected() {
            debug!("location updates requested while provider is disconnected");
            return None;
        }

        {
            let _subscription = self.subscription();
            if !self.state().receiving_updates {
                match self
                    .provider
                    .request_updates(&self.update_config, self.callbacks.clone())
                {
                    Ok(()) => self.state().receiving_updates = true,
                    Err(err) => error!("failed to request location updates: {err}"),
                }
            }
        }

        let location = self.provider.last_location();
        if let Some(location) = &location {
            self.state().latest_location = Some(location.clone());
        }
        location
    }

    /// Best last-known location, or `None` when the provider is not connected.
    #[must_use]
    pub fn get_location(&self) -> Option<Location> {
        if self.provider.is_connected() {
            self.provider.last_location()
        } else {
            None
        }
    }

    /// Cancels continuous updates. Does nothing while disconnected.
    pub fn stop_location_updates(&self) {
        let _subscription = self.subscription();
        if !self.provider.is_connected() {
            return;
        }
        self.provider.remove_updates(&self.callbacks);
        self.state().receiving_updates = false;
    }

    /// Disconnects the provider. Lookups already in flight still complete.
    pub fn disconnect(&self) {
        let _subscription = self.subscription();
        self.provider.disconnect();
        let mut state = self.state();
        state.connection = ConnectionState::Disconnected;
        state.receiving_updates = false;
    }

    /// Adds a listener. The first listener added to an empty controller
    /// starts location updates.
    ///
    /// Updates are not stopped again when the last listener leaves; call
    /// [`stop_location_updates`](Self::stop_location_updates) for that.
    pub fn register(&self, listener: Arc<dyn LocationListener>) {
        if self.listeners.register(listener) {
            let _ = self.get_location_updates();
        }
    }

    /// Removes the earliest registration of `listener`. Returns whether it
    /// was registered.
    pub fn unregister<L: LocationListener + ?Sized>(&self, listener: &Arc<L>) -> bool {
        self.listeners.unregister(listener)
    }

    /// Removes every listener.
    pub fn unregister_all(&self) {
        self.listeners.unregister_all();
    }

    /// Resolves the current location to an address in the background.
    ///
    /// When the lookup finishes, its text becomes
    /// [`latest_address`](Self::latest_address) and every listener receives
    /// [`LocationListener::on_location_changed`]. Returns `None`, doing
    /// nothing, if no geocoder is present, the provider is disconnected, or
    /// there is no last-known location.
    ///
    /// Overlapping calls are not serialized: each lookup runs independently
    /// and the one whose completion runs last wins.
    pub fn query_latest_address(&self) -> Option<AddressTask> {
        if !self.lookup.is_available() {
            debug!("no geocoder available, skipping address lookup");
            return None;
        }
        if !self.provider.is_connected() {
            debug!("address lookup requested while provider is disconnected");
            return None;
        }
        let Some(location) = self.provider.last_location() else {
            warn!("no last-known location to resolve");
            return None;
        };

        let this = self.this.clone();
        Some(
            self.lookup
                .spawn(location.latitude, location.longitude, move |address| {
                    if let Some(controller) = this.upgrade() {
                        controller.address_resolved(address);
                    }
                }),
        )
    }

    fn address_resolved(&self, address: &str) {
        debug!("resolved address: {address}");
        self.state().latest_address = Some(address.to_owned());
        self.notify_location_changed();
    }

    /// Most recently resolved address text, or `None` before the first
    /// lookup completes.
    #[must_use]
    pub fn latest_address(&self) -> Option<String> {
        self.state().latest_address.clone()
    }

    /// Most recent location delivered by the provider or fetched by
    /// [`get_location_updates`](Self::get_location_updates).
    #[must_use]
    pub fn latest_location(&self) -> Option<Location> {
        self.state().latest_location.clone()
    }

    /// Connection state as reported by the provider's callbacks.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.state().connection.clone()
    }

    /// Whether an update subscription is active.
    #[must_use]
    pub fn is_receiving_updates(&self) -> bool {
        self.state().receiving_updates
    }

    /// Number of listener registrations.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Address lookups whose completion has not run yet.
    #[must_use]
    pub fn pending_lookups(&self) -> usize {
        self.lookup.pending()
    }

    /// Configuration used for update requests.
    #[must_use]
    pub const fn update_config(&self) -> &UpdateConfig {
        &self.update_config
    }

    fn notify_location_changed(&self) {
        for listener in self.listeners.snapshot() {
            listener.on_location_changed(self);
        }
    }

    fn notify_connected(&self) {
        for listener in self.listeners.snapshot() {
            listener.on_provider_connected(self);
        }
    }
}

impl ProviderCallbacks for LocationController {
    fn on_connected(&self) {
        info!("location provider connected");
        self.state().connection = ConnectionState::Connected;
        self.notify_connected();
    }

    fn on_disconnected(&self) {
        info!("location provider disconnected");
        let mut state = self.state();
        state.connection = ConnectionState::Disconnected;
        state.receiving_updates = false;
    }

    fn on_location_changed(&self, location: Location) {
        self.state().latest_location = Some(location);
        self.notify_location_changed();
    }

    fn on_connection_failed(&self, failure: ConnectionFailure) {
        warn!("location provider failed to connect: {failure}");
        self.state().connection = ConnectionState::Failed(failure);
    }
}
